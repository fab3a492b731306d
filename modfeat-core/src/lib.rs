//! modfeat core library
//!
//! Region geometry, read alignment encoding, reference one-hot features and the
//! parallel per-region extraction driver behind the `modfeat` CLI.

pub mod types;
pub mod region;
pub mod read;
pub mod insertion;
pub mod encode;
pub mod source;
pub mod io;
pub mod layout;
pub mod reference;
pub mod extract;
pub mod dispatch;

// Re-export commonly used types and functions
pub use types::{AlignedPair, Strand};
pub use region::{Region, RegionError};
pub use read::AlignedRead;
pub use encode::{encode_read, EncodeError, ReadTensor};
pub use source::{AlignmentSource, SourceError};
pub use io::{BedReader, IndexedBamSource};
pub use reference::{open_reference, ChromSizes, ReferenceError, ReferenceReader};
pub use extract::{extract_region, ExtractError, RegionJob, RegionOutcome};
pub use dispatch::{dispatch, DispatchError, DispatchSummary};

/// Version information for the modfeat core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
