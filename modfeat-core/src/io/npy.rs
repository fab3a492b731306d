//! NumPy `.npy` array files
//!
//! Writes format version 1.0 (little-endian, C order) so the per-region tensors
//! load directly with `numpy.load`. The reader accepts versions 1.0 and 2.0 of
//! the same layout and is mainly used to check written output.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Magic bytes opening every `.npy` file
const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Header block (magic + version + length + dict) is padded to this many bytes
const HEADER_ALIGN: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected \\x93NUMPY")]
    InvalidMagic,

    #[error("Unsupported .npy version: {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("Invalid .npy header: {0}")]
    InvalidHeader(String),

    #[error("Element type mismatch: expected {expected}, found {found}")]
    DtypeMismatch { expected: &'static str, found: String },

    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type NpyResult<T> = Result<T, NpyError>;

/// Scalar types that can be stored in an `.npy` file.
pub trait NpyElement: Copy {
    /// NumPy `descr` string, e.g. `<i8`.
    const DESCR: &'static str;

    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()>;

    fn read_le<R: Read>(reader: &mut R) -> std::io::Result<Self>;
}

impl NpyElement for i64 {
    const DESCR: &'static str = "<i8";

    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_i64::<LittleEndian>(self)
    }

    fn read_le<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_i64::<LittleEndian>()
    }
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";

    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_f32::<LittleEndian>(self)
    }

    fn read_le<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_f32::<LittleEndian>()
    }
}

/// Write `array` to `path` in logical (row-major) order.
pub fn write_npy<P, A, S, D>(path: P, array: &ArrayBase<S, D>) -> NpyResult<()>
where
    P: AsRef<Path>,
    A: NpyElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_npy_to(&mut writer, array)?;
    writer.flush()?;
    Ok(())
}

/// Write an `.npy` stream to any writer.
pub fn write_npy_to<W, A, S, D>(writer: &mut W, array: &ArrayBase<S, D>) -> NpyResult<()>
where
    W: Write,
    A: NpyElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    let header = header_text(A::DESCR, array.shape());
    writer.write_all(NPY_MAGIC)?;
    writer.write_u8(1)?;
    writer.write_u8(0)?;
    writer.write_u16::<LittleEndian>(header.len() as u16)?;
    writer.write_all(header.as_bytes())?;

    for &value in array.iter() {
        value.write_le(writer)?;
    }
    Ok(())
}

/// Read an `.npy` file into a dynamically-shaped array.
pub fn read_npy<T, P>(path: P) -> NpyResult<ArrayD<T>>
where
    T: NpyElement,
    P: AsRef<Path>,
{
    let file = File::open(path)?;
    read_npy_from(&mut BufReader::new(file))
}

/// Read an `.npy` stream from any reader.
pub fn read_npy_from<T, R>(reader: &mut R) -> NpyResult<ArrayD<T>>
where
    T: NpyElement,
    R: Read,
{
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if magic != NPY_MAGIC {
        return Err(NpyError::InvalidMagic);
    }

    let major = reader.read_u8()?;
    let minor = reader.read_u8()?;
    let header_len = match major {
        1 => reader.read_u16::<LittleEndian>()? as usize,
        2 => reader.read_u32::<LittleEndian>()? as usize,
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let header = String::from_utf8_lossy(&header_bytes);

    let descr = dict_value(&header, "descr")?;
    let descr = descr.trim_matches('\'');
    if descr != T::DESCR {
        return Err(NpyError::DtypeMismatch {
            expected: T::DESCR,
            found: descr.to_string(),
        });
    }
    if dict_value(&header, "fortran_order")? != "False" {
        return Err(NpyError::FortranOrder);
    }
    let shape = parse_shape(dict_value(&header, "shape")?)?;

    let count: usize = shape.iter().product();
    let mut data = Vec::with_capacity(count);
    for _ in 0..count {
        data.push(T::read_le(reader)?);
    }

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
}

/// Header dict, padded with spaces and terminated by `\n` so the data section
/// starts on a `HEADER_ALIGN` boundary.
fn header_text(descr: &str, shape: &[usize]) -> String {
    let shape = match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape
    );

    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    format!("{}{}\n", dict, " ".repeat(padding))
}

/// Raw text of `'key': value` in a header dict.
fn dict_value<'a>(header: &'a str, key: &str) -> NpyResult<&'a str> {
    let pattern = format!("'{}':", key);
    let start = header
        .find(&pattern)
        .map(|i| i + pattern.len())
        .ok_or_else(|| NpyError::InvalidHeader(format!("missing key {}", key)))?;
    let rest = header[start..].trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find(',')
    }
    .ok_or_else(|| NpyError::InvalidHeader(format!("unterminated value for {}", key)))?;

    Ok(rest[..end].trim())
}

fn parse_shape(text: &str) -> NpyResult<Vec<usize>> {
    text.trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| NpyError::InvalidHeader(format!("bad dimension {:?}", dim)))
        })
        .collect()
}
