//! Genomic regions and the window-resizing algebra
//!
//! A [`Region`] is a half-open, stranded interval. Before encoding, every region is
//! resized to a fixed window. Odd size differences cannot be split evenly, so the
//! region carries a one-bit `offset` recording which side absorbed the spare base
//! last time; the next odd resize puts it on the other side.

use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::types::{InvalidStrand, Strand};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("Start position {start} is larger than end position {end}")]
    InvertedBounds { start: u64, end: u64 },
    #[error(transparent)]
    InvalidStrand(#[from] InvalidStrand),
    #[error("Invalid offset {0}: expected 0 or 1")]
    InvalidOffset(u64),
    #[error("Cannot resize a region to a zero-width window")]
    ZeroWindow,
}

/// Stranded genomic interval, 0-based and end-exclusive.
#[derive(Debug, Clone)]
pub struct Region {
    chrom: String,
    start: u64,
    end: u64,
    strand: Strand,
    info: String,
    offset: u64,
}

impl Region {
    /// Create a region, rejecting `start > end`.
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, strand: Strand) -> Result<Self, RegionError> {
        if start > end {
            return Err(RegionError::InvertedBounds { start, end });
        }
        Ok(Self {
            chrom: chrom.into(),
            start,
            end,
            strand,
            info: String::new(),
            offset: 0,
        })
    }

    /// Create a region from a textual strand (`"+"` or `"-"`).
    pub fn parse(chrom: impl Into<String>, start: u64, end: u64, strand: &str) -> Result<Self, RegionError> {
        let strand = strand.parse::<Strand>()?;
        Self::new(chrom, start, end, strand)
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Result<Self, RegionError> {
        if offset > 1 {
            return Err(RegionError::InvalidOffset(offset));
        }
        self.offset = offset;
        Ok(self)
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Canonical `chrom_strand_start-end` key used to name per-region outputs.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Resize in place to exactly `window` bases.
    ///
    /// `limit` is the chromosome length; growth never crosses it unless the
    /// chromosome is shorter than the window, in which case the region is pinned to
    /// `[0, window)`.
    pub fn resize(&mut self, window: u64, limit: Option<u64>) -> Result<(), RegionError> {
        if window == 0 {
            return Err(RegionError::ZeroWindow);
        }

        let mut span = Span { start: self.start, end: self.end, offset: self.offset };
        while span.width() > window {
            span = shrink_to_midpoint(span);
        }
        if span.width() < window {
            span = grow_to_width(span, window, limit);
        }

        self.start = span.start;
        self.end = span.end;
        self.offset = span.offset;
        Ok(())
    }

    /// Copy of this region resized to `window`.
    pub fn resized(&self, window: u64, limit: Option<u64>) -> Result<Self, RegionError> {
        let mut region = self.clone();
        region.resize(window, limit)?;
        Ok(region)
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.chrom == other.chrom
            && self.strand == other.strand
            && self.start == other.start
            && self.end == other.end
    }
}

impl Eq for Region {}

impl Hash for Region {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chrom.hash(state);
        self.strand.hash(state);
        self.start.hash(state);
        self.end.hash(state);
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}-{}", self.chrom, self.strand, self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: u64,
    end: u64,
    offset: u64,
}

impl Span {
    fn width(&self) -> u64 {
        self.end - self.start
    }
}

/// Collapse to the single base at the (offset-adjusted) midpoint.
fn shrink_to_midpoint(span: Span) -> Span {
    let mid = (span.start + span.end - span.offset) / 2;
    let (start, end) = (mid, mid + 1);
    // (width - offset) and (width + offset) share parity
    let offset = if (end - start + span.offset) % 2 == 0 { 1 } else { 0 };
    Span { start, end, offset }
}

/// Grow to `window`, clamping at the chromosome edges.
///
/// Branch order matters: the left clamp is checked before the right one.
fn grow_to_width(span: Span, window: u64, limit: Option<u64>) -> Span {
    let delta = window - span.width();
    let flank = delta / 2;

    // start - flank - offset <= 0
    if span.start <= flank + span.offset {
        return Span { start: 0, end: window, ..span };
    }

    // end + flank + 1 - offset >= limit
    if let Some(limit) = limit.filter(|&limit| limit > 0) {
        if span.end + flank + 1 >= limit + span.offset {
            return match limit.checked_sub(window) {
                Some(start) => Span { start, end: limit, ..span },
                None => Span { start: 0, end: window, ..span },
            };
        }
    }

    match (delta % 2, span.offset) {
        (0, _) => Span { start: span.start - flank, end: span.end + flank, ..span },
        (_, 1) => Span { start: span.start - flank - 1, end: span.end + flank, offset: 0 },
        _ => Span { start: span.start - flank, end: span.end + flank + 1, offset: 1 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: u64, end: u64) -> Region {
        Region::new("chr1", start, end, Strand::Forward).unwrap()
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(
            Region::new("chr1", 10, 5, Strand::Forward).unwrap_err(),
            RegionError::InvertedBounds { start: 10, end: 5 }
        );
        assert!(matches!(
            Region::parse("chr1", 1, 5, "x"),
            Err(RegionError::InvalidStrand(_))
        ));
        assert_eq!(
            region(1, 2).with_offset(2).unwrap_err(),
            RegionError::InvalidOffset(2)
        );
    }

    #[test]
    fn test_key_and_equality() {
        let a = Region::parse("chr2", 100, 101, "-").unwrap().with_info("site\t0");
        let b = Region::parse("chr2", 100, 101, "-").unwrap();
        assert_eq!(a.key(), "chr2_-_100-101");
        assert_eq!(a, b);
        assert_ne!(a, Region::parse("chr2", 100, 101, "+").unwrap());
    }

    #[test]
    fn test_resize_same_width_is_noop() {
        let mut r = region(100, 110);
        r.resize(10, None).unwrap();
        assert_eq!((r.start(), r.end(), r.offset()), (100, 110, 0));
    }

    #[test]
    fn test_resize_even_growth_is_symmetric() {
        let mut r = region(100, 101);
        r.resize(5, None).unwrap();
        assert_eq!((r.start(), r.end(), r.offset()), (98, 103, 0));
    }

    #[test]
    fn test_resize_odd_growth_alternates_sides() {
        let mut r = region(100, 101);
        r.resize(4, None).unwrap();
        // extra base on the right
        assert_eq!((r.start(), r.end(), r.offset()), (99, 103, 1));
        r.resize(7, None).unwrap();
        // extra base on the left
        assert_eq!((r.start(), r.end(), r.offset()), (97, 104, 0));
    }

    #[test]
    fn test_resize_left_clamp() {
        let mut r = region(3, 4);
        r.resize(21, Some(1_000)).unwrap();
        assert_eq!((r.start(), r.end()), (0, 21));
    }

    #[test]
    fn test_resize_right_clamp() {
        let mut r = region(995, 996);
        r.resize(21, Some(1_000)).unwrap();
        assert_eq!((r.start(), r.end()), (979, 1_000));
    }

    #[test]
    fn test_resize_left_clamp_wins_on_short_chromosome() {
        let mut r = region(3, 4);
        r.resize(6, Some(5)).unwrap();
        assert_eq!((r.start(), r.end()), (0, 6));
    }

    #[test]
    fn test_resize_shrink_recenters_then_grows() {
        let mut r = region(100, 120);
        r.resize(5, None).unwrap();
        assert_eq!((r.start(), r.end()), (108, 113));
        assert_eq!(r.len(), 5);

        let mut r = region(100, 120).with_offset(1).unwrap();
        r.resize(4, None).unwrap();
        // mid = (220 - 1) / 2 = 109, offset stays 1 so the spare base goes left
        assert_eq!((r.start(), r.end(), r.offset()), (107, 111, 0));
    }

    #[test]
    fn test_resize_rejects_zero_window() {
        let mut r = region(100, 120);
        assert_eq!(r.resize(0, None), Err(RegionError::ZeroWindow));
        assert_eq!((r.start(), r.end()), (100, 120));
    }

    #[test]
    fn test_resized_leaves_original_untouched() {
        let r = region(100, 101);
        let grown = r.resized(11, None).unwrap();
        assert_eq!((grown.start(), grown.end()), (95, 106));
        assert_eq!((r.start(), r.end()), (100, 101));
    }
}
