//! Byte-range planning.

use crate::data::ByteRange;
use crate::error::{RangeError, Result};

const RANGE_UNIT_PREFIX: &str = "bytes=";

/// Splits spans into consecutive fixed-size chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranger {
    chunk_size: u64,
}

impl Ranger {
    /// Create a ranger; `chunk_size` must be at least 1.
    pub fn new(chunk_size: u64) -> Result<Self> {
        if chunk_size < 1 {
            return Err(RangeError::InvalidConfiguration(
                "chunk size must be non-zero".into(),
            ));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunks covering a whole resource of `length` bytes. Empty for `length == 0`.
    pub fn ranges(&self, length: u64) -> Vec<ByteRange> {
        match length.checked_sub(1) {
            Some(last) => self.split(0, last),
            None => Vec::new(),
        }
    }

    /// Chunks covering the inclusive span `[start, end]`; the last one may be shorter.
    pub fn split(&self, start: u64, end: u64) -> Vec<ByteRange> {
        if start > end {
            return Vec::new();
        }
        let count = (end - start) / self.chunk_size + 1;
        let mut ranges = Vec::with_capacity(count as usize);
        let mut offset = start;
        loop {
            let chunk_end = offset.saturating_add(self.chunk_size - 1).min(end);
            ranges.push(ByteRange::spanning(offset, chunk_end));
            if chunk_end == end {
                break;
            }
            offset = chunk_end + 1;
        }
        ranges
    }

    /// Index of the chunk holding `offset` in a plan that starts at byte 0.
    pub fn index(&self, offset: u64) -> usize {
        (offset / self.chunk_size) as usize
    }
}

/// Split `[start, end]` into `chunk_size` pieces, the last one truncated to fit.
pub fn plan_fixed_chunks(chunk_size: u64, start: u64, end: u64) -> Result<Vec<ByteRange>> {
    Ok(Ranger::new(chunk_size)?.split(start, end))
}

/// Parse a `Range` header value against a resource of `total_length` bytes.
///
/// An empty value means the entire resource and yields no ranges. Otherwise
/// exactly one `start-` or `start-end` specifier is accepted; `end` is
/// clamped to the last byte of the resource.
///
/// ```
/// use ranger::parse_range;
///
/// let ranges = parse_range("bytes=42-", 10240).unwrap();
/// assert_eq!(ranges[0].start(), 42);
/// assert_eq!(ranges[0].end(), 10239);
/// assert!(parse_range("", 10240).unwrap().is_empty());
/// ```
pub fn parse_range(value: &str, total_length: u64) -> Result<Vec<ByteRange>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let specs = value
        .strip_prefix(RANGE_UNIT_PREFIX)
        .ok_or_else(|| RangeError::InvalidRange(format!("unsupported range unit in {value:?}")))?;

    let specs: Vec<&str> = specs.split(',').map(str::trim).collect();
    if specs.len() > 1 {
        return Err(RangeError::MultiRangeUnsupported(value.to_string()));
    }

    let (start, end) = specs[0]
        .split_once('-')
        .ok_or_else(|| RangeError::InvalidRange(format!("missing '-' in {value:?}")))?;

    let start: u64 = start
        .trim()
        .parse()
        .map_err(|_| RangeError::InvalidRange(format!("unparsable start in {value:?}")))?;

    let last = total_length.checked_sub(1).ok_or_else(|| {
        RangeError::InvalidRange(format!("{value:?} requested from an empty resource"))
    })?;

    let end = match end.trim() {
        "" => last,
        end => end
            .parse::<u64>()
            .map_err(|_| RangeError::InvalidRange(format!("unparsable end in {value:?}")))?,
    };

    if start > end {
        return Err(RangeError::InvalidRange(format!(
            "start {start} is greater than end {end}"
        )));
    }
    if start > last {
        return Err(RangeError::InvalidRange(format!(
            "start {start} is past the resource end ({total_length} bytes)"
        )));
    }

    Ok(vec![ByteRange::within(start, end.min(last), total_length)?])
}

/// Render a `Content-Range` value: `bytes start-end/total`.
pub fn content_range(range: &ByteRange, total_length: u64) -> String {
    format!("bytes {}-{}/{}", range.start(), range.end(), total_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(ranges: &[ByteRange], start: u64, end: u64) {
        assert_eq!(ranges.first().unwrap().start(), start);
        assert_eq!(ranges.last().unwrap().end(), end);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end() + 1, pair[1].start());
        }
    }

    #[test]
    fn test_ranges_cover_resource_exactly() {
        for total in [1u64, 2, 5, 9, 10, 11, 1023, 1024, 1025, 10240] {
            for chunk in [1u64, 2, 3, 5, 1024, 4096] {
                let ranges = Ranger::new(chunk).unwrap().ranges(total);
                assert_contiguous(&ranges, 0, total - 1);
                let last = ranges.last().unwrap().len();
                let expected = match total % chunk {
                    0 => chunk,
                    rem => rem,
                };
                assert_eq!(last, expected, "total={total} chunk={chunk}");
                assert!(ranges[..ranges.len() - 1].iter().all(|r| r.len() == chunk));
            }
        }
    }

    #[test]
    fn test_empty_resource_has_no_chunks() {
        assert!(Ranger::new(1024).unwrap().ranges(0).is_empty());
    }

    #[test]
    fn test_chunk_larger_than_resource() {
        let ranges = Ranger::new(16 * 1024 * 1024).unwrap().ranges(10240);
        assert_eq!(ranges, vec![ByteRange::new(0, 10239).unwrap()]);
    }

    #[test]
    fn test_split_sub_range() {
        let ranges = plan_fixed_chunks(5, 42, 83).unwrap();
        assert_contiguous(&ranges, 42, 83);
        assert_eq!(ranges.len(), 9);
        assert_eq!(ranges.last().unwrap().len(), 2);
    }

    #[test]
    fn test_split_up_to_u64_max() {
        let ranges = plan_fixed_chunks(10, u64::MAX - 14, u64::MAX).unwrap();
        assert_contiguous(&ranges, u64::MAX - 14, u64::MAX);
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn test_zero_chunk_size_is_invalid_configuration() {
        assert!(matches!(
            plan_fixed_chunks(0, 0, 10),
            Err(RangeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_index_uses_chunk_arithmetic() {
        let ranger = Ranger::new(5).unwrap();
        assert_eq!(ranger.index(0), 0);
        assert_eq!(ranger.index(4), 0);
        assert_eq!(ranger.index(5), 1);
        assert_eq!(ranger.index(9), 1);
    }

    #[test]
    fn test_parse_empty_means_whole_resource() {
        assert!(parse_range("", 100).unwrap().is_empty());
        assert!(parse_range("   ", 100).unwrap().is_empty());
    }

    #[test]
    fn test_parse_open_ended() {
        let ranges = parse_range("bytes=42-", 10240).unwrap();
        assert_eq!(ranges, vec![ByteRange::new(42, 10239).unwrap()]);
    }

    #[test]
    fn test_parse_bounded_and_clamped() {
        assert_eq!(
            parse_range("bytes=42-83", 10240).unwrap(),
            vec![ByteRange::new(42, 83).unwrap()]
        );
        assert_eq!(
            parse_range("bytes=10-99999", 100).unwrap(),
            vec![ByteRange::new(10, 99).unwrap()]
        );
    }

    #[test]
    fn test_parse_from_zero_matches_full_plan() {
        let ranger = Ranger::new(1024).unwrap();
        let parsed = parse_range("bytes=0-", 10240).unwrap();
        let planned = ranger.split(parsed[0].start(), parsed[0].end());
        assert_eq!(planned, ranger.ranges(10240));
    }

    #[test]
    fn test_parse_rejects_multiple_ranges() {
        assert!(matches!(
            parse_range("bytes=100-200,300-400", 10240),
            Err(RangeError::MultiRangeUnsupported(_))
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_specs() {
        for value in [
            "bytes=100-50",
            "bytes=abc-",
            "bytes=1-xyz",
            "bytes=-500",
            "bytes=5",
            "items=0-1",
            "bytes=100-",
        ] {
            assert!(
                matches!(parse_range(value, 100), Err(RangeError::InvalidRange(_))),
                "{value} should be invalid"
            );
        }
    }

    #[test]
    fn test_parse_against_empty_resource() {
        assert!(matches!(
            parse_range("bytes=0-", 0),
            Err(RangeError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_content_range_format() {
        let range = ByteRange::new(42, 10239).unwrap();
        assert_eq!(content_range(&range, 10240), "bytes 42-10239/10240");
    }
}
