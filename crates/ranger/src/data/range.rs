use std::fmt;

use crate::error::{RangeError, Result};

/// An inclusive `[start, end]` span of a resource's bytes.
///
/// A `ByteRange` can only be built with `start <= end`, so it is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(RangeError::InvalidRange(format!(
                "start {start} is greater than end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Caller guarantees `start <= end`.
    pub(crate) fn spanning(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Create a range that must also fit inside a resource of `total_length` bytes.
    pub fn within(start: u64, end: u64, total_length: u64) -> Result<Self> {
        let range = Self::new(start, end)?;
        if end >= total_length {
            return Err(RangeError::InvalidRange(format!(
                "end {end} is past the resource end ({total_length} bytes)"
            )));
        }
        Ok(range)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered, `end - start + 1`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`; present so `len` does not trip the usual lint.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Value for a `Range` request header: `bytes=start-end`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
