//! Immutable data types for ranged fetching.
//!
//! Byte ranges, configuration and progress snapshots. Nothing here performs
//! I/O; values are passed by copy or clone between the other layers.

pub mod options;
pub mod progress;
pub mod range;

pub use options::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS, RangeOptions};
pub use progress::Progress;
pub use range::ByteRange;
