//! Pure transformations: range planning, header parsing and backoff arithmetic.
//!
//! Nothing in this module performs I/O or spawns tasks.

mod plan;
mod retry;

pub use plan::{Ranger, content_range, parse_range, plan_fixed_chunks};
pub use retry::retry_delay;
