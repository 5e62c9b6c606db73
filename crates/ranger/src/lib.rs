//! Concurrent HTTP range fetching with strictly ordered delivery.
//!
//! A resource is split into fixed-size byte ranges, up to `workers` of them
//! are loaded concurrently, and their payloads are committed to a single
//! consumer in ascending offset order. The first failing chunk terminates
//! the stream after every earlier chunk has been delivered.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable configuration and types
//! - `core` - Pure transformations (planning, `Range` parsing, backoff)
//! - `effects` - I/O operations with trait abstraction
//!
//! # Entry points
//!
//! - [`RangedClient`]: probe a URL and stream the whole resource or one
//!   requested sub-range
//! - [`RangedSource`]: positional reads and sequential readers over a sized
//!   resource
//! - [`fetch_ordered`]: drive an arbitrary chunk plan through the pipeline
//! - [`multiplexer`]: concatenate many producers' streams in admission order

mod core;
mod data;
mod effects;
mod error;
pub mod mock;

pub use crate::core::{Ranger, content_range, parse_range, plan_fixed_chunks, retry_delay};
pub use crate::data::{ByteRange, DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS, Progress, RangeOptions};
pub use effects::{
    Chunk, FnLoader, HEADER_ACCEPT_RANGES, HEADER_CONTENT_LENGTH, HEADER_CONTENT_RANGE,
    HEADER_RANGE, Headers, HttpClient, HttpLoader, Loader, Method, MultiplexReader, Multiplexer,
    OrderedFetchPipeline, PipeReader, PipeWriter, ProbeResponse, RangedClient, RangedResponse,
    RangedSource, Request, RetryLoader, SectionReader, fetch_ordered, multiplexer, pipe,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{RangeError, Result};
