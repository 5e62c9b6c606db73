//! I/O layer: chunk loading, the ordered pipeline and the views built on it.
//!
//! Every transport is reached through a trait ([`Loader`], [`HttpClient`]) so
//! the pipeline can be driven by in-memory sources in tests.

mod client;
mod http;
mod loader;
mod multiplex;
mod pipe;
mod pipeline;
mod source;

pub use client::{Method, RangedClient, RangedResponse, Request};
pub use http::{
    HEADER_ACCEPT_RANGES, HEADER_CONTENT_LENGTH, HEADER_CONTENT_RANGE, HEADER_RANGE, Headers,
    HttpClient, HttpLoader, ProbeResponse,
};
pub use loader::{Chunk, FnLoader, Loader, RetryLoader};
pub use multiplex::{MultiplexReader, Multiplexer, multiplexer};
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use pipeline::{OrderedFetchPipeline, fetch_ordered};
pub use source::{RangedSource, SectionReader};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
