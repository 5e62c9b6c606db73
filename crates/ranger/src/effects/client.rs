//! Drop-in ranged client: probe, plan, fetch concurrently, deliver in order.

use std::sync::Arc;

use tracing::debug;

use super::http::{
    HEADER_ACCEPT_RANGES, HEADER_CONTENT_LENGTH, HEADER_CONTENT_RANGE, HEADER_RANGE, Headers,
    HttpClient, HttpLoader, ProbeResponse,
};
use super::loader::Chunk;
use super::pipe::{PipeReader, pipe};
use super::pipeline::OrderedFetchPipeline;
use crate::core::{Ranger, content_range, parse_range};
use crate::data::RangeOptions;
use crate::error::{RangeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    /// Probe-only; forwarded without chunking.
    Head,
}

/// A request for one remote resource, optionally restricted by a `Range` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Headers::new(),
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: Method::Head,
            ..Self::get(url)
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Restrict the request with a raw `Range` value such as `bytes=42-`.
    #[must_use]
    pub fn range(self, value: impl Into<String>) -> Self {
        self.header(HEADER_RANGE, value)
    }
}

/// Response whose body is produced by the ordered fetch pipeline.
#[derive(Debug)]
pub struct RangedResponse {
    pub status: u16,
    /// Number of bytes the body will yield.
    ///
    /// `None` only for HEAD responses whose `Content-Length` is absent or
    /// unparsable.
    pub content_length: Option<u64>,
    /// Probe headers with `Content-Length` (and `Content-Range` for
    /// sub-range requests) rewritten.
    pub headers: Headers,
    pub body: PipeReader,
}

/// Fetches resources in concurrent fixed-size chunks through an [`HttpClient`].
///
/// ```no_run
/// # async fn run() -> ranger::Result<()> {
/// use ranger::{RangeOptions, RangedClient, ReqwestClient, Request};
///
/// let client = RangedClient::new(ReqwestClient::new(), RangeOptions::new(1 << 20, 8))?;
/// let response = client.fetch(Request::get("https://example.com/large.bin")).await?;
/// let body = response.body.read_to_vec().await?;
/// # Ok(())
/// # }
/// ```
pub struct RangedClient<C> {
    client: Arc<C>,
    options: RangeOptions,
    ranger: Ranger,
}

impl<C: HttpClient> RangedClient<C> {
    /// Configuration errors are reported here, before any request is made.
    pub fn new(client: C, options: RangeOptions) -> Result<Self> {
        Self::with_shared(Arc::new(client), options)
    }

    pub fn with_shared(client: Arc<C>, options: RangeOptions) -> Result<Self> {
        options.validate()?;
        let ranger = Ranger::new(options.chunk_size)?;
        Ok(Self {
            client,
            options,
            ranger,
        })
    }

    pub fn options(&self) -> &RangeOptions {
        &self.options
    }

    /// Perform `request`.
    ///
    /// A HEAD request is forwarded as-is. Otherwise the target is probed for
    /// `Accept-Ranges: bytes` and its `Content-Length`, the request's `Range`
    /// header (if any) is resolved, and the body streams the selected span
    /// in order while chunks load concurrently.
    pub async fn fetch(&self, request: Request) -> Result<RangedResponse> {
        if request.method == Method::Head {
            let probe = self.client.head(&request.url, &request.headers).await?;
            let content_length = probe
                .headers
                .get(HEADER_CONTENT_LENGTH)
                .and_then(|v| v.trim().parse().ok());
            let (writer, body) = pipe(1);
            writer.close().await;
            return Ok(RangedResponse {
                status: probe.status,
                content_length,
                headers: probe.headers,
                body,
            });
        }

        let mut probe_headers = request.headers.clone();
        probe_headers.remove(HEADER_RANGE);
        let probe = self
            .client
            .head(&request.url, &probe_headers)
            .await
            .map_err(|err| RangeError::ProbeFailure {
                reason: format!("HEAD {} failed", request.url),
                source: Some(Box::new(err)),
            })?;
        let total_length = probe_length(&probe)?;

        let requested = request.headers.get(HEADER_RANGE).unwrap_or_default();
        let ranges = parse_range(requested, total_length)?;

        let mut headers = probe.headers;
        let (status, content_length, plan) = match ranges.as_slice() {
            [] => (probe.status, total_length, self.ranger.ranges(total_length)),
            [range] => {
                headers.set(HEADER_CONTENT_RANGE, content_range(range, total_length));
                (206, range.len(), self.ranger.split(range.start(), range.end()))
            }
            _ => return Err(RangeError::MultiRangeUnsupported(requested.to_string())),
        };
        headers.set(HEADER_CONTENT_LENGTH, content_length.to_string());

        debug!(
            url = %request.url,
            total_length,
            content_length,
            chunks = plan.len(),
            "planned ranged fetch"
        );

        let loader = Arc::new(HttpLoader::new(
            Arc::clone(&self.client),
            request.url,
            probe_headers,
        ));
        let body =
            OrderedFetchPipeline::new(self.options.clone())?.spawn(Chunk::plan(plan, loader));

        Ok(RangedResponse {
            status,
            content_length: Some(content_length),
            headers,
            body,
        })
    }
}

fn probe_length(probe: &ProbeResponse) -> Result<u64> {
    match probe.headers.get(HEADER_ACCEPT_RANGES) {
        Some(value) if value.trim() == "bytes" => {}
        other => return Err(RangeError::RangeUnsupported(other.map(str::to_string))),
    }
    let value = probe
        .headers
        .get(HEADER_CONTENT_LENGTH)
        .ok_or_else(|| RangeError::probe("response has no Content-Length header"))?;
    value.trim().parse().map_err(|_| {
        RangeError::probe(format!("unable to parse Content-Length header {value:?}"))
    })
}
