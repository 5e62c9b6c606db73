//! In-memory loader and HTTP client for tests and benchmarks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;

use crate::data::ByteRange;
use crate::effects::{Headers, HttpClient, Loader, ProbeResponse};
use crate::error::{RangeError, Result};

type DelayFn = Arc<dyn Fn(ByteRange) -> Duration + Send + Sync>;

/// Serves byte ranges out of a buffer, with optional per-range latency and
/// failure injection.
pub struct MemoryLoader {
    data: Bytes,
    delay: Option<DelayFn>,
    fail_at: Option<u64>,
    calls: AtomicUsize,
}

impl MemoryLoader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            delay: None,
            fail_at: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay(range)` before answering each load.
    #[must_use]
    pub fn with_delay(
        mut self,
        delay: impl Fn(ByteRange) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// Fail every load whose range starts at `offset`.
    #[must_use]
    pub fn fail_at(mut self, offset: u64) -> Self {
        self.fail_at = Some(offset);
        self
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of loads issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Loader for MemoryLoader {
    async fn load(&self, range: ByteRange) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref delay) = self.delay {
            tokio::time::sleep(delay(range)).await;
        }
        if self.fail_at == Some(range.start()) {
            return Err(RangeError::Http(format!("injected failure at {}", range.start())));
        }
        Ok(slice(&self.data, range))
    }
}

/// Answers probes and range requests for a single in-memory resource.
///
/// Every URL resolves to the same resource.
pub struct MemoryHttpClient {
    data: Bytes,
    accept_ranges: Option<String>,
    content_length: Option<String>,
    probe_status: Option<u16>,
    head_calls: AtomicUsize,
    range_calls: AtomicUsize,
}

impl MemoryHttpClient {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let len = data.len();
        Self {
            data,
            accept_ranges: Some("bytes".into()),
            content_length: Some(len.to_string()),
            probe_status: None,
            head_calls: AtomicUsize::new(0),
            range_calls: AtomicUsize::new(0),
        }
    }

    /// Override the advertised `Accept-Ranges` value; `None` omits the header.
    #[must_use]
    pub fn accept_ranges(mut self, value: Option<&str>) -> Self {
        self.accept_ranges = value.map(str::to_string);
        self
    }

    /// Override the advertised `Content-Length` value; `None` omits the header.
    #[must_use]
    pub fn content_length(mut self, value: Option<&str>) -> Self {
        self.content_length = value.map(str::to_string);
        self
    }

    /// Fail every HEAD request with `status`.
    #[must_use]
    pub fn fail_probe(mut self, status: u16) -> Self {
        self.probe_status = Some(status);
        self
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for MemoryHttpClient {
    async fn head(&self, _url: &str, _headers: &Headers) -> Result<ProbeResponse> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.probe_status {
            return Err(RangeError::Status(status));
        }
        let mut headers = Headers::new();
        if let Some(ref value) = self.content_length {
            headers.set("Content-Length", value.clone());
        }
        headers.set("Content-Type", "application/octet-stream");
        if let Some(ref value) = self.accept_ranges {
            headers.set("Accept-Ranges", value.clone());
        }
        Ok(ProbeResponse {
            status: 200,
            headers,
        })
    }

    async fn get_range(&self, _url: &str, range: ByteRange, _headers: &Headers) -> Result<Bytes> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        if range.start() >= self.data.len() as u64 {
            return Err(RangeError::Status(416));
        }
        Ok(slice(&self.data, range))
    }
}

fn slice(data: &Bytes, range: ByteRange) -> Bytes {
    let len = data.len() as u64;
    let start = range.start().min(len) as usize;
    let end = range.end().saturating_add(1).min(len) as usize;
    data.slice(start..end)
}
