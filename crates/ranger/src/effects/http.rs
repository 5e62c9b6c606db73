use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use super::loader::Loader;
use crate::data::ByteRange;
use crate::error::Result;

pub const HEADER_ACCEPT_RANGES: &str = "Accept-Ranges";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_CONTENT_RANGE: &str = "Content-Range";
pub const HEADER_RANGE: &str = "Range";

/// Ordered header list with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.inner.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.inner.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.set(key, value);
        }
        headers
    }
}

/// Status and headers of a body-less probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: Headers,
}

/// Transport seam for ranged fetching.
///
/// # Implementations
///
/// - [`ReqwestClient`]: production implementation using `reqwest`
/// - [`crate::mock::MemoryHttpClient`]: in-memory resource for tests
pub trait HttpClient: Send + Sync + 'static {
    /// Issue a HEAD request and return its status and headers.
    fn head(
        &self,
        url: &str,
        headers: &Headers,
    ) -> impl Future<Output = Result<ProbeResponse>> + Send;

    /// GET exactly `range` of `url` with `Range: bytes=start-end`.
    ///
    /// Any non-2xx status is an error.
    fn get_range(
        &self,
        url: &str,
        range: ByteRange,
        headers: &Headers,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Binds an [`HttpClient`] and a fixed target into a [`Loader`].
pub struct HttpLoader<C> {
    client: Arc<C>,
    url: String,
    headers: Headers,
}

impl<C: HttpClient> HttpLoader<C> {
    /// `headers` are sent with every chunk request; any `Range` entry is dropped.
    pub fn new(client: Arc<C>, url: impl Into<String>, mut headers: Headers) -> Self {
        headers.remove(HEADER_RANGE);
        Self {
            client,
            url: url.into(),
            headers,
        }
    }
}

impl<C: HttpClient> Loader for HttpLoader<C> {
    fn load(&self, range: ByteRange) -> impl Future<Output = Result<Bytes>> + Send {
        self.client.get_range(&self.url, range, &self.headers)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::error::RangeError;

    fn map_error(err: reqwest::Error) -> RangeError {
        match err.status() {
            Some(status) => RangeError::Status(status.as_u16()),
            None => RangeError::Http(err.to_string()),
        }
    }

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Use a preconfigured client (timeouts, proxies, TLS).
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl HttpClient for ReqwestClient {
        async fn head(&self, url: &str, headers: &Headers) -> Result<ProbeResponse> {
            let mut request = self.client.head(url);
            for (key, value) in headers.iter() {
                request = request.header(key, value);
            }
            let response = request.send().await.map_err(map_error)?;

            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();

            Ok(ProbeResponse {
                status: response.status().as_u16(),
                headers,
            })
        }

        async fn get_range(&self, url: &str, range: ByteRange, headers: &Headers) -> Result<Bytes> {
            let mut request = self.client.get(url);
            for (key, value) in headers.iter() {
                request = request.header(key, value);
            }
            let response = request
                .header(HEADER_RANGE, range.header_value())
                .send()
                .await
                .map_err(map_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(RangeError::Status(status.as_u16()));
            }
            response.bytes().await.map_err(map_error)
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
