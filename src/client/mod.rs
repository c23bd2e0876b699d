//! Shared REST client
//!
//! Thin layer over `reqwest` used by the identity, DBaaS and object storage
//! clients. It adds the auth token, a `traceparent` header, a tracing span and
//! metrics to every request.
//!
//! Non-2xx responses are returned as [`ApiResponse`] values, never as errors:
//! the status code is what the regression suite asserts on. Only failures to
//! talk to the service at all (or to decode a body the caller asked for)
//! surface as [`ClientError`].

use crate::metrics;
use crate::telemetry::TraceContext;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, RequestBuilder};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

mod response;

pub use response::ApiResponse;

/// Token header understood by every service under test
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Characters escaped in a single path segment (container names)
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters escaped in object names, which may contain '/'
const OBJECT_PATH: &AsciiSet = &SEGMENT.remove(b'/');

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Response decode error: {0}")]
    Decode(String),
}

/// Percent-encode a single path segment
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Percent-encode an object name, keeping '/' separators
pub fn encode_object_name(name: &str) -> String {
    utf8_percent_encode(name, OBJECT_PATH).to_string()
}

/// REST client bound to one service endpoint
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    service: String,
    base_url: String,
    token: Option<String>,
    trace: TraceContext,
}

impl RestClient {
    /// Create a client for `service` rooted at `base_url`
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(120))
            // Redirects (FormPOST 303s) are asserted on, not followed.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Self::with_http_client(http, service, base_url, token)
    }

    /// Create a client sharing an existing connection pool
    pub fn with_http_client(
        http: reqwest::Client,
        service: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url));
        }

        Ok(Self {
            http,
            service: service.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            trace: TraceContext::from_env().unwrap_or_else(TraceContext::generate),
        })
    }

    /// Use an existing run-wide trace instead of a fresh one
    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = trace;
        self
    }

    /// Service label used in logs and metrics
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Endpoint this client talks to, without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token sent with authenticated requests
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Underlying HTTP client
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for a path relative to the endpoint
    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else if path.starts_with('/') || path.starts_with('?') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Start an authenticated request against a path under the endpoint
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.request_url(method, &self.url(path));
        match &self.token {
            Some(token) => builder.header(AUTH_TOKEN_HEADER, token),
            None => builder,
        }
    }

    /// Start an unauthenticated request against an absolute URL
    ///
    /// Used for TempURL and FormPOST requests, which must not carry a token.
    pub fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = reqwest::header::HeaderMap::new();
        self.trace.child().inject(&mut headers);
        self.http.request(method, url).headers(headers)
    }

    /// Send a request and capture status, headers and body
    pub async fn send(&self, builder: RequestBuilder) -> Result<ApiResponse, ClientError> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let span = tracing::debug_span!(
            "api.request",
            service = %self.service,
            http.method = %method,
            http.url = %url.path(),
            http.status_code = tracing::field::Empty
        );

        async {
            let start = Instant::now();
            let response = match self.http.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    metrics::record_transport_error(&self.service, method.as_str());
                    tracing::warn!(error = %e, "Request failed before a response arrived");
                    return Err(ClientError::Transport(e));
                }
            };

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            let elapsed = start.elapsed();

            tracing::Span::current().record("http.status_code", status.as_u16());
            metrics::record_request(
                &self.service,
                method.as_str(),
                status.as_u16(),
                elapsed.as_secs_f64(),
            );
            tracing::debug!(
                status = status.as_u16(),
                bytes = body.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Request completed"
            );

            Ok::<_, ClientError>(ApiResponse::new(status, headers, body))
        }
        .instrument(span)
        .await
    }
}
