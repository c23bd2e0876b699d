//! Object storage API client
//!
//! Accounts, containers and objects, plus the middleware features the
//! regression suite covers: large objects, TempURL, FormPOST, bulk
//! operations, CORS and versioning.
//!
//! Like the DBaaS client, every call hands back the [`ApiResponse`]; a 404
//! or 412 is something to assert on, not an error.

use crate::auth::{AccessInfo, AuthError};
use crate::client::{encode_object_name, encode_segment, ApiResponse, ClientError, RestClient};
use crate::config::ObjectStorageConfig;
use crate::poll::{wait_for_condition, CondCheckError, PollError};
use bytes::Bytes;
use reqwest::{Method, RequestBuilder};
use std::time::{Duration, Instant};

pub mod archive;
pub mod cors;
pub mod formpost;
pub mod large_object;
pub mod listing;
pub mod tempurl;
pub mod versioning;

pub use archive::{ArchiveError, ArchiveFormat, BulkDeleteResult, ExtractArchiveResult};
pub use cors::CorsPolicy;
pub use formpost::FormPost;
pub use large_object::{
    LargeObject, LargeObjectError, Segment, SegmentFailure, SegmentPlan, SegmentSource, UploadReport,
};
pub use listing::{expected_listing, ListingEntry, ListingFormat, ListingParams};
pub use tempurl::{Digest, TempUrlOptions, TempUrlSigner};
pub use versioning::versioned_object_prefix;

/// Request headers for container and object calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectHeaders {
    headers: Vec<(String, String)>,
}

impl ObjectHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arbitrary header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(self, value: &str) -> Self {
        self.header("Content-Type", value)
    }

    /// Expected MD5 of the body; the service rejects mismatches with 422
    pub fn etag(self, value: &str) -> Self {
        self.header("ETag", value)
    }

    /// `X-Object-Meta-<key>`
    pub fn object_meta(self, key: &str, value: &str) -> Self {
        self.header(format!("X-Object-Meta-{}", key), value)
    }

    /// `X-Container-Meta-<key>`
    pub fn container_meta(self, key: &str, value: &str) -> Self {
        self.header(format!("X-Container-Meta-{}", key), value)
    }

    /// `X-Account-Meta-<key>`
    pub fn account_meta(self, key: &str, value: &str) -> Self {
        self.header(format!("X-Account-Meta-{}", key), value)
    }

    /// Absolute expiry, unix seconds
    pub fn delete_at(self, timestamp: u64) -> Self {
        self.header("X-Delete-At", timestamp.to_string())
    }

    /// Relative expiry in seconds
    pub fn delete_after(self, seconds: u64) -> Self {
        self.header("X-Delete-After", seconds.to_string())
    }

    /// Dynamic large object manifest: `<container>/<prefix>`
    pub fn object_manifest(self, container_prefix: &str) -> Self {
        self.header("X-Object-Manifest", container_prefix)
    }

    /// `Range: bytes=...`, e.g. `"0-9"` or `"0-9,20-29"`
    pub fn range(self, ranges: &str) -> Self {
        self.header("Range", format!("bytes={}", ranges))
    }

    pub fn if_match(self, etag: &str) -> Self {
        self.header("If-Match", etag)
    }

    pub fn if_none_match(self, etag: &str) -> Self {
        self.header("If-None-Match", etag)
    }

    /// Archive container for old versions
    pub fn versions_location(self, container: &str) -> Self {
        self.header(versioning::VERSIONS_LOCATION_HEADER, container)
    }

    /// Add every header of a CORS policy
    pub fn cors(mut self, policy: &CorsPolicy) -> Self {
        self.headers.extend(policy.headers());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn apply(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

/// Unique, prefixed name for a test container or object
pub fn unique_name(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Client for one object storage account
#[derive(Debug, Clone)]
pub struct ObjectStorageClient {
    rest: RestClient,
}

impl ObjectStorageClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Client for an authenticated session; the configured endpoint wins over
    /// the service catalog.
    pub fn from_access(
        access: &AccessInfo,
        config: &ObjectStorageConfig,
        region: Option<&str>,
    ) -> Result<Self, AuthError> {
        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => access.require_endpoint(&config.service_type, region)?,
        };
        let rest = RestClient::new("object-store", endpoint, Some(access.token.clone()))
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        Ok(Self::new(rest))
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Scheme, host and port of the endpoint
    pub fn origin(&self) -> Result<String, ClientError> {
        let url = reqwest::Url::parse(self.rest.base_url())
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(url.origin().ascii_serialization())
    }

    /// URL path of the account, e.g. `/v1/AUTH_qe`
    pub fn account_path(&self) -> Result<String, ClientError> {
        let url = reqwest::Url::parse(self.rest.base_url())
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(url.path().trim_end_matches('/').to_string())
    }

    /// URL path of an object as used for signing: `/v1/<account>/<c>/<o>`
    pub fn object_path(&self, container: &str, object: &str) -> Result<String, ClientError> {
        Ok(format!(
            "{}/{}",
            self.account_path()?,
            Self::relative_object_path(container, object)
        ))
    }

    /// URL path of a container
    pub fn container_path(&self, container: &str) -> Result<String, ClientError> {
        Ok(format!("{}/{}", self.account_path()?, encode_segment(container)))
    }

    fn relative_object_path(container: &str, object: &str) -> String {
        format!("{}/{}", encode_segment(container), encode_object_name(object))
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        let request = headers.apply(self.rest.request(method, path));
        self.rest.send(request).await
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// List containers
    pub async fn get_account(&self, params: &ListingParams) -> Result<ApiResponse, ClientError> {
        let request = self.rest.request(Method::GET, "").query(&params.to_query());
        self.rest.send(request).await
    }

    pub async fn head_account(&self) -> Result<ApiResponse, ClientError> {
        self.call(Method::HEAD, "", &ObjectHeaders::new()).await
    }

    pub async fn set_account_metadata(
        &self,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        self.call(Method::POST, "", headers).await
    }

    /// Store the account's primary TempURL key
    pub async fn set_temp_url_key(&self, key: &str) -> Result<ApiResponse, ClientError> {
        let headers = ObjectHeaders::new().header(tempurl::TEMP_URL_KEY_HEADER, key);
        self.set_account_metadata(&headers).await
    }

    /// Store the account's secondary TempURL key, used while rotating keys
    pub async fn set_temp_url_key_2(&self, key: &str) -> Result<ApiResponse, ClientError> {
        let headers = ObjectHeaders::new().header(tempurl::TEMP_URL_KEY_2_HEADER, key);
        self.set_account_metadata(&headers).await
    }

    // ========================================================================
    // Containers
    // ========================================================================

    #[tracing::instrument(skip(self, headers))]
    pub async fn create_container(
        &self,
        container: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        self.call(Method::PUT, &encode_segment(container), headers)
            .await
    }

    pub async fn head_container(&self, container: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::HEAD, &encode_segment(container), &ObjectHeaders::new())
            .await
    }

    pub async fn list_objects(
        &self,
        container: &str,
        params: &ListingParams,
    ) -> Result<ApiResponse, ClientError> {
        let request = self
            .rest
            .request(Method::GET, &encode_segment(container))
            .query(&params.to_query());
        self.rest.send(request).await
    }

    /// List and parse in the requested format
    pub async fn list_object_entries(
        &self,
        container: &str,
        params: &ListingParams,
    ) -> Result<Vec<ListingEntry>, ClientError> {
        let response = self.list_objects(container, params).await?;
        if response.status_code() == 204 {
            return Ok(Vec::new());
        }
        listing::parse_listing(params.format, response.body())
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_container(&self, container: &str) -> Result<ApiResponse, ClientError> {
        self.call(Method::DELETE, &encode_segment(container), &ObjectHeaders::new())
            .await
    }

    pub async fn set_container_metadata(
        &self,
        container: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        self.call(Method::POST, &encode_segment(container), headers)
            .await
    }

    // ========================================================================
    // Objects
    // ========================================================================

    #[tracing::instrument(skip(self, body, headers))]
    pub async fn put_object(
        &self,
        container: &str,
        object: &str,
        body: impl Into<Bytes>,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        let path = Self::relative_object_path(container, object);
        let request = headers
            .apply(self.rest.request(Method::PUT, &path))
            .body(body.into());
        self.rest.send(request).await
    }

    pub async fn get_object(
        &self,
        container: &str,
        object: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        self.call(
            Method::GET,
            &Self::relative_object_path(container, object),
            headers,
        )
        .await
    }

    pub async fn head_object(&self, container: &str, object: &str) -> Result<ApiResponse, ClientError> {
        self.call(
            Method::HEAD,
            &Self::relative_object_path(container, object),
            &ObjectHeaders::new(),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_object(
        &self,
        container: &str,
        object: &str,
    ) -> Result<ApiResponse, ClientError> {
        self.call(
            Method::DELETE,
            &Self::relative_object_path(container, object),
            &ObjectHeaders::new(),
        )
        .await
    }

    pub async fn set_object_metadata(
        &self,
        container: &str,
        object: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        self.call(
            Method::POST,
            &Self::relative_object_path(container, object),
            headers,
        )
        .await
    }

    /// Server-side copy with the COPY verb and a `Destination` header
    pub async fn copy_object(
        &self,
        source_container: &str,
        source_object: &str,
        dest_container: &str,
        dest_object: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        let copy = Method::from_bytes(b"COPY").map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let headers = headers.clone().header(
            "Destination",
            format!("/{}", Self::relative_object_path(dest_container, dest_object)),
        );
        self.call(
            copy,
            &Self::relative_object_path(source_container, source_object),
            &headers,
        )
        .await
    }

    /// Server-side copy with a zero-byte PUT carrying `X-Copy-From`
    pub async fn copy_from(
        &self,
        dest_container: &str,
        dest_object: &str,
        source_container: &str,
        source_object: &str,
        headers: &ObjectHeaders,
    ) -> Result<ApiResponse, ClientError> {
        let headers = headers.clone().header(
            "X-Copy-From",
            format!("/{}", Self::relative_object_path(source_container, source_object)),
        );
        self.put_object(dest_container, dest_object, Bytes::new(), &headers)
            .await
    }

    /// Upload a static large object manifest
    pub async fn put_slo_manifest(
        &self,
        container: &str,
        object: &str,
        manifest: &serde_json::Value,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!(
            "{}?multipart-manifest=put",
            Self::relative_object_path(container, object)
        );
        let request = self
            .rest
            .request(Method::PUT, &path)
            .header("Content-Type", "application/json")
            .json(manifest);
        self.rest.send(request).await
    }

    /// Fetch the stored manifest of a static large object instead of its content
    pub async fn get_slo_manifest(
        &self,
        container: &str,
        object: &str,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!(
            "{}?multipart-manifest=get",
            Self::relative_object_path(container, object)
        );
        self.call(Method::GET, &path, &ObjectHeaders::new()).await
    }

    /// Delete a static large object together with its segments
    pub async fn delete_slo(&self, container: &str, object: &str) -> Result<ApiResponse, ClientError> {
        let path = format!(
            "{}?multipart-manifest=delete",
            Self::relative_object_path(container, object)
        );
        let request = self
            .rest
            .request(Method::DELETE, &path)
            .header("Accept", "application/json");
        self.rest.send(request).await
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Delete many objects and containers in one request.
    ///
    /// `paths` are `container` or `container/object`; the body lists them
    /// URL-encoded, one per line.
    #[tracing::instrument(skip_all, fields(count = paths.len()))]
    pub async fn bulk_delete<S: AsRef<str>>(&self, paths: &[S]) -> Result<ApiResponse, ClientError> {
        let body = paths
            .iter()
            .map(|path| format!("/{}", encode_object_name(path.as_ref().trim_start_matches('/'))))
            .collect::<Vec<_>>()
            .join("\n");
        let request = self
            .rest
            .request(Method::POST, "?bulk-delete")
            .header("Content-Type", "text/plain")
            .header("Accept", "application/json")
            .body(body);
        self.rest.send(request).await
    }

    /// Upload an archive and let the service unpack it into `container`
    /// (or create containers from top-level directories when empty)
    #[tracing::instrument(skip(self, archive), fields(bytes = archive.len()))]
    pub async fn extract_archive(
        &self,
        container: &str,
        format: ArchiveFormat,
        archive: Vec<u8>,
    ) -> Result<ApiResponse, ClientError> {
        let path = format!("{}?extract-archive={}", encode_segment(container), format);
        let request = self
            .rest
            .request(Method::PUT, &path)
            .header("Accept", "application/json")
            .body(archive);
        self.rest.send(request).await
    }

    // ========================================================================
    // Unauthenticated access
    // ========================================================================

    /// CORS preflight (OPTIONS) for an object
    pub async fn preflight(
        &self,
        container: &str,
        object: &str,
        origin: &str,
        method: &str,
    ) -> Result<ApiResponse, ClientError> {
        let url = self
            .rest
            .url(&Self::relative_object_path(container, object));
        let request = self
            .rest
            .request_url(Method::OPTIONS, &url)
            .header("Origin", origin)
            .header("Access-Control-Request-Method", method);
        self.rest.send(request).await
    }

    /// Request a TempURL (or any absolute URL) without a token
    pub async fn fetch_url(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
    ) -> Result<ApiResponse, ClientError> {
        let mut request = self.rest.request_url(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }
        self.rest.send(request).await
    }

    /// Submit a FormPOST form to its target path
    #[tracing::instrument(skip_all, fields(path = %form.path))]
    pub async fn post_form(
        &self,
        form: FormPost,
        key: &str,
        digest: Digest,
    ) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{}", self.origin()?, form.path);
        let body = form.into_form(key, digest)?;
        let request = self.rest.request_url(Method::POST, &url).multipart(body);
        self.rest.send(request).await
    }

    // ========================================================================
    // Waiting
    // ========================================================================

    /// Poll until the object returns 404, e.g. after it expired
    pub async fn wait_for_object_absent(
        &self,
        container: &str,
        object: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Duration, PollError<ClientError>> {
        let start = Instant::now();
        let result = wait_for_condition(
            || async {
                let response = self.head_object(container, object).await?;
                if response.status_code() == 404 {
                    Ok(())
                } else {
                    Err(CondCheckError::NotYet)
                }
            },
            &interval,
            &timeout,
        )
        .await;

        let outcome = match &result {
            Ok(()) => "ok",
            Err(PollError::TimedOut { .. }) => "timeout",
            Err(PollError::PermanentError(_)) => "failed",
        };
        crate::metrics::record_poll("object_absent", outcome, start.elapsed().as_secs_f64());
        result.map(|_| start.elapsed())
    }
}
