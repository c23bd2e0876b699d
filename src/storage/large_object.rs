//! Segmented large objects
//!
//! A large object is a set of ordinary segment objects plus a manifest. The
//! dynamic flavour (DLO) names a container/prefix in `X-Object-Manifest`;
//! the static flavour (SLO) uploads a JSON list of segment paths, ETags and
//! sizes. Either way the object's ETag is the MD5 of the concatenated
//! segment MD5 hex digests.
//!
//! Random content is never held whole: each segment is derived from the seed
//! and its index, hashed once at generation and regenerated at upload.

use super::{ObjectHeaders, ObjectStorageClient};
use crate::client::{ApiResponse, ClientError};
use crate::metrics;
use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LargeObjectError {
    #[error("segment size must be greater than zero")]
    ZeroSegmentSize,

    #[error("supplied content is {actual} bytes but the plan covers {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// How a total length splits into segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    total: u64,
    segment_size: u64,
}

impl SegmentPlan {
    pub fn new(total: u64, segment_size: u64) -> Result<Self, LargeObjectError> {
        if segment_size == 0 {
            return Err(LargeObjectError::ZeroSegmentSize);
        }
        Ok(Self {
            total,
            segment_size,
        })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    /// `ceil(total / segment_size)`; zero for an empty object
    pub fn count(&self) -> usize {
        self.total.div_ceil(self.segment_size) as usize
    }

    /// `(offset, len)` of every segment; only the last may be short and
    /// none is empty
    pub fn ranges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        (0..self.count() as u64).map(move |index| {
            let offset = index * self.segment_size;
            (offset, self.segment_size.min(self.total - offset))
        })
    }
}

/// Where segment content comes from
#[derive(Debug, Clone)]
pub enum SegmentSource {
    /// Caller-provided bytes, split according to the plan
    Supplied(Bytes),
    /// Deterministic pseudo-random bytes, generated one segment at a time
    Random { seed: u64 },
}

impl SegmentSource {
    /// Bytes of the segment at `index`, covering `offset..offset + len`
    pub fn segment_bytes(&self, index: usize, offset: u64, len: u64) -> Bytes {
        match self {
            SegmentSource::Supplied(data) => data.slice(offset as usize..(offset + len) as usize),
            SegmentSource::Random { seed } => {
                let mut rng_seed = [0u8; 32];
                rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
                rng_seed[8..16].copy_from_slice(&(index as u64).to_le_bytes());
                let mut rng = StdRng::from_seed(rng_seed);
                let mut buf = BytesMut::zeroed(len as usize);
                rng.fill_bytes(&mut buf);
                buf.freeze()
            }
        }
    }
}

/// One uploaded (or to-be-uploaded) segment
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub name: String,
    /// MD5 hex digest of the segment content
    pub etag: String,
    offset: u64,
    size: u64,
}

impl Segment {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A segment the service refused
#[derive(Debug, Clone)]
pub struct SegmentFailure {
    pub index: usize,
    pub name: String,
    pub status: u16,
    pub body: String,
}

/// What an upload achieved
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub segments_uploaded: usize,
    /// First segment that failed; later segments were not attempted
    pub failed_segment: Option<SegmentFailure>,
    /// Manifest response, absent when a segment failed
    pub manifest: Option<ApiResponse>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed_segment.is_none() && self.manifest.as_ref().is_some_and(|m| m.is_success())
    }
}

/// A generated large object and its expected properties
#[derive(Debug, Clone)]
pub struct LargeObject {
    pub container: String,
    pub name: String,
    pub segment_container: String,
    pub segment_prefix: String,
    source: SegmentSource,
    segments: Vec<Segment>,
}

impl LargeObject {
    /// Split content per `plan` into named, checksummed segments.
    ///
    /// Segments live in `container` under `<name>_segments/`, named with a
    /// zero-padded index so they list in upload order.
    pub fn generate(
        container: impl Into<String>,
        name: impl Into<String>,
        plan: SegmentPlan,
        source: SegmentSource,
    ) -> Result<Self, LargeObjectError> {
        let container = container.into();
        let name = name.into();
        let segment_prefix = format!("{}_segments/", name);

        if let SegmentSource::Supplied(data) = &source {
            if data.len() as u64 != plan.total() {
                return Err(LargeObjectError::SizeMismatch {
                    expected: plan.total(),
                    actual: data.len() as u64,
                });
            }
        }

        let segments = plan
            .ranges()
            .enumerate()
            .map(|(index, (offset, size))| Segment {
                index,
                name: format!("{}{:08}", segment_prefix, index),
                etag: format!("{:x}", md5::compute(source.segment_bytes(index, offset, size))),
                offset,
                size,
            })
            .collect();

        Ok(Self {
            segment_container: container.clone(),
            container,
            name,
            segment_prefix,
            source,
            segments,
        })
    }

    /// Keep segments in a separate container
    pub fn with_segment_container(mut self, container: impl Into<String>) -> Self {
        self.segment_container = container.into();
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn total_len(&self) -> u64 {
        self.segments.iter().map(Segment::size).sum()
    }

    /// Content of one segment
    pub fn segment_data(&self, segment: &Segment) -> Bytes {
        self.source
            .segment_bytes(segment.index, segment.offset, segment.size)
    }

    /// The full object as a GET should return it.
    ///
    /// Materializes every segment; meant for verifying small objects.
    pub fn content(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.total_len() as usize);
        for segment in &self.segments {
            buf.extend_from_slice(&self.segment_data(segment));
        }
        buf.freeze()
    }

    /// Expected object ETag: MD5 of the concatenated segment MD5 hex strings
    pub fn etag(&self) -> String {
        let joined: String = self.segments.iter().map(|s| s.etag.as_str()).collect();
        format!("{:x}", md5::compute(joined.as_bytes()))
    }

    /// `X-Object-Manifest` value for the dynamic flavour
    pub fn manifest_prefix(&self) -> String {
        format!("{}/{}", self.segment_container, self.segment_prefix)
    }

    /// Static manifest body
    pub fn slo_manifest(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.segments
                .iter()
                .map(|segment| {
                    json!({
                        "path": format!("/{}/{}", self.segment_container, segment.name),
                        "etag": segment.etag,
                        "size_bytes": segment.size(),
                    })
                })
                .collect(),
        )
    }

    async fn upload_segments(
        &self,
        client: &ObjectStorageClient,
        kind: &str,
    ) -> Result<(usize, Option<SegmentFailure>), ClientError> {
        let mut uploaded = 0;
        for segment in &self.segments {
            let headers = ObjectHeaders::new().etag(&segment.etag);
            let response = client
                .put_object(
                    &self.segment_container,
                    &segment.name,
                    self.segment_data(segment),
                    &headers,
                )
                .await?;

            let ok = response.status_code() == 201;
            metrics::record_segment_upload(kind, ok);
            if !ok {
                tracing::warn!(
                    segment = segment.index,
                    status = response.status_code(),
                    "Segment upload failed, stopping"
                );
                return Ok((
                    uploaded,
                    Some(SegmentFailure {
                        index: segment.index,
                        name: segment.name.clone(),
                        status: response.status_code(),
                        body: response.text(),
                    }),
                ));
            }
            uploaded += 1;
        }
        Ok((uploaded, None))
    }

    /// Upload segments, then a zero-byte DLO manifest.
    ///
    /// Stops at the first failed segment; uploaded segments are left in place.
    #[tracing::instrument(skip_all, fields(object = %self.name, segments = self.segments.len()))]
    pub async fn upload_dynamic(
        &self,
        client: &ObjectStorageClient,
    ) -> Result<UploadReport, ClientError> {
        let (segments_uploaded, failed_segment) = self.upload_segments(client, "dlo").await?;
        if failed_segment.is_some() {
            return Ok(UploadReport {
                segments_uploaded,
                failed_segment,
                manifest: None,
            });
        }

        let headers = ObjectHeaders::new().object_manifest(&self.manifest_prefix());
        let manifest = client
            .put_object(&self.container, &self.name, Bytes::new(), &headers)
            .await?;
        Ok(UploadReport {
            segments_uploaded,
            failed_segment: None,
            manifest: Some(manifest),
        })
    }

    /// Upload segments, then the SLO manifest with `?multipart-manifest=put`.
    ///
    /// Stops at the first failed segment; uploaded segments are left in place.
    #[tracing::instrument(skip_all, fields(object = %self.name, segments = self.segments.len()))]
    pub async fn upload_static(
        &self,
        client: &ObjectStorageClient,
    ) -> Result<UploadReport, ClientError> {
        let (segments_uploaded, failed_segment) = self.upload_segments(client, "slo").await?;
        if failed_segment.is_some() {
            return Ok(UploadReport {
                segments_uploaded,
                failed_segment,
                manifest: None,
            });
        }

        let manifest = client
            .put_slo_manifest(&self.container, &self.name, &self.slo_manifest())
            .await?;
        Ok(UploadReport {
            segments_uploaded,
            failed_segment: None,
            manifest: Some(manifest),
        })
    }
}
