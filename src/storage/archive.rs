//! Archive extraction and bulk delete payloads

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unsupported archive format '{0}': expected tar, tar.gz or tar.bz2")]
    UnknownFormat(String),

    #[error("failed to build archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bulk operation response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Archive formats accepted by `?extract-archive=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarBz2 => "tar.bz2",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "tar.bz2" | "tbz2" => Ok(ArchiveFormat::TarBz2),
            other => Err(ArchiveError::UnknownFormat(other.to_string())),
        }
    }
}

/// Build an in-memory archive of `(path, content)` entries
pub fn build_archive<P, C>(entries: &[(P, C)], format: ArchiveFormat) -> Result<Vec<u8>, ArchiveError>
where
    P: AsRef<str>,
    C: AsRef<[u8]>,
{
    let tar = build_tar(entries)?;
    match format {
        ArchiveFormat::Tar => Ok(tar),
        ArchiveFormat::TarGz => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&tar)?;
            Ok(encoder.finish()?)
        }
        ArchiveFormat::TarBz2 => {
            let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(&tar)?;
            Ok(encoder.finish()?)
        }
    }
}

fn build_tar<P, C>(entries: &[(P, C)]) -> Result<Vec<u8>, ArchiveError>
where
    P: AsRef<str>,
    C: AsRef<[u8]>,
{
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in entries {
        let content = content.as_ref();
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(&mut header, path.as_ref(), content)?;
    }
    Ok(builder.into_inner()?)
}

/// `[path, status]` pairs the service reports for failed entries
pub type FailedEntries = Vec<(String, String)>;

/// Result body of `PUT ?extract-archive=`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractArchiveResult {
    #[serde(rename = "Number Files Created")]
    pub files_created: u64,
    #[serde(rename = "Response Status")]
    pub response_status: String,
    #[serde(rename = "Response Body", default)]
    pub response_body: String,
    #[serde(rename = "Errors", default)]
    pub errors: FailedEntries,
}

impl ExtractArchiveResult {
    pub fn parse(body: &[u8]) -> Result<Self, ArchiveError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Status code at the start of `Response Status` ("201 Created")
    pub fn status_code(&self) -> Option<u16> {
        leading_status(&self.response_status)
    }
}

/// Result body of `POST ?bulk-delete`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkDeleteResult {
    #[serde(rename = "Number Deleted")]
    pub deleted: u64,
    #[serde(rename = "Number Not Found")]
    pub not_found: u64,
    #[serde(rename = "Response Status")]
    pub response_status: String,
    #[serde(rename = "Response Body", default)]
    pub response_body: String,
    #[serde(rename = "Errors", default)]
    pub errors: FailedEntries,
}

impl BulkDeleteResult {
    pub fn parse(body: &[u8]) -> Result<Self, ArchiveError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn status_code(&self) -> Option<u16> {
        leading_status(&self.response_status)
    }
}

fn leading_status(status: &str) -> Option<u16> {
    status.split_whitespace().next()?.parse().ok()
}
