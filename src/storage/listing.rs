//! Container and account listings
//!
//! [`expected_listing`] predicts what the object store returns for a set of
//! names and query parameters, so listing tests can compare against a
//! computed answer instead of hard-coded fixtures.

use serde::Deserialize;
use thiserror::Error;

/// Upper bound the service applies when no `limit` is given
pub const DEFAULT_LISTING_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("invalid JSON listing: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML listing: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

/// Response body format requested with `format=`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingFormat {
    #[default]
    Json,
    Xml,
    Plain,
}

impl ListingFormat {
    fn query_value(&self) -> Option<&'static str> {
        match self {
            ListingFormat::Json => Some("json"),
            ListingFormat::Xml => Some("xml"),
            ListingFormat::Plain => None,
        }
    }
}

/// Listing query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub end_marker: Option<String>,
    pub limit: Option<usize>,
    pub path: Option<String>,
    pub format: ListingFormat,
}

impl ListingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn end_marker(mut self, end_marker: impl Into<String>) -> Self {
        self.end_marker = Some(end_marker.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn format(mut self, format: ListingFormat) -> Self {
        self.format = format;
        self
    }

    /// Query pairs in the order the service documents them
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(format) = self.format.query_value() {
            query.push(("format", format.to_string()));
        }
        let optional = [
            ("prefix", &self.prefix),
            ("delimiter", &self.delimiter),
            ("marker", &self.marker),
            ("end_marker", &self.end_marker),
            ("path", &self.path),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                query.push((key, value.clone()));
            }
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    Object(String),
    Subdir(String),
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            ListingEntry::Object(name) | ListingEntry::Subdir(name) => name,
        }
    }

    pub fn is_subdir(&self) -> bool {
        matches!(self, ListingEntry::Subdir(_))
    }
}

/// Names of a listing, in order
pub fn entry_names(entries: &[ListingEntry]) -> Vec<&str> {
    entries.iter().map(ListingEntry::name).collect()
}

/// Entries the service should return for `names` under `params`.
///
/// `end_marker` is an exclusive upper bound. `marker` alone is an exclusive
/// lower bound (resume after the last name seen); paired with `end_marker`
/// it selects the inclusive range `[marker, end_marker)`. With a delimiter,
/// names that contain it after the prefix collapse into one subdir entry,
/// which is dropped when it equals a resume marker. `path=p` yields only
/// the direct children of `p/`.
pub fn expected_listing<S: AsRef<str>>(names: &[S], params: &ListingParams) -> Vec<ListingEntry> {
    let mut sorted: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let limit = params.limit.unwrap_or(DEFAULT_LISTING_LIMIT);

    // path=p behaves like prefix "p/" + delimiter "/" without subdir entries
    let path_prefix = params.path.as_deref().map(|path| {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    });

    let (prefix, delimiter) = match &path_prefix {
        Some(path) => (path.as_str(), Some("/")),
        None => (
            params.prefix.as_deref().unwrap_or(""),
            params.delimiter.as_deref().filter(|d| !d.is_empty()),
        ),
    };
    let marker = params.marker.as_deref();
    let end_marker = params.end_marker.as_deref();
    let resume_after = end_marker.is_none();

    let mut entries: Vec<ListingEntry> = Vec::new();
    for name in sorted {
        if entries.len() >= limit {
            break;
        }
        if marker.is_some_and(|m| name < m || (resume_after && name == m)) {
            continue;
        }
        if end_marker.is_some_and(|m| name >= m) {
            continue;
        }
        if !name.starts_with(prefix) {
            continue;
        }

        let Some(delimiter) = delimiter else {
            entries.push(ListingEntry::Object(name.to_string()));
            continue;
        };

        if path_prefix.is_some() && name == prefix {
            continue;
        }

        match name[prefix.len()..].find(delimiter) {
            Some(offset) => {
                let end = prefix.len() + offset + delimiter.len();
                if path_prefix.is_some() {
                    // Nested deeper than one level; pseudo-directory markers
                    // ending right at the delimiter still count as children.
                    if end < name.len() {
                        continue;
                    }
                    entries.push(ListingEntry::Object(name.to_string()));
                    continue;
                }

                let subdir = &name[..end];
                if resume_after && marker == Some(subdir) {
                    continue;
                }
                if entries.last().is_some_and(|last| last.name() == subdir) {
                    continue;
                }
                entries.push(ListingEntry::Subdir(subdir.to_string()));
            }
            None => entries.push(ListingEntry::Object(name.to_string())),
        }
    }

    entries
}

/// Object record of a JSON container listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// Container record of a JSON account listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub bytes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonEntry {
    Subdir { subdir: String },
    Named { name: String },
}

/// Parse a `format=json` listing (container or account)
pub fn parse_json_listing(body: &[u8]) -> Result<Vec<ListingEntry>, ListingError> {
    let entries: Vec<JsonEntry> = serde_json::from_slice(body)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            JsonEntry::Subdir { subdir } => ListingEntry::Subdir(subdir),
            JsonEntry::Named { name } => ListingEntry::Object(name),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct XmlListing {
    #[serde(rename = "$value", default)]
    entries: Vec<XmlEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum XmlEntry {
    Object(XmlNamed),
    Container(XmlNamed),
    Subdir(XmlSubdir),
}

#[derive(Debug, Deserialize)]
struct XmlNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct XmlSubdir {
    #[serde(rename = "@name")]
    name: String,
}

/// Parse a `format=xml` listing (container or account)
pub fn parse_xml_listing(body: &[u8]) -> Result<Vec<ListingEntry>, ListingError> {
    let text = String::from_utf8_lossy(body);
    let listing: XmlListing = quick_xml::de::from_str(&text)?;
    Ok(listing
        .entries
        .into_iter()
        .map(|entry| match entry {
            XmlEntry::Object(named) | XmlEntry::Container(named) => {
                ListingEntry::Object(named.name)
            }
            XmlEntry::Subdir(subdir) => ListingEntry::Subdir(subdir.name),
        })
        .collect())
}

/// Parse a plain-text listing, one name per line.
///
/// Plain listings do not mark subdirs, so every line is an object entry.
pub fn parse_plain_listing(body: &[u8]) -> Vec<ListingEntry> {
    String::from_utf8_lossy(body)
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| ListingEntry::Object(line.to_string()))
        .collect()
}

/// Parse a listing body in the given format
pub fn parse_listing(format: ListingFormat, body: &[u8]) -> Result<Vec<ListingEntry>, ListingError> {
    match format {
        ListingFormat::Json => parse_json_listing(body),
        ListingFormat::Xml => parse_xml_listing(body),
        ListingFormat::Plain => Ok(parse_plain_listing(body)),
    }
}
