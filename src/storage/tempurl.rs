//! Temporary URL signing
//!
//! A TempURL grants time-limited access to one object (or every object
//! under a prefix) without a token. The signature is an HMAC over
//! `"{METHOD}\n{expires}\n{path}"` keyed with the account's TempURL key.

use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Account metadata header holding the primary TempURL key
pub const TEMP_URL_KEY_HEADER: &str = "X-Account-Meta-Temp-URL-Key";
/// Account metadata header holding the secondary TempURL key
pub const TEMP_URL_KEY_2_HEADER: &str = "X-Account-Meta-Temp-URL-Key-2";

#[derive(Debug, Error)]
pub enum TempUrlError {
    #[error("unsupported digest '{0}': expected sha1, sha256 or sha512")]
    UnknownDigest(String),

    #[error("object path '{0}' must look like /v1/<account>/<container>/<object>")]
    InvalidPath(String),
}

/// HMAC digest used for signing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Digest {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl Digest {
    pub fn name(&self) -> &'static str {
        match self {
            Digest::Sha1 => "sha1",
            Digest::Sha256 => "sha256",
            Digest::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Digest {
    type Err = TempUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Digest::Sha1),
            "sha256" => Ok(Digest::Sha256),
            "sha512" => Ok(Digest::Sha512),
            other => Err(TempUrlError::UnknownDigest(other.to_string())),
        }
    }
}

/// Raw HMAC of `message` under `key`
pub(crate) fn hmac_digest(digest: Digest, key: &[u8], message: &[u8]) -> Vec<u8> {
    macro_rules! mac {
        ($hash:ty) => {{
            let mut mac =
                Hmac::<$hash>::new_from_slice(key).expect("HMAC can take key of any size");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }};
    }

    match digest {
        Digest::Sha1 => mac!(Sha1),
        Digest::Sha256 => mac!(Sha256),
        Digest::Sha512 => mac!(Sha512),
    }
}

/// Optional TempURL features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempUrlOptions {
    /// Sign for every object under this prefix of the container
    pub prefix: Option<String>,
    /// Override the download file name
    pub filename: Option<String>,
    /// Ask for `Content-Disposition: inline`
    pub inline: bool,
}

/// Signs TempURLs for one key
#[derive(Clone)]
pub struct TempUrlSigner {
    key: String,
    digest: Digest,
    /// Emit `<digest>:<base64url>` instead of hex
    prefixed_signature: bool,
}

impl fmt::Debug for TempUrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempUrlSigner")
            .field("key", &"***")
            .field("digest", &self.digest)
            .field("prefixed_signature", &self.prefixed_signature)
            .finish()
    }
}

impl TempUrlSigner {
    pub fn new(key: impl Into<String>, digest: Digest) -> Self {
        Self {
            key: key.into(),
            digest,
            prefixed_signature: false,
        }
    }

    /// Use the `sha256:<base64>` signature form. Ignored for sha1.
    pub fn with_prefixed_signature(mut self, prefixed: bool) -> Self {
        self.prefixed_signature = prefixed;
        self
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Signature for `method` on `path` until `expires` (unix seconds).
    ///
    /// `path` is the URL path (`/v1/AUTH_x/c/o`), or for prefix-scoped URLs
    /// the container path plus prefix, signed as `prefix:{path}`.
    pub fn sign(&self, method: &str, expires: u64, path: &str, prefix_scoped: bool) -> String {
        let path = if prefix_scoped {
            format!("prefix:{}", path)
        } else {
            path.to_string()
        };
        let message = format!("{}\n{}\n{}", method.to_ascii_uppercase(), expires, path);
        let raw = hmac_digest(self.digest, self.key.as_bytes(), message.as_bytes());

        if self.prefixed_signature && self.digest != Digest::Sha1 {
            format!(
                "{}:{}",
                self.digest,
                base64::engine::general_purpose::URL_SAFE.encode(raw)
            )
        } else {
            hex::encode(raw)
        }
    }

    /// Full TempURL for the object at `object_path` on `origin`
    /// (`http://host:port`).
    pub fn temp_url(
        &self,
        origin: &str,
        object_path: &str,
        method: &str,
        expires: u64,
        options: &TempUrlOptions,
    ) -> Result<String, TempUrlError> {
        let signature = match &options.prefix {
            Some(prefix) => {
                let signed = prefix_signing_path(object_path, prefix)?;
                self.sign(method, expires, &signed, true)
            }
            None => self.sign(method, expires, object_path, false),
        };

        let mut url = format!(
            "{}{}?temp_url_sig={}&temp_url_expires={}",
            origin.trim_end_matches('/'),
            object_path,
            utf8_percent_encode(&signature, NON_ALPHANUMERIC),
            expires
        );
        if let Some(prefix) = &options.prefix {
            url.push_str("&temp_url_prefix=");
            url.push_str(&utf8_percent_encode(prefix, NON_ALPHANUMERIC).to_string());
        }
        if let Some(filename) = &options.filename {
            url.push_str("&filename=");
            url.push_str(&utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string());
        }
        if options.inline {
            url.push_str("&inline");
        }
        Ok(url)
    }
}

/// `/v1/<account>/<container>/<prefix>` for an object path
fn prefix_signing_path(object_path: &str, prefix: &str) -> Result<String, TempUrlError> {
    let mut parts = object_path.splitn(5, '/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(""), Some(version), Some(account), Some(container))
            if !version.is_empty() && !account.is_empty() && !container.is_empty() =>
        {
            Ok(format!("/{}/{}/{}/{}", version, account, container, prefix))
        }
        _ => Err(TempUrlError::InvalidPath(object_path.to_string())),
    }
}

/// Unix timestamp `ttl` from now
pub fn expires_in(ttl: Duration) -> u64 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    now + ttl.as_secs()
}
