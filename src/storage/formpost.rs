//! FormPOST uploads
//!
//! Browser-style multipart uploads straight into a container, authorized by
//! an HMAC signature over the form's limits instead of a token.

use super::tempurl::{hmac_digest, Digest};
use crate::client::ClientError;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

/// One file of a FormPOST upload
#[derive(Debug, Clone)]
pub struct FormFile {
    pub filename: String,
    pub content: Bytes,
    pub content_type: Option<String>,
}

/// A signed FormPOST request
#[derive(Debug, Clone)]
pub struct FormPost {
    /// URL path the form posts to: `/v1/<account>/<container>[/<prefix>]`
    pub path: String,
    pub redirect: String,
    pub max_file_size: u64,
    pub max_file_count: u32,
    pub expires: u64,
    files: Vec<FormFile>,
    fields: Vec<(String, String)>,
}

impl FormPost {
    pub fn new(path: impl Into<String>, max_file_size: u64, max_file_count: u32, expires: u64) -> Self {
        Self {
            path: path.into(),
            redirect: String::new(),
            max_file_size,
            max_file_count,
            expires,
            files: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = redirect.into();
        self
    }

    /// Extra form attribute, sent before the files
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(
        mut self,
        filename: impl Into<String>,
        content: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> Self {
        self.files.push(FormFile {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.map(str::to_string),
        });
        self
    }

    pub fn files(&self) -> &[FormFile] {
        &self.files
    }

    /// String the signature covers
    pub fn signing_message(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            self.path, self.redirect, self.max_file_size, self.max_file_count, self.expires
        )
    }

    /// Hex HMAC of [`signing_message`](Self::signing_message)
    pub fn signature(&self, key: &str, digest: Digest) -> String {
        hex::encode(hmac_digest(
            digest,
            key.as_bytes(),
            self.signing_message().as_bytes(),
        ))
    }

    /// Multipart body: attributes first, then `file1..fileN`
    pub fn into_form(self, key: &str, digest: Digest) -> Result<Form, ClientError> {
        let signature = self.signature(key, digest);
        let mut form = Form::new()
            .text("redirect", self.redirect)
            .text("max_file_size", self.max_file_size.to_string())
            .text("max_file_count", self.max_file_count.to_string())
            .text("expires", self.expires.to_string())
            .text("signature", signature);

        for (name, value) in self.fields {
            form = form.text(name, value);
        }

        for (index, file) in self.files.into_iter().enumerate() {
            let mut part = Part::bytes(file.content.to_vec()).file_name(file.filename);
            if let Some(content_type) = &file.content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part(format!("file{}", index + 1), part);
        }

        Ok(form)
    }
}
