//! Keystone v2.0 token authentication
//!
//! Supports password credentials and the `RAX-KSKEY:apiKeyCredentials`
//! extension. A [`StaticTokenAuthenticator`] covers deployments where a token
//! and endpoints are handed to the suite directly.

use super::{AccessInfo, AuthError, Authenticator, Credentials, Secret, ServiceCatalog};
use crate::client::RestClient;
use crate::config::IdentityConfig;
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(default)]
    user: Option<User>,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: ServiceCatalog,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
    #[serde(default)]
    expires: Option<String>,
    #[serde(default)]
    tenant: Option<Tenant>,
}

#[derive(Debug, Deserialize)]
struct Tenant {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct Role {
    name: String,
}

/// Build the `{"auth": ...}` request body
pub fn token_request_body(credentials: &Credentials) -> serde_json::Value {
    let mut auth = match &credentials.secret {
        Secret::Password(password) => json!({
            "passwordCredentials": {
                "username": credentials.username,
                "password": password,
            }
        }),
        Secret::ApiKey(api_key) => json!({
            "RAX-KSKEY:apiKeyCredentials": {
                "username": credentials.username,
                "apiKey": api_key,
            }
        }),
    };

    if let Some(tenant_name) = &credentials.tenant_name {
        auth["tenantName"] = json!(tenant_name);
    }
    if let Some(tenant_id) = &credentials.tenant_id {
        auth["tenantId"] = json!(tenant_id);
    }

    json!({ "auth": auth })
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Authenticator talking to a Keystone v2.0 `/tokens` endpoint
pub struct KeystoneAuthenticator {
    client: RestClient,
}

impl KeystoneAuthenticator {
    /// Create an authenticator for the identity endpoint (e.g. `https://id/v2.0`)
    pub fn new(endpoint: &str) -> Result<Self, AuthError> {
        let client = RestClient::new("identity", endpoint, None)
            .map_err(|e| AuthError::RequestError(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn endpoint(&self) -> &str {
        self.client.base_url()
    }
}

#[async_trait]
impl Authenticator for KeystoneAuthenticator {
    #[tracing::instrument(
        name = "identity.authenticate",
        skip(self, credentials),
        fields(user = %credentials.username),
        err
    )]
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessInfo, AuthError> {
        let method = match credentials.secret {
            Secret::Password(_) => "password",
            Secret::ApiKey(_) => "api_key",
        };

        let request = self
            .client
            .request(Method::POST, "/tokens")
            .header("Accept", "application/json")
            .json(&token_request_body(credentials));

        let response = self.client.send(request).await.map_err(|e| {
            metrics::record_auth_attempt(method, false);
            AuthError::RequestError(e.to_string())
        })?;

        if !matches!(response.status_code(), 200 | 203) {
            metrics::record_auth_attempt(method, false);
            return Err(AuthError::Rejected {
                status: response.status_code(),
                body: response.text(),
            });
        }

        let parsed: TokenResponse = response.json().map_err(|e| {
            metrics::record_auth_attempt(method, false);
            AuthError::InvalidResponse(e.to_string())
        })?;
        metrics::record_auth_attempt(method, true);

        let access = parsed.access;
        let (tenant_id, tenant_name) = match access.token.tenant {
            Some(tenant) => (tenant.id, tenant.name),
            None => (None, None),
        };
        let (username, roles) = match access.user {
            Some(user) => (
                user.name.unwrap_or_else(|| credentials.username.clone()),
                user.roles.into_iter().map(|r| r.name).collect(),
            ),
            None => (credentials.username.clone(), Vec::new()),
        };

        tracing::info!(
            tenant = tenant_id.as_deref().unwrap_or("-"),
            roles = ?roles,
            services = access.service_catalog.services.len(),
            "Authenticated"
        );

        Ok(AccessInfo {
            token: access.token.id,
            expires: access.token.expires.as_deref().and_then(parse_expires),
            tenant_id,
            tenant_name,
            username,
            roles,
            catalog: access.service_catalog,
        })
    }
}

/// Authenticator returning a preconfigured token without any I/O
pub struct StaticTokenAuthenticator {
    token: String,
    roles: Vec<String>,
    catalog: ServiceCatalog,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>, catalog: ServiceCatalog) -> Self {
        Self {
            token: token.into(),
            roles: Vec::new(),
            catalog,
        }
    }

    /// Role claims reported for the token
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessInfo, AuthError> {
        metrics::record_auth_attempt("static", true);
        Ok(AccessInfo {
            token: self.token.clone(),
            expires: None,
            tenant_id: credentials.tenant_id.clone(),
            tenant_name: credentials.tenant_name.clone(),
            username: credentials.username.clone(),
            roles: self.roles.clone(),
            catalog: self.catalog.clone(),
        })
    }
}

/// Pick the authenticator the identity configuration asks for
pub fn authenticator_for(config: &IdentityConfig) -> Result<Arc<dyn Authenticator>, AuthError> {
    match &config.token {
        Some(token) => Ok(Arc::new(StaticTokenAuthenticator::new(
            token.clone(),
            ServiceCatalog::from_endpoints(&config.token_endpoints),
        ))),
        None => Ok(Arc::new(KeystoneAuthenticator::new(&config.endpoint)?)),
    }
}

/// Credentials of the default identity user
pub fn credentials_for(config: &IdentityConfig) -> Result<Credentials, AuthError> {
    if config.token.is_some() {
        // Static tokens need no secret; keep the user name for logs.
        return Ok(Credentials::with_password(&config.username, "")
            .tenant_name(config.tenant_name.clone())
            .tenant_id(config.tenant_id.clone()));
    }

    Ok(Credentials::from_parts(
        &config.username,
        config.password.as_deref(),
        config.api_key.as_deref(),
    )?
    .tenant_name(config.tenant_name.clone())
    .tenant_id(config.tenant_id.clone()))
}
