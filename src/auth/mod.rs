//! Authentication module
//!
//! Obtains tokens and service catalogs from the identity service. Every
//! session the suite opens (the default user and the three RBAC users) goes
//! through an [`Authenticator`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod catalog;
pub mod keystone;

pub use catalog::{CatalogEndpoint, CatalogService, ServiceCatalog};
pub use keystone::{KeystoneAuthenticator, StaticTokenAuthenticator};

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing credentials for user '{0}'")]
    MissingCredentials(String),

    #[error("Identity service rejected credentials (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid identity response: {0}")]
    InvalidResponse(String),

    #[error("No '{service_type}' endpoint in service catalog (region: {region:?})")]
    EndpointNotFound {
        service_type: String,
        region: Option<String>,
    },

    #[error("Identity request failed: {0}")]
    RequestError(String),
}

/// Secret used to authenticate
#[derive(Clone, PartialEq)]
pub enum Secret {
    Password(String),
    ApiKey(String),
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Password(_) => f.write_str("Password(***)"),
            Secret::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

/// Credentials of one user
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: Secret,
    pub tenant_name: Option<String>,
    pub tenant_id: Option<String>,
}

impl Credentials {
    pub fn with_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::Password(password.into()),
            tenant_name: None,
            tenant_id: None,
        }
    }

    pub fn with_api_key(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::ApiKey(api_key.into()),
            tenant_name: None,
            tenant_id: None,
        }
    }

    pub fn tenant_name(mut self, tenant_name: Option<String>) -> Self {
        self.tenant_name = tenant_name;
        self
    }

    pub fn tenant_id(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Build from optional password / api key, preferring the api key
    pub fn from_parts(
        username: &str,
        password: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Self, AuthError> {
        match (api_key, password) {
            (Some(key), _) => Ok(Self::with_api_key(username, key)),
            (None, Some(password)) => Ok(Self::with_password(username, password)),
            (None, None) => Err(AuthError::MissingCredentials(username.to_string())),
        }
    }
}

/// Result of a successful authentication
#[derive(Debug, Clone)]
pub struct AccessInfo {
    pub token: String,
    pub expires: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub username: String,
    pub roles: Vec<String>,
    pub catalog: ServiceCatalog,
}

impl AccessInfo {
    /// Whether the session's role claims contain `role`
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Public endpoint for a service type
    pub fn endpoint_for(&self, service_type: &str, region: Option<&str>) -> Option<String> {
        self.catalog.public_url(service_type, region)
    }

    /// Like [`endpoint_for`](Self::endpoint_for) but as an error when absent
    pub fn require_endpoint(
        &self,
        service_type: &str,
        region: Option<&str>,
    ) -> Result<String, AuthError> {
        self.endpoint_for(service_type, region)
            .ok_or_else(|| AuthError::EndpointNotFound {
                service_type: service_type.to_string(),
                region: region.map(str::to_string),
            })
    }

    /// Whether the token expires within `margin`
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        match self.expires {
            Some(expires) => expires - Utc::now() <= margin,
            None => false,
        }
    }
}

/// Authenticator trait
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for a token and service catalog
    async fn authenticate(&self, credentials: &Credentials) -> Result<AccessInfo, AuthError>;
}
