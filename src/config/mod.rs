//! Configuration module for Cloudroast
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion, `CLOUDROAST__*` overrides and validation.
//!
//! # Example
//!
//! ```yaml
//! identity:
//!   endpoint: "https://identity.example.com/v2.0"
//!   username: "qe-user"
//!   api_key: "${QE_API_KEY}"
//!   tenant_name: "qe-tenant"
//! dbaas:
//!   flavor_ref: "1"
//!   poll:
//!     interval_secs: 10
//!     timeout_secs: 900
//! object_storage:
//!   tempurl_key: "${TEMPURL_KEY:-secret}"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static::lazy_static! {
    static ref ENV_VAR_PATTERN: regex_lite::Regex =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}")
            .expect("env var pattern is a valid regex");
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// assert_eq!(expand_env_vars("prefix-${MY_VAR}-suffix"), "prefix-value-suffix");
/// assert_eq!(expand_env_vars("${MISSING:-default}"), "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in ENV_VAR_PATTERN.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

const REDACTED: &str = "<redacted>";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ::config::ConfigError),

    #[error("Failed to render config: {0}")]
    RenderError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub identity: IdentityConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub dbaas: DbaasConfig,
    #[serde(default)]
    pub object_storage: ObjectStorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let identity = &self.identity;
        if identity.token.is_none() {
            if !is_valid_http_url(&identity.endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid identity endpoint: must start with http:// or https://".into(),
                ));
            }
            if identity.password.is_none() && identity.api_key.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Identity user '{}' needs a password, an api_key or a static token",
                    identity.username
                )));
            }
        } else if identity.token_endpoints.is_empty() {
            return Err(ConfigError::ValidationError(
                "Static token mode requires at least one entry in token_endpoints".into(),
            ));
        }

        for (role, user) in self.roles.iter() {
            if user.password.is_none() && user.api_key.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Role '{}' user '{}' needs a password or an api_key",
                    role, user.username
                )));
            }
        }

        let poll = &self.dbaas.poll;
        if poll.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dbaas.poll.interval_secs must be greater than zero".into(),
            ));
        }
        if poll.timeout_secs < poll.interval_secs {
            return Err(ConfigError::ValidationError(format!(
                "dbaas.poll.timeout_secs ({}) is shorter than interval_secs ({})",
                poll.timeout_secs, poll.interval_secs
            )));
        }

        if self.object_storage.segment_size == 0 {
            return Err(ConfigError::ValidationError(
                "object_storage.segment_size must be greater than zero".into(),
            ));
        }

        match self.object_storage.tempurl_digest.as_str() {
            "sha1" | "sha256" | "sha512" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid tempurl_digest '{}': must be 'sha1', 'sha256' or 'sha512'",
                    other
                )))
            }
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid logging format '{}': must be 'text' or 'json'",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Copy of this configuration with every secret replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.identity.redact();
        for user in [
            &mut copy.roles.admin,
            &mut copy.roles.creator,
            &mut copy.roles.observer,
        ]
        .into_iter()
        .flatten()
        {
            user.redact();
        }
        if copy.object_storage.tempurl_key.is_some() {
            copy.object_storage.tempurl_key = Some(REDACTED.into());
        }
        copy
    }

    /// Render as YAML (secrets redacted)
    pub fn to_redacted_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.redacted())?)
    }
}

/// Identity (Keystone v2.0 style) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Pre-issued token; skips the identity call entirely.
    #[serde(default)]
    pub token: Option<String>,
    /// Service type -> endpoint URL, used with `token`.
    #[serde(default)]
    pub token_endpoints: HashMap<String, String>,
}

impl IdentityConfig {
    fn redact(&mut self) {
        for secret in [&mut self.password, &mut self.api_key, &mut self.token] {
            if secret.is_some() {
                *secret = Some(REDACTED.into());
            }
        }
    }
}

/// Credentials of one role-scoped user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUserConfig {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    /// Role name the session's claims must contain. Defaults to the role itself.
    #[serde(default)]
    pub expected_role: Option<String>,
}

impl RoleUserConfig {
    fn redact(&mut self) {
        for secret in [&mut self.password, &mut self.api_key] {
            if secret.is_some() {
                *secret = Some(REDACTED.into());
            }
        }
    }
}

/// RBAC users
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub admin: Option<RoleUserConfig>,
    #[serde(default)]
    pub creator: Option<RoleUserConfig>,
    #[serde(default)]
    pub observer: Option<RoleUserConfig>,
}

impl RolesConfig {
    /// Configured users keyed by role name
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &RoleUserConfig)> {
        [
            ("admin", self.admin.as_ref()),
            ("creator", self.creator.as_ref()),
            ("observer", self.observer.as_ref()),
        ]
        .into_iter()
        .filter_map(|(role, user)| user.map(|u| (role, u)))
    }
}

/// Database-as-a-service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbaasConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_dbaas_service_type")]
    pub service_type: String,
    #[serde(default = "default_flavor_ref")]
    pub flavor_ref: String,
    #[serde(default = "default_resize_flavor_ref")]
    pub resize_flavor_ref: String,
    #[serde(default = "default_volume_size")]
    pub volume_size: u32,
    #[serde(default = "default_resize_volume_size")]
    pub resize_volume_size: u32,
    #[serde(default)]
    pub poll: PollConfig,
    /// Status returned for operations a role is not permitted to perform.
    #[serde(default = "default_denied_status")]
    pub denied_status: u16,
}

impl Default for DbaasConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_type: default_dbaas_service_type(),
            flavor_ref: default_flavor_ref(),
            resize_flavor_ref: default_resize_flavor_ref(),
            volume_size: default_volume_size(),
            resize_volume_size: default_resize_volume_size(),
            poll: PollConfig::default(),
            denied_status: default_denied_status(),
        }
    }
}

fn default_dbaas_service_type() -> String {
    "rax:database".to_string()
}

fn default_flavor_ref() -> String {
    "1".to_string()
}

fn default_resize_flavor_ref() -> String {
    "2".to_string()
}

fn default_volume_size() -> u32 {
    1
}

fn default_resize_volume_size() -> u32 {
    2
}

fn default_denied_status() -> u16 {
    405
}

/// Status polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_timeout() -> u64 {
    900
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_storage_service_type")]
    pub service_type: String,
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,
    #[serde(default)]
    pub tempurl_key: Option<String>,
    #[serde(default = "default_tempurl_digest")]
    pub tempurl_digest: String,
    #[serde(default = "default_expiry_wait")]
    pub expiry_wait_secs: u64,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_type: default_storage_service_type(),
            segment_size: default_segment_size(),
            tempurl_key: None,
            tempurl_digest: default_tempurl_digest(),
            expiry_wait_secs: default_expiry_wait(),
            name_prefix: default_name_prefix(),
        }
    }
}

fn default_storage_service_type() -> String {
    "object-store".to_string()
}

fn default_segment_size() -> usize {
    1048576 // 1MB
}

fn default_tempurl_digest() -> String {
    "sha1".to_string()
}

fn default_expiry_wait() -> u64 {
    60
}

fn default_name_prefix() -> String {
    "qe_".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset. Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json". Default: "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Where the CLI writes the Prometheus text exposition after a run.
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            output: None,
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

#[cfg(test)]
pub(crate) fn test_config(identity_endpoint: &str) -> Config {
    Config {
        identity: IdentityConfig {
            endpoint: identity_endpoint.to_string(),
            username: "qe-user".into(),
            password: Some("secret".into()),
            api_key: None,
            tenant_name: Some("qe-tenant".into()),
            tenant_id: None,
            region: None,
            token: None,
            token_endpoints: HashMap::new(),
        },
        roles: RolesConfig::default(),
        dbaas: DbaasConfig::default(),
        object_storage: ObjectStorageConfig::default(),
        logging: LoggingConfig::default(),
        metrics: MetricsConfig::default(),
    }
}
