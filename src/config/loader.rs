//! Configuration loader with environment variable expansion and overrides

use super::{expand_env_vars, Config, ConfigError};
use ::config::{Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `CLOUDROAST__IDENTITY__USERNAME`
pub const ENV_PREFIX: &str = "CLOUDROAST";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from YAML text
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = ::config::Config::builder()
            .add_source(File::from_str(&expanded, FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
