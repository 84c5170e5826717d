use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::TokenStoreConfig;
use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login/";
pub const ENV_PREFIX: &str = "FLEETOPS_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: where the API lives, where tokens are kept, how we log.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub token_store: TokenStoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API settings.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Transport timeout. Zero disables it.
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    /// Credential exchange endpoint. `/api/token/` works against older deployments.
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_in_ms: default_timeout_in_ms(),
            login_path: default_login_path(),
        }
    }
}

impl ApiConfig {
    /// Config pointing at `base_url` with everything else defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

impl ConfigV1 {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

/// Build the figment: defaults, then the YAML file (if any), then `FLEETOPS_*` env vars.
pub fn build_figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Config::ConfigV1(ConfigV1::default())))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from a YAML file. A missing file leaves the defaults in place.
pub fn load_config(path: &Path) -> Result<ConfigV1, ConfigError> {
    extract(build_figment(path))
}

pub fn extract(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = match figment.extract::<Config>()? {
        Config::ConfigV1(c) => c,
    };
    config.validate()?;
    Ok(config)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), ConfigError> {
    let schema = schema_for!(Config);
    let rendered = serde_json::to_string_pretty(&schema)
        .map_err(|e| ConfigError::Invalid(format!("schema serialization failed: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
