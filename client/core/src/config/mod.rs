//! TOML Configuration File Support
//!
//! Centralized configuration loading for the query client, supporting a TOML
//! file at `~/.config/dsclient/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [client]
//! base_url = "http://localhost:3000"
//! timeout_secs = 30
//!
//! [instance]
//! id = 7
//! uid = "prom-main"
//! name = "Prometheus"
//! type = "prometheus"
//!
//! [runtime]
//! org_id = 1
//! default_datasource = "Prometheus"
//!
//! [runtime.datasources.Prometheus]
//! id = 7
//! uid = "prom-main"
//! type = "prometheus"
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Request timeout used when nothing else is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Runtime Settings
// =============================================================================

/// One entry of the datasource name table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceEntry {
    /// Numeric datasource id
    pub id: i64,
    /// Stable datasource uid
    #[serde(default)]
    pub uid: Option<String>,
    /// Plugin type, e.g. `prometheus`
    #[serde(default, rename = "type")]
    pub plugin_type: Option<String>,
}

impl DataSourceEntry {
    /// Entry with just an id
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            uid: None,
            plugin_type: None,
        }
    }
}

/// Read-only snapshot of the server-side settings the client routes on
///
/// Handed to the client at construction; nothing mutates it afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Organization the client acts in
    pub org_id: i64,
    /// Name of the datasource `"default"` refers to
    pub default_datasource: Option<String>,
    /// Datasource name to id table
    pub datasources: HashMap<String, DataSourceEntry>,
}

impl RuntimeSettings {
    /// Empty settings for the given organization
    #[must_use]
    pub fn new(org_id: i64) -> Self {
        Self {
            org_id,
            ..Default::default()
        }
    }

    /// Register a datasource name
    #[must_use]
    pub fn with_datasource(mut self, name: impl Into<String>, entry: DataSourceEntry) -> Self {
        self.datasources.insert(name.into(), entry);
        self
    }

    /// Set the default datasource name
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_datasource = Some(name.into());
        self
    }

    /// Look up a datasource by name
    #[must_use]
    pub fn datasource(&self, name: &str) -> Option<&DataSourceEntry> {
        self.datasources.get(name)
    }

    /// Whether any table entry carries this id
    #[must_use]
    pub fn contains_id(&self, id: i64) -> bool {
        self.datasources.values().any(|entry| entry.id == id)
    }
}

/// Identity of the datasource this client talks for
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    /// Numeric datasource id
    pub id: i64,
    /// Stable datasource uid
    pub uid: Option<String>,
    /// Display name
    pub name: String,
    /// Plugin type
    #[serde(rename = "type")]
    pub plugin_type: Option<String>,
}

impl InstanceSettings {
    /// Identity with an id and name
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }
}

/// HTTP client settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSettings {
    /// Server base URL, without a trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Bearer token sent on every request
    pub api_token: Option<String>,
    /// Whether to send the organization header
    pub send_org_header: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_token: None,
            send_org_header: true,
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Client section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server base URL
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Bearer token
    pub api_token: Option<String>,

    /// Whether to send the organization header
    pub org_header: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// HTTP client section
    pub client: ClientToml,

    /// Datasource identity section
    pub instance: Option<InstanceSettings>,

    /// Runtime settings section
    pub runtime: Option<RuntimeSettings>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the query client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug, Default)]
pub struct ClientConfigFile {
    /// HTTP client settings
    pub client: ClientSettings,

    /// Datasource identity
    pub instance: InstanceSettings,

    /// Runtime settings snapshot
    pub runtime: RuntimeSettings,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl ClientConfigFile {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make every request fail
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.client.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "client.base_url must not be empty".to_string(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "client.base_url must be an http(s) URL, got {base_url}"
            )));
        }
        if self.client.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "client.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(ref name) = self.runtime.default_datasource {
            if self.runtime.datasource(name).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "runtime.default_datasource {name} is not listed in runtime.datasources"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/dsclient/client.toml` or
/// `~/.config/dsclient/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dsclient").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// merged values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or the merged values fail validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfigFile, ConfigError> {
    let mut config = ClientConfigFile::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientConfigToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfigFile, toml: ClientConfigToml) {
    if let Some(base_url) = toml.client.base_url {
        config.client.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = toml.client.timeout_secs {
        config.client.timeout = Duration::from_secs(secs);
    }
    if toml.client.api_token.is_some() {
        config.client.api_token = toml.client.api_token;
    }
    if let Some(enabled) = toml.client.org_header {
        config.client.send_org_header = enabled;
    }
    if let Some(instance) = toml.instance {
        config.instance = instance;
    }
    if let Some(runtime) = toml.runtime {
        config.runtime = runtime;
    }
}

/// Apply environment overrides, reading variables through `lookup`
fn apply_env_config<F>(config: &mut ClientConfigFile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DSCLIENT_BASE_URL") {
        config.client.base_url = url.trim_end_matches('/').to_string();
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("DSCLIENT_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
        config.client.timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(token) = lookup("DSCLIENT_API_TOKEN") {
        config.client.api_token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(id) = lookup("DSCLIENT_DATASOURCE_ID").and_then(|v| v.parse::<i64>().ok()) {
        config.instance.id = id;
        config.source = ConfigSource::Env;
    }
    if let Some(org_id) = lookup("DSCLIENT_ORG_ID").and_then(|v| v.parse::<i64>().ok()) {
        config.runtime.org_id = org_id;
        config.source = ConfigSource::Env;
    }
    if let Some(name) = lookup("DSCLIENT_DEFAULT_DATASOURCE") {
        config.runtime.default_datasource = Some(name);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Datasource id override
    pub datasource_id: Option<i64>,

    /// Timeout override (seconds)
    pub timeout_secs: Option<u64>,

    /// Token override
    pub api_token: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set datasource id override
    #[must_use]
    pub fn with_datasource_id(mut self, id: i64) -> Self {
        self.datasource_id = Some(id);
        self
    }

    /// Set timeout override
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set token override
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfigFile) {
        if self.base_url.is_some()
            || self.datasource_id.is_some()
            || self.timeout_secs.is_some()
            || self.api_token.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.client.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(id) = self.datasource_id {
            config.instance.id = id;
        }

        if let Some(secs) = self.timeout_secs {
            config.client.timeout = Duration::from_secs(secs);
        }

        if let Some(ref token) = self.api_token {
            config.client.api_token = Some(token.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
