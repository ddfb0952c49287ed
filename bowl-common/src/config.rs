//! Configuration loading and config file resolution
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config dir>/bowl/<module>.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: the service logs a warning and
//! starts with defaults. A present but invalid file is an error.

use crate::params::EngineParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BOWL_CONFIG";

/// Default listen address for the recommendation service
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level; `RUST_LOG` directives still apply on top
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// TOML configuration file contents
///
/// ```toml
/// bind_address = "0.0.0.0:5740"
/// menu_path = "/etc/bowl/menu.toml"
///
/// [logging]
/// level = "debug"
///
/// [engine]
/// primary_timeout_ms = 2500
/// retry_attempts = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_path: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Engine parameter overrides, keyed by parameter name
    #[serde(default)]
    pub engine: toml::Table,
}

impl TomlConfig {
    /// Build engine parameters: defaults, then `[engine]` overrides
    ///
    /// Every override goes through the parameter metadata validators and the
    /// final set is checked for cross-parameter consistency.
    pub fn engine_params(&self) -> Result<EngineParams> {
        let mut params = EngineParams::default();

        for (key, value) in &self.engine {
            let raw = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(Error::Config(format!(
                        "{}: unsupported value type {}",
                        key,
                        other.type_str()
                    )))
                }
            };
            params.set(key, &raw).map_err(Error::Config)?;
            debug!(parameter = %key, value = %raw, "Engine parameter override applied");
        }

        params.validate().map_err(Error::Config)?;
        Ok(params)
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }
}

/// Resolves which config file a module should read
pub struct ConfigFileResolver {
    module_name: String,
}

impl ConfigFileResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Resolve the config file path, or `None` to run on compiled defaults
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file, only if it exists
        let user_config = self.default_config_path()?;
        if user_config.exists() {
            return Some(user_config);
        }

        // Priority 4: Compiled defaults
        None
    }

    /// `<config dir>/bowl/<module>.toml` for the current platform
    pub fn default_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bowl").join(format!("{}.toml", self.module_name)))
    }
}

/// Load configuration, degrading to defaults when no file is available
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using compiled defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write configuration to a TOML file
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
