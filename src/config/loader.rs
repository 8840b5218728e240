use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ScopeConfig, ENV_PREFIX};
use crate::errors::ConfigError;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "VERTICLE_SCOPES_CONFIG";

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that reads the file named by `VERTICLE_SCOPES_CONFIG`, if any
    pub fn new() -> Self {
        Self {
            path: env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
        }
    }

    /// Create a loader for an explicit file (for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Load configuration: file (when present), then environment overrides
    pub fn load(&self) -> Result<ScopeConfig, ConfigError> {
        let env_map = Self::collect_env_vars();
        self.load_with_env(&env_map)
    }

    /// Same as [`load`](Self::load) with an explicit environment map (keys without prefix)
    pub fn load_with_env(&self, env_map: &HashMap<String, String>) -> Result<ScopeConfig, ConfigError> {
        let mut config = match &self.path {
            Some(path) if path.exists() => Self::load_file(path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                ScopeConfig::default()
            }
            None => ScopeConfig::default(),
        };

        config.apply_env(env_map)?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<ScopeConfig, ConfigError> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(origin.clone(), e))?;
        tracing::debug!(path = %origin, "Loaded scope configuration");
        ScopeConfig::from_toml_str(&content, &origin)
    }

    /// Collect `VERTICLE_SCOPES_*` variables with the prefix stripped
    fn collect_env_vars() -> HashMap<String, String> {
        env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .filter(|stripped| *stripped != "CONFIG")
                    .map(|stripped| (stripped.to_string(), value))
            })
            .collect()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
