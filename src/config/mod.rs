//! 作用域配置
//!
//! 配置从 TOML 文件读取，缺省时使用默认值，再由环境变量覆盖。

pub mod loader;

use crate::errors::ConfigError;
use crate::infrastructure::scope::INSTANCES_MAP_CONTEXT_KEY;
use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

pub use loader::ConfigLoader;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "VERTICLE_SCOPES_";

/// 作用域配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// 实例表在上下文元数据中的键名
    pub metadata_key: String,
    /// 是否收集统计信息
    pub collect_stats: bool,
    pub logging: LoggingSettings,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            metadata_key: INSTANCES_MAP_CONTEXT_KEY.to_string(),
            collect_stats: true,
            logging: LoggingSettings::default(),
        }
    }
}

/// 日志配置段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingSettings {
    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.level).map_err(|e| {
            ConfigError::InvalidValue("logging.level".to_string(), format!("{}: {}", self.level, e))
        })
    }
}

impl ScopeConfig {
    /// 从 TOML 文本解析，`origin` 只用于错误信息
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: ScopeConfig = toml::from_str(content)
            .map_err(|e| ConfigError::TomlParse(origin.to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 用环境变量覆盖配置，键不带前缀
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(key) = env.get("METADATA_KEY") {
            self.metadata_key = key.clone();
        }
        if let Some(level) = env.get("LOG_LEVEL") {
            self.logging.level = level.clone();
        }
        if let Some(flag) = env.get("COLLECT_STATS") {
            self.collect_stats = flag.parse().map_err(|_| {
                ConfigError::InvalidValue("collect_stats".to_string(), flag.clone())
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "metadata_key".to_string(),
                "must not be empty".to_string(),
            ));
        }
        self.logging.level()?;
        Ok(())
    }
}
