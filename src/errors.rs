use thiserror::Error;

use crate::infrastructure::scope::ScopeKey;

/// 提供者返回的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 作用域操作错误
#[derive(Debug, Error)]
pub enum ScopeError {
    /// 作用域状态错误：重复进入、未进入就退出/注入、没有当前上下文
    #[error("Scope state error during '{operation}': {reason}")]
    State { operation: String, reason: String },

    /// 同一个键被重复注入（状态错误的特例）
    #[error("A value for the key {key} was already seeded in this scope")]
    DuplicateSeed { key: ScopeKey },

    /// 在作用域之外解析对象
    #[error(
        "Cannot access {key} outside of a scoping block. \
         Verticle scoped objects should be instantiated within a scoped verticle after it has started."
    )]
    OutOfScope { key: ScopeKey },

    /// 提供者创建实例失败
    #[error("Failed to provision {key}: {source}")]
    ProvisionFailed {
        key: ScopeKey,
        #[source]
        source: BoxError,
    },

    /// 缓存中的实例类型与请求类型不一致
    #[error("Type cast failed for {key}: expected '{expected}'")]
    TypeMismatch { key: ScopeKey, expected: &'static str },
}

impl ScopeError {
    pub(crate) fn state(operation: &str, reason: impl Into<String>) -> Self {
        ScopeError::State {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// 是否属于作用域状态错误（包含重复注入）
    pub fn is_state_error(&self) -> bool {
        matches!(self, ScopeError::State { .. } | ScopeError::DuplicateSeed { .. })
    }

    pub fn is_out_of_scope(&self) -> bool {
        matches!(self, ScopeError::OutOfScope { .. })
    }
}

/// Verticle 生命周期错误
#[derive(Debug, Error)]
pub enum VerticleError {
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),
    #[error("Verticle start failed: {0}")]
    Start(String),
    #[error("Verticle stop failed: {0}")]
    Stop(String),
    #[error("Deployment {0} not found")]
    DeploymentNotFound(String),
    #[error("Verticle error: {0}")]
    Other(#[source] BoxError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid configuration value for '{0}': {1}")]
    InvalidValue(String, String),
}
