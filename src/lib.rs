pub mod config;
pub mod errors;
pub mod infrastructure; // 执行上下文、作用域存储、拦截器与部署器
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigLoader, ScopeConfig};
pub use errors::{ScopeError, VerticleError};
pub use infrastructure::{
    ExecutionContext, Key, Provider, Provision, ScopeKey, ScopedProvider,
    ScopedVerticleInterceptor, Verticle, VerticleScope, VerticleScopesModule, Vertx,
};
