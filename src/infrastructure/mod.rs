//! 基础设施层
//!
//! 提供具体的技术实现，包括：
//! - 执行上下文及其跨线程传播
//! - 宿主运行时（verticle 部署）
//! - Verticle 作用域存储
//! - 生命周期拦截器与装配模块

pub mod context;
pub mod host;
pub mod interceptor;
pub mod module;
pub mod scope;

// 重新导出API
pub use context::{ContextGuard, ExecutionContext};
pub use host::{DeploymentId, Verticle, Vertx};
pub use interceptor::ScopedVerticleInterceptor;
pub use module::VerticleScopesModule;
pub use scope::{Key, Provider, Provision, ScopeKey, ScopedProvider, VerticleScope};
