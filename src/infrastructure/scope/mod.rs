//! Verticle 作用域
//!
//! 提供按执行上下文缓存对象的作用域实现：
//! - 作用域键（类型 + 可选限定名）
//! - 提供者与占位对象
//! - 作用域存储及按作用域缓存的提供者

pub mod key;
pub mod provision;
pub mod store;

pub use key::{Key, ScopeKey};
pub use provision::{provider_fn, FnProvider, Provider, Provision, SeededKeyProvider};
pub use store::{ScopeStats, ScopedProvider, VerticleScope, INSTANCES_MAP_CONTEXT_KEY};
