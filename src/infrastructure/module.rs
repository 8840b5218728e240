//! 作用域装配模块
//!
//! 持有共享的 [`VerticleScope`]，负责把未加作用域的提供者绑定到作用域上，
//! 并为 verticle 套上生命周期拦截器。

use crate::config::ScopeConfig;
use crate::infrastructure::interceptor::ScopedVerticleInterceptor;
use crate::infrastructure::scope::{provider_fn, Key, Provider, ScopedProvider, VerticleScope};
use std::sync::Arc;

#[derive(Clone)]
pub struct VerticleScopesModule {
    scope: Arc<VerticleScope>,
}

impl VerticleScopesModule {
    pub fn new() -> Self {
        Self::from_config(&ScopeConfig::default())
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        tracing::debug!(metadata_key = %config.metadata_key, "Configuring verticle scopes module");
        Self {
            scope: Arc::new(VerticleScope::from_config(config)),
        }
    }

    pub fn scope(&self) -> Arc<VerticleScope> {
        Arc::clone(&self.scope)
    }

    /// 绑定作用域提供者
    pub fn scoped<T, P>(&self, key: Key<T>, unscoped: P) -> ScopedProvider<T>
    where
        T: Send + Sync + 'static,
        P: Provider<T> + 'static,
    {
        self.scope.scope(key, unscoped)
    }

    /// 以类型的无限定键绑定一个简单工厂
    pub fn scoped_type<T, F>(&self, factory: F) -> ScopedProvider<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.scoped(Key::get(), provider_fn(factory))
    }

    /// 绑定一个只能通过注入获得的键
    pub fn seeded<T: Send + Sync + 'static>(&self, key: Key<T>) -> ScopedProvider<T> {
        self.scoped(key, VerticleScope::seeded_key_provider::<T>())
    }

    /// 为 verticle 套上作用域拦截器
    pub fn intercept<V>(&self, verticle: V) -> ScopedVerticleInterceptor<V> {
        ScopedVerticleInterceptor::new(self.scope(), verticle)
    }
}

impl Default for VerticleScopesModule {
    fn default() -> Self {
        Self::new()
    }
}
