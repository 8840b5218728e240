//! Verticle 作用域
//!
//! 每个执行上下文在 enter 与 exit 之间持有一张实例表，表作为上下文元数据保存，
//! 因此同一上下文中派发到其它线程的工作看到的是同一张表。

use super::key::{Key, ScopeKey};
use super::provision::{Provider, Provision, SeededKeyProvider};
use crate::config::ScopeConfig;
use crate::errors::ScopeError;
use crate::infrastructure::context::ExecutionContext;
use parking_lot::ReentrantMutex;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 默认的上下文元数据键
pub const INSTANCES_MAP_CONTEXT_KEY: &str = "_verticle-scoped-instances";

type Instance = Arc<dyn Any + Send + Sync>;

/// 一个上下文的实例表
///
/// 整张表由一把可重入锁保护，构造期间一直持有：同一上下文中的构造串行进行，
/// 同一线程上的构造环会再次进入这把锁，此时提供者应返回占位对象。
/// 锁只属于这一张表，不同上下文互不影响。
pub(crate) struct ScopeInstanceMap {
    table: ReentrantMutex<RefCell<HashMap<ScopeKey, Instance>>>,
}

impl ScopeInstanceMap {
    fn new() -> Self {
        Self {
            table: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    fn len(&self) -> usize {
        self.table.lock().borrow().len()
    }
}

/// 内部统计（原子计数器）
#[derive(Default)]
struct InnerStats {
    scopes_entered: AtomicU64,
    scopes_exited: AtomicU64,
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    constructions: AtomicU64,
    placeholders: AtomicU64,
    seeds: AtomicU64,
}

/// 作用域统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeStats {
    pub scopes_entered: u64,
    pub scopes_exited: u64,
    pub resolutions: u64,
    pub cache_hits: u64,
    pub constructions: u64,
    pub placeholders: u64,
    pub seeds: u64,
}

impl ScopeStats {
    /// 缓存命中率（小数形式）
    pub fn hit_rate(&self) -> f64 {
        if self.resolutions == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.resolutions as f64
        }
    }

    /// 当前仍处于激活状态的作用域数量
    pub fn active_scopes(&self) -> u64 {
        self.scopes_entered.saturating_sub(self.scopes_exited)
    }
}

/// 绑定到执行上下文的作用域存储
pub struct VerticleScope {
    metadata_key: String,
    collect_stats: bool,
    stats: InnerStats,
}

impl VerticleScope {
    pub fn new() -> Self {
        Self::from_config(&ScopeConfig::default())
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self {
            metadata_key: config.metadata_key.clone(),
            collect_stats: config.collect_stats,
            stats: InnerStats::default(),
        }
    }

    pub fn metadata_key(&self) -> &str {
        &self.metadata_key
    }

    /// 在当前上下文中进入作用域
    pub fn enter(&self) -> Result<(), ScopeError> {
        let context = Self::current_context("enter")?;
        self.enter_in(&context)
    }

    /// 在当前上下文中退出作用域
    pub fn exit(&self) -> Result<(), ScopeError> {
        let context = Self::current_context("exit")?;
        self.exit_in(&context)
    }

    /// 向当前上下文的作用域注入一个值
    pub fn seed<T: Send + Sync + 'static>(&self, key: &Key<T>, value: T) -> Result<(), ScopeError> {
        let context = Self::current_context("seed")?;
        self.seed_in(&context, key, value)
    }

    /// 以类型 `T` 的无限定键注入
    pub fn seed_type<T: Send + Sync + 'static>(&self, value: T) -> Result<(), ScopeError> {
        self.seed(&Key::<T>::get(), value)
    }

    /// 在当前上下文中解析对象，缺失时通过提供者创建并缓存
    pub fn resolve<T, P>(&self, key: &Key<T>, provider: &P) -> Result<Arc<T>, ScopeError>
    where
        T: Send + Sync + 'static,
        P: Provider<T> + ?Sized,
    {
        let context =
            ExecutionContext::current().ok_or_else(|| Self::out_of_scope(key.erased()))?;
        self.resolve_in(&context, key, provider)
    }

    /// 当前上下文是否处于作用域中
    pub fn is_active(&self) -> bool {
        ExecutionContext::current().is_some_and(|context| self.is_active_in(&context))
    }

    pub fn enter_in(&self, context: &ExecutionContext) -> Result<(), ScopeError> {
        let instances: Arc<ScopeInstanceMap> = Arc::new(ScopeInstanceMap::new());
        if !context.put_if_absent(self.metadata_key.as_str(), instances) {
            tracing::warn!(context = %context.id(), "Rejected nested scope entry");
            return Err(ScopeError::state(
                "enter",
                "A scoping block is already in progress",
            ));
        }

        self.count(&self.stats.scopes_entered);
        tracing::debug!(context = %context.id(), "Entered verticle scope");
        Ok(())
    }

    pub fn exit_in(&self, context: &ExecutionContext) -> Result<(), ScopeError> {
        let removed = context
            .remove(&self.metadata_key)
            .ok_or_else(|| ScopeError::state("exit", "No scoping block in progress"))?;

        self.count(&self.stats.scopes_exited);
        tracing::debug!(
            context = %context.id(),
            instances = removed
                .downcast_ref::<ScopeInstanceMap>()
                .map_or(0, ScopeInstanceMap::len),
            "Exited verticle scope"
        );
        Ok(())
    }

    pub fn seed_in<T: Send + Sync + 'static>(
        &self,
        context: &ExecutionContext,
        key: &Key<T>,
        value: T,
    ) -> Result<(), ScopeError> {
        let instances = self
            .instances(context)
            .ok_or_else(|| ScopeError::state("seed", "No scoping block in progress"))?;

        let guard = instances.table.lock();
        let mut table = guard.borrow_mut();
        if table.contains_key(key.erased()) {
            tracing::warn!(context = %context.id(), key = %key, "Rejected duplicate seed");
            return Err(ScopeError::DuplicateSeed {
                key: key.erased().clone(),
            });
        }
        table.insert(key.erased().clone(), Arc::new(value));

        self.count(&self.stats.seeds);
        tracing::debug!(context = %context.id(), key = %key, "Seeded scoped value");
        Ok(())
    }

    pub fn resolve_in<T, P>(
        &self,
        context: &ExecutionContext,
        key: &Key<T>,
        provider: &P,
    ) -> Result<Arc<T>, ScopeError>
    where
        T: Send + Sync + 'static,
        P: Provider<T> + ?Sized,
    {
        let instances = self
            .instances(context)
            .ok_or_else(|| Self::out_of_scope(key.erased()))?;
        self.count(&self.stats.resolutions);

        let guard = instances.table.lock();

        let cached = guard.borrow().get(key.erased()).cloned();
        if let Some(existing) = cached {
            self.count(&self.stats.cache_hits);
            tracing::trace!(context = %context.id(), key = %key, "Scoped cache hit");
            return Self::downcast(key, existing);
        }

        // 调用提供者期间只持有锁、不借用表，重入的解析才能读写它
        let provision = provider
            .get()
            .map_err(|source| ScopeError::ProvisionFailed {
                key: key.erased().clone(),
                source,
            })?;

        match provision {
            Provision::Placeholder(placeholder) => {
                self.count(&self.stats.placeholders);
                tracing::debug!(context = %context.id(), key = %key, "Provider returned a placeholder, not memoized");
                Ok(placeholder)
            }
            Provision::Real(value) => {
                let mut table = guard.borrow_mut();
                if let Some(existing) = table.get(key.erased()).cloned() {
                    // 重入的解析已经缓存了实例，保留先写入的那个
                    drop(table);
                    return Self::downcast(key, existing);
                }
                table.insert(key.erased().clone(), value.clone());

                self.count(&self.stats.constructions);
                tracing::debug!(context = %context.id(), key = %key, "Constructed scoped instance");
                Ok(value)
            }
        }
    }

    pub fn is_active_in(&self, context: &ExecutionContext) -> bool {
        self.instances(context).is_some()
    }

    /// 包装未加作用域的提供者，得到按作用域缓存的提供者
    pub fn scope<T, P>(self: &Arc<Self>, key: Key<T>, unscoped: P) -> ScopedProvider<T>
    where
        T: Send + Sync + 'static,
        P: Provider<T> + 'static,
    {
        ScopedProvider {
            scope: Arc::clone(self),
            key,
            unscoped: Arc::new(unscoped),
        }
    }

    /// 总是报错的提供者，用于必须显式注入的键
    pub fn seeded_key_provider<T>() -> SeededKeyProvider<T> {
        SeededKeyProvider::default()
    }

    /// 获取统计信息
    pub fn stats(&self) -> ScopeStats {
        ScopeStats {
            scopes_entered: self.stats.scopes_entered.load(Ordering::Relaxed),
            scopes_exited: self.stats.scopes_exited.load(Ordering::Relaxed),
            resolutions: self.stats.resolutions.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            constructions: self.stats.constructions.load(Ordering::Relaxed),
            placeholders: self.stats.placeholders.load(Ordering::Relaxed),
            seeds: self.stats.seeds.load(Ordering::Relaxed),
        }
    }

    fn instances(&self, context: &ExecutionContext) -> Option<Arc<ScopeInstanceMap>> {
        context.get_as::<ScopeInstanceMap>(&self.metadata_key)
    }

    fn current_context(operation: &str) -> Result<ExecutionContext, ScopeError> {
        ExecutionContext::current()
            .ok_or_else(|| ScopeError::state(operation, "No execution context is current"))
    }

    fn out_of_scope(key: &ScopeKey) -> ScopeError {
        tracing::warn!(key = %key, "Scoped object requested outside of a scoping block");
        ScopeError::OutOfScope { key: key.clone() }
    }

    fn downcast<T: Send + Sync + 'static>(
        key: &Key<T>,
        instance: Instance,
    ) -> Result<Arc<T>, ScopeError> {
        instance
            .downcast::<T>()
            .map_err(|_| ScopeError::TypeMismatch {
                key: key.erased().clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    fn count(&self, counter: &AtomicU64) {
        if self.collect_stats {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for VerticleScope {
    fn default() -> Self {
        Self::new()
    }
}

/// 按作用域缓存的提供者
pub struct ScopedProvider<T> {
    scope: Arc<VerticleScope>,
    key: Key<T>,
    unscoped: Arc<dyn Provider<T>>,
}

impl<T: Send + Sync + 'static> ScopedProvider<T> {
    /// 在当前上下文中解析
    pub fn get(&self) -> Result<Arc<T>, ScopeError> {
        self.scope.resolve(&self.key, self.unscoped.as_ref())
    }

    pub fn get_in(&self, context: &ExecutionContext) -> Result<Arc<T>, ScopeError> {
        self.scope.resolve_in(context, &self.key, self.unscoped.as_ref())
    }

    pub fn key(&self) -> &Key<T> {
        &self.key
    }
}

impl<T> Clone for ScopedProvider<T> {
    fn clone(&self) -> Self {
        Self {
            scope: Arc::clone(&self.scope),
            key: self.key.clone(),
            unscoped: Arc::clone(&self.unscoped),
        }
    }
}
