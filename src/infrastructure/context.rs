//! 执行上下文
//!
//! 一个上下文代表一个逻辑工作单元（一个已部署的 verticle）。上下文可以附加任意元数据，
//! 并且通过本模块的派发方法切换到其它工作线程后依然可以找到同一个上下文。
//!
//! 当前上下文保存在线程本地变量中，由 [`ContextGuard`] 安装和恢复：
//! - 同步代码和阻塞任务在整个调用期间持有守卫
//! - 异步任务在每次 poll 期间持有守卫，因此守卫从不跨越 `.await`
//!
//! 嵌套时总是最内层的上下文生效。

use dashmap::DashMap;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::future::{poll_fn, Future};
use std::marker::PhantomData;
use std::pin::pin;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 上下文元数据的值类型
pub type ContextValue = Arc<dyn Any + Send + Sync>;

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

struct ContextInner {
    id: uuid::Uuid,
    metadata: DashMap<String, ContextValue>,
}

/// 执行上下文句柄，克隆后指向同一个上下文
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// 创建新的上下文，只应由宿主运行时调用
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: uuid::Uuid::new_v4(),
                metadata: DashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.inner.id
    }

    /// 获取调用方当前所在的上下文
    pub fn current() -> Option<ExecutionContext> {
        THREAD_CONTEXT.with(|slot| slot.borrow().clone())
    }

    /// 在当前线程上安装此上下文，guard 释放时恢复之前的上下文
    #[must_use]
    pub fn enter(&self) -> ContextGuard {
        let prev = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(self.clone()));
        ContextGuard {
            prev,
            _not_send: PhantomData,
        }
    }

    /// 在此上下文中同步执行闭包
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// 在此上下文中执行 future
    pub async fn scope<F: Future>(&self, future: F) -> F::Output {
        let mut future = pin!(future);
        poll_fn(|cx| {
            let _guard = self.enter();
            future.as_mut().poll(cx)
        })
        .await
    }

    /// 在工作线程池上派发异步任务，任务仍属于此上下文
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let context = self.clone();
        tokio::spawn(async move { context.scope(future).await })
    }

    /// 在阻塞线程池上执行闭包，闭包仍属于此上下文
    pub fn execute_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let context = self.clone();
        tokio::task::spawn_blocking(move || context.run(f))
    }

    /// 附加元数据，返回被替换的旧值
    pub fn put(&self, key: impl Into<String>, value: ContextValue) -> Option<ContextValue> {
        self.inner.metadata.insert(key.into(), value)
    }

    /// 仅当键不存在时附加元数据
    ///
    /// 检查和插入在同一个分片锁内完成。返回是否插入成功。
    pub fn put_if_absent(&self, key: impl Into<String>, value: ContextValue) -> bool {
        match self.inner.metadata.entry(key.into()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<ContextValue> {
        self.inner.metadata.get(key).map(|entry| entry.value().clone())
    }

    /// 按类型读取元数据，类型不符时返回 None
    pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }

    pub fn remove(&self, key: &str) -> Option<ContextValue> {
        self.inner.metadata.remove(key).map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.metadata.contains_key(key)
    }

    /// 两个句柄是否指向同一个上下文
    pub fn same_as(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for ExecutionContext {}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("metadata_keys", &self.inner.metadata.len())
            .finish()
    }
}

/// 线程本地上下文的恢复守卫
///
/// 不能跨 `.await` 持有，否则同一工作线程上的其它任务会看到错误的上下文；
/// 异步代码应使用 [`ExecutionContext::scope`]。
pub struct ContextGuard {
    prev: Option<ExecutionContext>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        THREAD_CONTEXT.with(|slot| {
            *slot.borrow_mut() = prev;
        });
    }
}
