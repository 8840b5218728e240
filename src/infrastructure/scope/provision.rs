//! 提供者与提供结果
//!
//! 提供者由注入容器一侧给出，作用域只负责调用和缓存。

use crate::errors::BoxError;
use std::marker::PhantomData;
use std::sync::Arc;

/// 提供者的返回值
///
/// `Placeholder` 是用来打破构造环的临时转发对象，作用域不会缓存它，
/// 直到某次解析拿到 `Real` 才会记住结果。
pub enum Provision<T> {
    Real(Arc<T>),
    Placeholder(Arc<T>),
}

impl<T> Provision<T> {
    pub fn real(value: T) -> Self {
        Provision::Real(Arc::new(value))
    }

    pub fn placeholder(value: T) -> Self {
        Provision::Placeholder(Arc::new(value))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Provision::Placeholder(_))
    }

    pub fn into_inner(self) -> Arc<T> {
        match self {
            Provision::Real(value) | Provision::Placeholder(value) => value,
        }
    }
}

impl<T> Clone for Provision<T> {
    fn clone(&self) -> Self {
        match self {
            Provision::Real(value) => Provision::Real(value.clone()),
            Provision::Placeholder(value) => Provision::Placeholder(value.clone()),
        }
    }
}

/// 未加作用域的提供者
pub trait Provider<T>: Send + Sync {
    /// 创建一个新的实例
    fn get(&self) -> Result<Provision<T>, BoxError>;
}

/// 为闭包实现Provider
impl<T, F> Provider<T> for F
where
    F: Fn() -> Result<Provision<T>, BoxError> + Send + Sync,
{
    fn get(&self) -> Result<Provision<T>, BoxError> {
        self()
    }
}

/// 简单的提供者 - 包装不会失败、不会产生占位对象的工厂
pub struct FnProvider<T, F> {
    factory: F,
    _phantom: PhantomData<fn() -> T>,
}

impl<T, F> FnProvider<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> Provider<T> for FnProvider<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    fn get(&self) -> Result<Provision<T>, BoxError> {
        Ok(Provision::real((self.factory)()))
    }
}

/// 便捷构造 [`FnProvider`]
pub fn provider_fn<T, F>(factory: F) -> FnProvider<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    FnProvider::new(factory)
}

/// 只能通过注入获得的键使用的提供者，被调用即报错
pub struct SeededKeyProvider<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Default for SeededKeyProvider<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Provider<T> for SeededKeyProvider<T> {
    fn get(&self) -> Result<Provision<T>, BoxError> {
        Err("If you got here then it means that your code asked for a scoped object \
             which should have been explicitly seeded in this scope by calling \
             VerticleScope::seed(), but was not."
            .into())
    }
}
