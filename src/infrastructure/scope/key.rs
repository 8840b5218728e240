//! 作用域键
//!
//! 以类型标识加可选限定名区分可缓存的对象，对应注入容器里的绑定键。

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// 类型擦除的作用域键
#[derive(Clone)]
pub struct ScopeKey {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<String>,
}

impl ScopeKey {
    /// 类型 `T` 的无限定键
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    /// 类型 `T` 带限定名的键
    pub fn named<T: 'static>(qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            ..Self::of::<T>()
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

// 类型名只用于诊断，不参与比较
impl PartialEq for ScopeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for ScopeKey {}

impl Hash for ScopeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeKey")
            .field("type", &self.type_name)
            .field("qualifier", &self.qualifier)
            .finish()
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "Key[type={}, qualifier={}]", self.type_name, q),
            None => write!(f, "Key[type={}]", self.type_name),
        }
    }
}

/// 带类型的作用域键，保证解析和注入时类型一致
pub struct Key<T> {
    inner: ScopeKey,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Key<T> {
    pub fn get() -> Self {
        Self {
            inner: ScopeKey::of::<T>(),
            _phantom: PhantomData,
        }
    }

    pub fn named(qualifier: impl Into<String>) -> Self {
        Self {
            inner: ScopeKey::named::<T>(qualifier),
            _phantom: PhantomData,
        }
    }
}

impl<T> Key<T> {
    pub fn erased(&self) -> &ScopeKey {
        &self.inner
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl<T> From<Key<T>> for ScopeKey {
    fn from(key: Key<T>) -> Self {
        key.inner
    }
}
