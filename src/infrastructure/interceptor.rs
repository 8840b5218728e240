//! 作用域 verticle 拦截器
//!
//! 包装一个 verticle：start 之前进入作用域，stop 之前退出作用域。
//! 被包装调用的返回值和错误原样透传；进入/退出作用域失败时被包装的调用不会执行。

use crate::errors::VerticleError;
use crate::infrastructure::context::ExecutionContext;
use crate::infrastructure::host::Verticle;
use crate::infrastructure::scope::VerticleScope;
use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

pub struct ScopedVerticleInterceptor<V> {
    scope: Arc<VerticleScope>,
    inner: V,
}

impl<V> ScopedVerticleInterceptor<V> {
    pub fn new(scope: Arc<VerticleScope>, inner: V) -> Self {
        Self { scope, inner }
    }

    pub fn scope(&self) -> &Arc<VerticleScope> {
        &self.scope
    }

    pub fn into_inner(self) -> V {
        self.inner
    }
}

// 其它方法直接落到被包装的 verticle 上
impl<V> Deref for ScopedVerticleInterceptor<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.inner
    }
}

impl<V> DerefMut for ScopedVerticleInterceptor<V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.inner
    }
}

#[async_trait]
impl<V: Verticle> Verticle for ScopedVerticleInterceptor<V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn start(&mut self, context: &ExecutionContext) -> Result<(), VerticleError> {
        self.scope.enter_in(context)?;
        self.inner.start(context).await
    }

    async fn stop(&mut self, context: &ExecutionContext) -> Result<(), VerticleError> {
        self.scope.exit_in(context)?;
        self.inner.stop(context).await
    }
}
