//! 宿主运行时
//!
//! 最小化的 verticle 部署器：每次部署创建一个新的执行上下文，
//! 并在该上下文中调用 verticle 的 start / stop。

use crate::errors::VerticleError;
use crate::infrastructure::context::ExecutionContext;
use crate::logging::OperationTimer;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Verticle 接口
#[async_trait]
pub trait Verticle: Send + Sync {
    /// 名称，用于日志
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 部署时在自己的上下文中调用
    async fn start(&mut self, context: &ExecutionContext) -> Result<(), VerticleError>;

    /// 卸载时在同一个上下文中调用
    async fn stop(&mut self, _context: &ExecutionContext) -> Result<(), VerticleError> {
        Ok(())
    }
}

/// 部署ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeploymentId(u64);

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deployment-{}", self.0)
    }
}

struct Deployment {
    context: ExecutionContext,
    verticle: Box<dyn Verticle>,
}

/// 部署器
pub struct Vertx {
    deployments: DashMap<DeploymentId, Deployment>,
    next_id: AtomicU64,
}

impl Vertx {
    pub fn new() -> Self {
        Self {
            deployments: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 部署 verticle
    ///
    /// start 失败时上下文随之丢弃，错误原样返回。
    pub async fn deploy<V: Verticle + 'static>(
        &self,
        verticle: V,
    ) -> Result<DeploymentId, VerticleError> {
        let context = ExecutionContext::new();
        let mut verticle: Box<dyn Verticle> = Box::new(verticle);
        let name = verticle.name().to_string();

        tracing::info!(verticle = %name, context = %context.id(), "Deploying verticle");
        let timer = OperationTimer::new("deploy_verticle").with_metadata("verticle", &name);
        if let Err(err) = context.scope(verticle.start(&context)).await {
            tracing::warn!(verticle = %name, error = %err, "Verticle failed to start");
            return Err(err);
        }

        let id = DeploymentId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.deployments.insert(id, Deployment { context, verticle });
        timer.finish();
        tracing::info!(verticle = %name, deployment = %id, "Verticle deployed");
        Ok(id)
    }

    /// 卸载 verticle，stop 在部署时的上下文中执行
    pub async fn undeploy(&self, id: DeploymentId) -> Result<(), VerticleError> {
        let (_, mut deployment) = self
            .deployments
            .remove(&id)
            .ok_or_else(|| VerticleError::DeploymentNotFound(id.to_string()))?;

        let context = deployment.context.clone();
        let result = context.scope(deployment.verticle.stop(&context)).await;
        match &result {
            Ok(()) => tracing::info!(deployment = %id, "Verticle undeployed"),
            Err(err) => tracing::warn!(deployment = %id, error = %err, "Verticle failed to stop"),
        }
        result
    }

    /// 按部署顺序卸载全部 verticle，返回遇到的第一个错误
    pub async fn close(&self) -> Result<(), VerticleError> {
        let mut ids: Vec<DeploymentId> = self.deployments.iter().map(|entry| *entry.key()).collect();
        ids.sort();

        let mut first_error = None;
        for id in ids {
            if let Err(err) = self.undeploy(id).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// 部署所属的上下文
    pub fn context_of(&self, id: DeploymentId) -> Option<ExecutionContext> {
        self.deployments.get(&id).map(|entry| entry.context.clone())
    }

    pub fn is_deployed(&self, id: DeploymentId) -> bool {
        self.deployments.contains_key(&id)
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.len()
    }
}

impl Default for Vertx {
    fn default() -> Self {
        Self::new()
    }
}
