//! Verticle 作用域集成测试
//!
//! 通过部署器、装配模块和拦截器验证作用域的端到端行为

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use verticle_scopes::errors::{ScopeError, VerticleError};
use verticle_scopes::{ExecutionContext, Key, ScopedProvider, Verticle, VerticleScopesModule, Vertx};

/// 测试用的作用域服务
#[derive(Debug)]
struct ScopedService {
    serial: usize,
}

fn counting_provider(
    module: &VerticleScopesModule,
) -> (ScopedProvider<ScopedService>, Arc<AtomicUsize>) {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let provider = module.scoped_type(move || ScopedService {
        serial: counter.fetch_add(1, Ordering::SeqCst),
    });
    (provider, constructed)
}

type Seen = Arc<Mutex<Vec<Arc<ScopedService>>>>;

/// 在 start 中解析两次并记录结果
struct RecordingVerticle {
    service: ScopedProvider<ScopedService>,
    seen: Seen,
}

impl std::fmt::Debug for RecordingVerticle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingVerticle").finish_non_exhaustive()
    }
}

#[async_trait]
impl Verticle for RecordingVerticle {
    async fn start(&mut self, _context: &ExecutionContext) -> Result<(), VerticleError> {
        let first = self.service.get()?;
        let second = self.service.get()?;
        assert!(Arc::ptr_eq(&first, &second));
        self.seen.lock().push(first);
        Ok(())
    }
}

/// 在工作线程上解析同一个键
struct WorkerVerticle {
    service: ScopedProvider<ScopedService>,
    seen: Seen,
}

#[async_trait]
impl Verticle for WorkerVerticle {
    async fn start(&mut self, context: &ExecutionContext) -> Result<(), VerticleError> {
        let on_loop = self.service.get()?;

        let provider = self.service.clone();
        let from_blocking = context
            .execute_blocking(move || provider.get())
            .await
            .map_err(|err| VerticleError::Other(Box::new(err)))??;

        let provider = self.service.clone();
        let from_task = context
            .spawn(async move { provider.get() })
            .await
            .map_err(|err| VerticleError::Other(Box::new(err)))??;

        self.seen.lock().extend([on_loop, from_blocking, from_task]);
        Ok(())
    }
}

#[tokio::test]
async fn test_instances_are_created_per_verticle() {
    let module = VerticleScopesModule::new();
    let (service, constructed) = counting_provider(&module);
    let seen: Seen = Arc::default();
    let vertx = Vertx::new();

    for _ in 0..2 {
        vertx
            .deploy(module.intercept(RecordingVerticle {
                service: service.clone(),
                seen: Arc::clone(&seen),
            }))
            .await
            .unwrap();
    }

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert!(!Arc::ptr_eq(&seen[0], &seen[1]));
    assert_ne!(seen[0].serial, seen[1].serial);
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_instances_can_only_be_created_in_verticle() {
    let module = VerticleScopesModule::new();
    let (service, constructed) = counting_provider(&module);

    // 没有任何上下文
    let err = service.get().unwrap_err();
    assert!(err.is_out_of_scope());

    // 有上下文但没有进入作用域
    let context = ExecutionContext::new();
    let err = context.run(|| service.get()).unwrap_err();
    assert!(err.is_out_of_scope());
    assert!(err.to_string().contains("outside of a scoping block"));

    assert_eq!(constructed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resolving_during_construction_is_out_of_scope() {
    let module = VerticleScopesModule::new();
    let (service, _) = counting_provider(&module);
    let vertx = Vertx::new();

    // verticle 在部署之前构造，此时还没有作用域
    let eager = |service: ScopedProvider<ScopedService>| -> Result<RecordingVerticle, ScopeError> {
        service.get()?;
        Ok(RecordingVerticle {
            service,
            seen: Arc::default(),
        })
    };
    let err = eager(service.clone()).unwrap_err();
    assert!(matches!(err, ScopeError::OutOfScope { .. }));

    // 延迟到 start 中解析则可以部署
    let lazy = RecordingVerticle {
        service,
        seen: Arc::default(),
    };
    let seen = Arc::clone(&lazy.seen);
    vertx.deploy(module.intercept(lazy)).await.unwrap();
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_threads_share_instances() {
    let module = VerticleScopesModule::new();
    let (service, constructed) = counting_provider(&module);
    let seen: Seen = Arc::default();
    let vertx = Vertx::new();

    vertx
        .deploy(module.intercept(WorkerVerticle {
            service,
            seen: Arc::clone(&seen),
        }))
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|instance| Arc::ptr_eq(instance, &seen[0])));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_constructs_once() {
    let module = VerticleScopesModule::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let service = module.scoped_type(move || {
        // 放大竞争窗口
        std::thread::sleep(Duration::from_millis(10));
        ScopedService {
            serial: counter.fetch_add(1, Ordering::SeqCst),
        }
    });

    let context = ExecutionContext::new();
    module.scope().enter_in(&context).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            context.spawn(async move { service.get() })
        })
        .collect();
    let blocking: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            context.execute_blocking(move || service.get())
        })
        .collect();

    let mut instances = Vec::new();
    for result in join_all(handles).await.into_iter().chain(join_all(blocking).await) {
        instances.push(result.unwrap().unwrap());
    }

    assert_eq!(instances.len(), 24);
    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, &instances[0])));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undeploy_closes_scope() {
    let module = VerticleScopesModule::new();
    let (service, _) = counting_provider(&module);
    let vertx = Vertx::new();

    let id = vertx
        .deploy(module.intercept(RecordingVerticle {
            service: service.clone(),
            seen: Arc::default(),
        }))
        .await
        .unwrap();

    let context = vertx.context_of(id).unwrap();
    assert!(module.scope().is_active_in(&context));
    assert!(context.run(|| service.get()).is_ok());

    vertx.undeploy(id).await.unwrap();
    assert!(!module.scope().is_active_in(&context));
    let err = context.run(|| service.get()).unwrap_err();
    assert!(err.is_out_of_scope());
}

/// 在 start 中注入部署名，再通过作用域提供者读回
struct SeedingVerticle {
    module: VerticleScopesModule,
    name: String,
    observed: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Verticle for SeedingVerticle {
    async fn start(&mut self, _context: &ExecutionContext) -> Result<(), VerticleError> {
        let key = Key::<String>::named("deployment-name");
        let scope = self.module.scope();
        scope.seed(&key, self.name.clone())?;

        let err = scope.seed(&key, "again".to_string()).unwrap_err();
        assert!(matches!(err, ScopeError::DuplicateSeed { .. }));

        let name = self.module.seeded(key).get()?;
        *self.observed.lock() = Some(name.as_ref().clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_seeded_values_are_per_verticle() {
    let module = VerticleScopesModule::new();
    let vertx = Vertx::new();
    let mut observed = Vec::new();

    for name in ["alpha", "beta"] {
        let slot = Arc::new(Mutex::new(None));
        vertx
            .deploy(module.intercept(SeedingVerticle {
                module: module.clone(),
                name: name.to_string(),
                observed: Arc::clone(&slot),
            }))
            .await
            .unwrap();
        observed.push(slot.lock().clone());
    }

    assert_eq!(
        observed,
        vec![Some("alpha".to_string()), Some("beta".to_string())]
    );
}

#[test]
fn test_scope_stats_after_close() {
    let module = VerticleScopesModule::new();
    let (service, _) = counting_provider(&module);
    let vertx = Vertx::new();

    tokio_test::block_on(async {
        for _ in 0..3 {
            vertx
                .deploy(module.intercept(RecordingVerticle {
                    service: service.clone(),
                    seen: Arc::default(),
                }))
                .await
                .unwrap();
        }
        vertx.close().await.unwrap();
    });

    let stats = module.scope().stats();
    assert_eq!(stats.scopes_entered, 3);
    assert_eq!(stats.scopes_exited, 3);
    assert_eq!(stats.active_scopes(), 0);
    assert_eq!(stats.constructions, 3);
    assert_eq!(stats.cache_hits, 3);
    assert_eq!(vertx.deployment_count(), 0);
}
