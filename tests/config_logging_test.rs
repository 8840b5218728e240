//! 配置加载与日志初始化测试
//!
//! 独立的测试二进制：全局订阅器只能安装一次

use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;
use verticle_scopes::infrastructure::scope::provider_fn;
use verticle_scopes::logging::{init_logging, LogFormat, LoggingConfig};
use verticle_scopes::{ConfigLoader, ExecutionContext, Key, VerticleScopesModule};

#[test]
fn test_loaded_config_drives_logging_and_scope() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "metadata_key = \"_service-instances\"").unwrap();
    writeln!(file, "[logging]").unwrap();
    writeln!(file, "level = \"debug\"").unwrap();
    writeln!(file, "format = \"compact\"").unwrap();

    let env = HashMap::from([("LOG_LEVEL".to_string(), "trace".to_string())]);
    let config = ConfigLoader::with_path(file.path())
        .load_with_env(&env)
        .unwrap();

    let logging = LoggingConfig::from_settings(&config.logging).unwrap();
    assert_eq!(logging.level, tracing::Level::TRACE);
    assert_eq!(logging.format, LogFormat::Compact);
    init_logging(logging.with_thread_ids()).unwrap();

    // 作用域事件经过已安装的订阅器
    let module = VerticleScopesModule::from_config(&config);
    let labels = module.scoped(Key::<String>::named("label"), provider_fn(|| "api".to_string()));
    let context = ExecutionContext::new();
    module.scope().enter_in(&context).unwrap();

    assert!(context.contains("_service-instances"));
    assert_eq!(labels.get_in(&context).unwrap().as_str(), "api");
    module.scope().exit_in(&context).unwrap();
}
