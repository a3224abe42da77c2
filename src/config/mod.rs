//! 启动配置模块
//!
//! 提供启动配置文件解析和验证功能

pub mod loader;
pub mod types;

// 重新导出主要类型
pub use loader::{get_default_config_path, ConfigLoader, TomlConfigLoader};
pub use types::{
    validate_config, BackendConfig, BackendKind, Config, SyncConfig, WatcherConfig, WatcherKind,
};
