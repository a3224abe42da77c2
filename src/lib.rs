//! dyncfg-sync - 动态配置同步库
//!
//! 将外部配置源中的键值同步到本地监视器，支持：
//! - 单键监视器与分组监视器
//! - 推送模式（订阅）与拉取模式（周期拉取）
//! - 目录与内存配置源
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod key;
pub mod logging;
pub mod registry;
pub mod service;
pub mod source;
pub mod watcher;

// 重新导出主要类型
pub use config::Config;
pub use driver::{DriverStatus, KeyState, SyncDriver, SyncOptions};
pub use error::SyncError;
pub use key::ConfigKey;
pub use registry::WatchRegistry;
pub use source::{ConfigurationSource, SourceEvent};
pub use watcher::{ChangeType, GroupItems, GroupWatcher, Watcher};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
