//! 同步服务组装模块
//!
//! 根据启动配置创建配置源和监视器注册表，并组装同步驱动

use crate::config::{BackendKind, Config, ConfigLoader, TomlConfigLoader, WatcherKind};
use crate::driver::SyncDriver;
use crate::error::{ConfigError, Result};
use crate::registry::WatchRegistry;
use crate::source::{ConfigurationSource, DirectorySource, MemorySource};
use crate::watcher::{GroupWatcher, Watcher};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 同步服务组件
pub struct SyncComponents {
    /// 同步驱动（持有注册表）
    pub driver: SyncDriver,
    /// 单键监视器，供使用方读取
    pub watchers: Vec<Arc<Watcher>>,
    /// 分组监视器，供使用方读取
    pub groups: Vec<Arc<GroupWatcher>>,
}

/// 同步服务启动器
pub struct SyncLauncher;

impl SyncLauncher {
    /// 加载和验证配置
    pub async fn load_config(config_path: &Path) -> Result<Config> {
        info!("加载配置文件: {}", config_path.display());
        let config = TomlConfigLoader::new().load_from_file(config_path).await?;
        info!("配置加载成功，共 {} 个监视器", config.watchers.len());
        Ok(config)
    }

    /// 根据配置创建配置源
    ///
    /// 目录配置源开启监控时需要在 tokio 运行时内调用
    pub fn build_source(config: &Config) -> Result<Arc<dyn ConfigurationSource>> {
        let backend = &config.backend;
        let source: Arc<dyn ConfigurationSource> = match backend.kind {
            BackendKind::Memory => Arc::new(MemorySource::new(&backend.namespace)),
            BackendKind::Directory => {
                let root = backend.path.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError("目录配置源必须指定 path".to_string())
                })?;
                if backend.watch {
                    Arc::new(DirectorySource::watching(root, &backend.namespace)?)
                } else {
                    Arc::new(DirectorySource::new(root, &backend.namespace)?)
                }
            }
        };
        info!("配置源已创建: {}", source.name());
        Ok(source)
    }

    /// 根据配置创建监视器并注册
    pub fn build_registry(
        config: &Config,
    ) -> Result<(WatchRegistry, Vec<Arc<Watcher>>, Vec<Arc<GroupWatcher>>)> {
        let mut registry = WatchRegistry::new();
        let mut watchers = Vec::new();
        let mut groups = Vec::new();

        for watcher_config in &config.watchers {
            let key = watcher_config.key();
            match watcher_config.kind {
                WatcherKind::Single => {
                    let watcher = Arc::new(Watcher::new(key));
                    registry.register_watcher(Arc::clone(&watcher))?;
                    watchers.push(watcher);
                }
                WatcherKind::Group => {
                    let group = Arc::new(GroupWatcher::new(key));
                    registry.register_group(Arc::clone(&group))?;
                    groups.push(group);
                }
            }
        }

        Ok((registry, watchers, groups))
    }

    /// 组装同步服务组件（尚未启动）
    pub fn initialize(config: &Config) -> Result<SyncComponents> {
        let source = Self::build_source(config)?;
        let (registry, watchers, groups) = Self::build_registry(config)?;
        let driver = SyncDriver::new(registry, source, config.sync_options());

        Ok(SyncComponents {
            driver,
            watchers,
            groups,
        })
    }
}
