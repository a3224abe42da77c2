//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{ConfigLoader, TomlConfigLoader, WatcherKind};
use crate::error::Result;
use crate::key::ConfigKey;
use crate::logging::LoggingSystem;
use crate::service::{SyncComponents, SyncLauncher};
use crate::watcher::{GroupWatcher, Watcher};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new();
        let config = loader.load_from_file(config_path).await?;

        if verbose {
            println!("配置验证通过！");
            println!("同步配置:");
            println!("  拉取周期: {}秒", config.sync.period_seconds);
            println!("  日志级别: {}", config.sync.log_level);

            println!("配置源:");
            println!("  类型: {:?}", config.backend.kind);
            if let Some(path) = &config.backend.path {
                println!("  路径: {}", path.display());
            }
            println!("  命名空间: {}", config.backend.namespace);
            println!(
                "  文件监控: {}",
                if config.backend.watch { "是" } else { "否" }
            );

            println!("监视器:");
            for (i, watcher) in config.watchers.iter().enumerate() {
                let kind = match watcher.kind {
                    WatcherKind::Single => "单键",
                    WatcherKind::Group => "分组",
                };
                println!("  {}. {} ({})", i + 1, watcher.key(), kind);
            }
        } else {
            println!("✓ 配置文件验证通过");
            println!("✓ 找到 {} 个监视器配置", config.watchers.len());
        }

        Ok(())
    }
}

/// 单键读取命令
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Get { key } = &args.command {
            let mut config = SyncLauncher::load_config(&args.get_config_path()).await?;
            // 单次读取不需要文件监控
            config.backend.watch = false;

            let source = SyncLauncher::build_source(&config)?;
            let key = ConfigKey::new(key.as_str());
            let mut values = source.fetch(std::slice::from_ref(&key)).await?;

            match values.remove(&key).flatten() {
                Some(value) => println!("{value}"),
                None => println!("<absent>"),
            }
        }
        Ok(())
    }
}

/// 运行命令
pub struct RunCommand {
    /// 用于输出变更日志的日志系统
    logging: Arc<LoggingSystem>,
}

impl RunCommand {
    pub fn new(logging: Arc<LoggingSystem>) -> Self {
        Self { logging }
    }

    /// 跟踪单键监视器的变更
    fn observe_watcher(&self, watcher: Arc<Watcher>) -> JoinHandle<()> {
        let logging = Arc::clone(&self.logging);
        let mut changes = watcher.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let value = watcher.read();
                let change = if value.is_some() { "updated" } else { "deleted" };
                logging.change_log(watcher.key().as_str(), change, value.as_deref());
            }
        })
    }

    /// 跟踪分组监视器的变更
    fn observe_group(&self, group: Arc<GroupWatcher>) -> JoinHandle<()> {
        let logging = Arc::clone(&self.logging);
        let mut changes = group.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let items = group.group_items().to_string();
                logging.change_log(group.key().as_str(), "group", Some(&items));
            }
        })
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = SyncLauncher::load_config(&args.get_config_path()).await?;
        if config.is_dry_run() {
            warn!("内存配置源无法从外部写入，本次运行只是演练，监视器将一直为空");
        }
        let SyncComponents {
            mut driver,
            watchers,
            groups,
        } = SyncLauncher::initialize(&config)?;

        let observers: Vec<JoinHandle<()>> = watchers
            .into_iter()
            .map(|watcher| self.observe_watcher(watcher))
            .chain(groups.into_iter().map(|group| self.observe_group(group)))
            .collect();

        driver.start().await?;
        info!("配置同步服务已启动，按 Ctrl+C 停止");

        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("监听中断信号失败: {}", e);
        }
        info!("收到中断信号，正在停止同步服务...");

        driver.stop().await?;
        for observer in observers {
            observer.abort();
        }

        let status = driver.status().await;
        info!(
            "同步服务已停止，周期: {}，失败周期: {}，分发事件: {}，丢弃事件: {}",
            status.sync_cycles,
            status.failed_cycles,
            status.dispatched_events,
            status.discarded_events
        );
        Ok(())
    }
}
