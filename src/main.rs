//! dyncfg-sync 主程序入口
//!
//! 动态配置同步工具

use anyhow::{Context, Result};
use clap::Parser;
use dyncfg_sync::cli::args::{Args, Commands};
use dyncfg_sync::cli::commands::{
    Command, GetCommand, RunCommand, ValidateCommand, VersionCommand,
};
use dyncfg_sync::config::{ConfigLoader, TomlConfigLoader};
use dyncfg_sync::logging::{LogConfig, LoggingSystem};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统，命令行未指定级别时读取配置文件
    let config_level = match args.log_level {
        Some(_) => None,
        None => TomlConfigLoader::new()
            .load_from_file(args.get_config_path())
            .await
            .ok()
            .map(|config| config.sync.log_level),
    };
    let log_config = LogConfig {
        level: args.resolve_log_level(config_level.as_deref()),
        json_format: args.json_logs,
    };

    let logging_system =
        Arc::new(LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?);

    info!("dyncfg-sync v{} 启动", dyncfg_sync::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args, logging_system).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args, logging_system: Arc<LoggingSystem>) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Run => Box::new(RunCommand::new(logging_system)),
        Commands::Get { .. } => Box::new(GetCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
}
