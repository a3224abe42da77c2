//! 日志系统模块
//!
//! 安装 tracing subscriber，并提供配置变更日志

use log::LevelFilter;
use serde_json::json;
use std::sync::OnceLock;
use tracing_subscriber::filter::{Directive, LevelFilter as TracingLevel};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局 subscriber 只安装一次，保存首次安装的结果
static LOGGING_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别（`RUST_LOG` 中的模块级设置仍然生效）
    pub level: LevelFilter,
    /// 是否使用JSON格式
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            json_format: false,
        }
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    /// 变更日志是否输出为JSON
    json_format: bool,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 重复调用不会重复安装 subscriber，后续调用沿用首次安装的结果
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `Result<LoggingSystem, anyhow::Error>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        LOGGING_INIT
            .get_or_init(|| Self::install(&config).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| anyhow::anyhow!("日志系统初始化失败: {}", e))?;

        Ok(Self {
            json_format: config.json_format,
        })
    }

    /// 安装 LogTracer 桥接和 tracing subscriber
    fn install(config: &LogConfig) -> anyhow::Result<()> {
        // log crate 的记录转发到 tracing
        tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;

        let env_filter =
            EnvFilter::from_default_env().add_directive(level_directive(config.level));

        let fmt_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            fmt::layer()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_target(true)
                .with_thread_names(true)
                .boxed()
        };

        registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("tracing subscriber初始化失败: {}", e))?;

        tracing::debug!("日志配置: {:?}", config);
        Ok(())
    }

    /// 记录配置变更日志
    ///
    /// # 参数
    /// * `key` - 配置键
    /// * `change` - 变更类型描述
    /// * `value` - 变更后的值（删除时为 `None`）
    pub fn change_log(&self, key: &str, change: &str, value: Option<&str>) {
        if self.json_format {
            let change_entry = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "type": "config_change",
                "key": key,
                "change": change,
                "value": value,
            });
            tracing::info!("{change_entry}");
        } else {
            tracing::info!(
                "CHANGE: {} - {} = {}",
                key,
                change,
                value.unwrap_or("<absent>")
            );
        }
    }
}

/// 将 log::LevelFilter 转换为 tracing 的过滤指令
fn level_directive(level: LevelFilter) -> Directive {
    let level = match level {
        LevelFilter::Off => TracingLevel::OFF,
        LevelFilter::Error => TracingLevel::ERROR,
        LevelFilter::Warn => TracingLevel::WARN,
        LevelFilter::Info => TracingLevel::INFO,
        LevelFilter::Debug => TracingLevel::DEBUG,
        LevelFilter::Trace => TracingLevel::TRACE,
    };
    Directive::from(level)
}

/// 解析配置文件中的日志级别字符串，未知级别按 info 处理
pub fn parse_level(level: &str) -> LevelFilter {
    match level {
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}
