//! 启动配置数据结构定义
//!
//! 描述配置源、同步周期以及需要注册的监视器

use crate::driver::SyncOptions;
use crate::key::ConfigKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 同步配置
    #[serde(default)]
    pub sync: SyncConfig,
    /// 配置源配置
    pub backend: BackendConfig,
    /// 需要注册的监视器
    #[serde(default)]
    pub watchers: Vec<WatcherConfig>,
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// 拉取周期（秒）
    #[serde(default = "default_period")]
    pub period_seconds: u64,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            period_seconds: default_period(),
            log_level: default_log_level(),
        }
    }
}

/// 配置源类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 目录配置源
    Directory,
    /// 内存配置源
    ///
    /// 进程内存储，外部无法写入，`run` 命令使用它时只是一次演练（dry-run）
    Memory,
}

/// 配置源配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// 配置源类型
    #[serde(rename = "type")]
    pub kind: BackendKind,
    /// 存储根目录（目录配置源必填）
    pub path: Option<PathBuf>,
    /// 命名空间
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// 是否监控文件变更（推送模式）
    #[serde(default = "default_watch")]
    pub watch: bool,
}

/// 监视器类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatcherKind {
    /// 单键监视器
    #[default]
    Single,
    /// 分组监视器
    Group,
}

/// 监视器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatcherConfig {
    /// 模块名称
    pub module: String,
    /// 提供者名称
    pub provider: String,
    /// 属性名称
    pub property: String,
    /// 监视器类型
    #[serde(default)]
    pub kind: WatcherKind,
}

impl WatcherConfig {
    /// 对应的配置键
    pub fn key(&self) -> ConfigKey {
        ConfigKey::of(&self.module, &self.provider, &self.property)
    }
}

impl Config {
    /// 是否只是演练：内存配置源不会收到任何外部变更
    pub fn is_dry_run(&self) -> bool {
        self.backend.kind == BackendKind::Memory
    }

    /// 转换为同步选项
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            period: Duration::from_secs(self.sync.period_seconds),
        }
    }
}

// 默认值函数
fn default_period() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_namespace() -> String {
    "default".to_string()
}
fn default_watch() -> bool {
    true
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.sync.period_seconds == 0 {
        return Err("同步周期不能为0".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.sync.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.sync.log_level, valid_log_levels
        ));
    }

    if config.backend.namespace.trim().is_empty() {
        return Err("命名空间不能为空".to_string());
    }

    if config.backend.kind == BackendKind::Directory && config.backend.path.is_none() {
        return Err("目录配置源必须指定 path".to_string());
    }

    let mut keys = HashSet::new();
    for watcher in &config.watchers {
        if watcher.module.trim().is_empty()
            || watcher.provider.trim().is_empty()
            || watcher.property.trim().is_empty()
        {
            return Err("监视器的 module、provider、property 不能为空".to_string());
        }

        let key = watcher.key();
        if !keys.insert(key.clone()) {
            return Err(format!("配置键重复: {key}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            sync: SyncConfig::default(),
            backend: BackendConfig {
                kind: BackendKind::Directory,
                path: Some(PathBuf::from("./config-store")),
                namespace: "skywalking".to_string(),
                watch: true,
            },
            watchers: vec![
                WatcherConfig {
                    module: "test-module".to_string(),
                    provider: "default".to_string(),
                    property: "testKey".to_string(),
                    kind: WatcherKind::Single,
                },
                WatcherConfig {
                    module: "test-module".to_string(),
                    provider: "default".to_string(),
                    property: "testKeyGroup".to_string(),
                    kind: WatcherKind::Group,
                },
            ],
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = create_test_config();

        let serialized = toml::to_string(&config).expect("序列化失败");
        assert!(serialized.contains("type = \"directory\""));

        let deserialized: Config = toml::from_str(&serialized).expect("反序列化失败");
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_validation() {
        assert!(validate_config(&create_test_config()).is_ok());
    }

    #[test]
    fn test_default_values() {
        let sync = SyncConfig::default();
        assert_eq!(sync.period_seconds, 60);
        assert_eq!(sync.log_level, "info");
        assert_eq!(
            create_test_config().sync_options().period,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_memory_backend_is_dry_run() {
        let mut config = create_test_config();
        assert!(!config.is_dry_run());

        config.backend.kind = BackendKind::Memory;
        config.backend.path = None;
        assert!(config.is_dry_run());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation_zero_period() {
        let mut config = create_test_config();
        config.sync.period_seconds = 0;

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("同步周期不能为0"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = create_test_config();
        config.sync.log_level = "trace".to_string();

        assert!(validate_config(&config).unwrap_err().contains("无效的日志级别"));
    }

    #[test]
    fn test_config_validation_directory_without_path() {
        let mut config = create_test_config();
        config.backend.path = None;

        assert!(validate_config(&config).unwrap_err().contains("path"));
    }

    #[test]
    fn test_config_validation_duplicate_keys() {
        let mut config = create_test_config();
        config.watchers[1].property = "testKey".to_string();
        config.watchers[1].kind = WatcherKind::Single;

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("test-module.default.testKey"));
    }

    #[test]
    fn test_config_validation_blank_watcher_field() {
        let mut config = create_test_config();
        config.watchers[0].provider = " ".to_string();

        assert!(validate_config(&config).is_err());
    }
}
