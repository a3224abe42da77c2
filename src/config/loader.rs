//! 配置加载器实现
//!
//! 提供TOML启动配置解析、验证和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::path::Path;

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone, Default)]
pub struct TomlConfigLoader;

impl TomlConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;
        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `dyncfg-sync.toml` 时优先使用，否则使用用户配置目录
pub fn get_default_config_path() -> std::path::PathBuf {
    if Path::new("dyncfg-sync.toml").exists() {
        return std::path::PathBuf::from("dyncfg-sync.toml");
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("dyncfg-sync").join("config.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("dyncfg-sync.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{BackendKind, WatcherKind};
    use crate::error::SyncError;
    use tempfile::NamedTempFile;

    const TEST_CONFIG_TOML: &str = r#"
[sync]
period_seconds = 5
log_level = "debug"

[backend]
type = "directory"
path = "./config-store"
namespace = "skywalking"

[[watchers]]
module = "test-module"
provider = "default"
property = "testKey"

[[watchers]]
module = "test-module"
provider = "default"
property = "testKeyGroup"
kind = "group"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new();
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.sync.period_seconds, 5);
        assert_eq!(config.backend.kind, BackendKind::Directory);
        assert!(config.backend.watch);
        assert_eq!(config.watchers.len(), 2);
        assert_eq!(config.watchers[0].kind, WatcherKind::Single);
        assert_eq!(config.watchers[1].kind, WatcherKind::Group);
        assert_eq!(
            config.watchers[1].key().as_str(),
            "test-module.default.testKeyGroup"
        );
    }

    #[tokio::test]
    async fn test_minimal_memory_config() {
        let loader = TomlConfigLoader::new();
        let config = loader
            .load_from_string("[backend]\ntype = \"memory\"\n")
            .await
            .unwrap();

        assert_eq!(config.backend.namespace, "default");
        assert_eq!(config.sync.period_seconds, 60);
        assert!(config.watchers.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let loader = TomlConfigLoader::new();
        let result = loader.load_from_string("[backend\n").await;
        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[tokio::test]
    async fn test_validation_error_is_reported() {
        let loader = TomlConfigLoader::new();
        let result = loader
            .load_from_string("[backend]\ntype = \"directory\"\n")
            .await;
        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::ValidationError(_)))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), TEST_CONFIG_TOML).unwrap();

        let loader = TomlConfigLoader::new();
        let config = loader.load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.backend.namespace, "skywalking");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let loader = TomlConfigLoader::new();
        let result = loader.load_from_file("/nonexistent/dyncfg-sync.toml").await;
        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().contains("dyncfg-sync"));
    }
}
