//! 错误处理模块
//!
//! 定义配置同步层的统一错误类型

use thiserror::Error;

/// 配置同步层的主要错误类型
#[derive(Error, Debug)]
pub enum SyncError {
    /// 启动配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 配置源（后端）相关错误
    #[error("配置源错误: {0}")]
    Source(#[from] SourceError),

    /// 注册表相关错误
    #[error("注册错误: {0}")]
    Registry(#[from] RegistryError),

    /// 分组定义解析错误
    #[error("分组定义错误: {0}")]
    Definition(#[from] DefinitionError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 启动配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },
}

/// 配置源错误类型
#[derive(Error, Debug)]
pub enum SourceError {
    /// 后端暂不可用（下个周期重试）
    #[error("配置源不可用: {0}")]
    Unavailable(String),

    /// 配置内容不是合法文本
    #[error("配置内容无法解码: {key}")]
    InvalidPayload { key: String },

    /// 配置键无法映射到后端存储（例如含路径分隔符）
    #[error("配置键不受支持: {key}")]
    InvalidKey { key: String },

    /// 底层IO错误
    #[error("配置源IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// 文件监控错误
    #[error("文件监控失败: {0}")]
    Watch(String),
}

/// 注册表错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// 同一个键重复注册
    #[error("配置键重复注册: {key}")]
    DuplicateKey { key: String },
}

/// 分组定义解析错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DefinitionError {
    /// 定义内容包含非文本字符
    #[error("分组定义第 {line} 行包含非文本字符")]
    NonText { line: usize },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SyncError>;

/// 配置源结果类型别名
pub type SourceResult<T> = std::result::Result<T, SourceError>;
