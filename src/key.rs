//! 配置键定义
//!
//! 配置键是不透明的字符串，约定格式为 `<module>.<provider>.<property>`

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// 配置键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// 直接使用任意名称创建配置键（分组条目通常就是这种形式）
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 按约定格式 `<module>.<provider>.<property>` 创建配置键
    ///
    /// # 参数
    /// * `module` - 模块名称
    /// * `provider` - 提供者名称
    /// * `property` - 属性名称
    pub fn of(module: &str, provider: &str, property: &str) -> Self {
        Self(format!("{module}.{provider}.{property}"))
    }

    /// 获取字符串形式
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ConfigKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ConfigKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
