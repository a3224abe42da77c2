//! 配置源模块
//!
//! 定义后端适配器接口。具体后端只需实现 [`ConfigurationSource`]，
//! 拉取型后端实现 `fetch`，推送型后端额外提供事件流。

pub mod directory;
pub mod memory;

use crate::error::SourceResult;
use crate::key::ConfigKey;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;

// 重新导出主要类型
pub use directory::DirectorySource;
pub use memory::MemorySource;

/// 配置源推送的单键变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    /// 变更的配置键
    pub key: ConfigKey,
    /// 新值，`None` 表示键已被删除
    pub value: Option<String>,
}

impl SourceEvent {
    /// 创建值变更事件
    pub fn changed(key: impl Into<ConfigKey>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// 创建删除事件
    pub fn removed(key: impl Into<ConfigKey>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// 是否为删除事件
    pub fn is_removal(&self) -> bool {
        self.value.is_none()
    }
}

/// 配置源trait，定义后端适配接口
///
/// 同一个键的事件必须按后端应用的顺序送达，不同键之间没有顺序要求。
/// 事件至少送达一次，重复事件由监视器当作空操作吸收。
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// 配置源名称（用于日志）
    fn name(&self) -> &str;

    /// 拉取一组键的当前值
    ///
    /// # 参数
    /// * `keys` - 要拉取的配置键
    ///
    /// # 返回
    /// * `SourceResult<HashMap<ConfigKey, Option<String>>>` - 键到值的映射。
    ///   值为 `None` 表示键明确不存在；键不在映射中表示本周期没有该键的信息
    async fn fetch(&self, keys: &[ConfigKey]) -> SourceResult<HashMap<ConfigKey, Option<String>>>;

    /// 订阅单个键的变更
    ///
    /// 推送型后端在订阅后先推送该键的当前状态，再推送后续变更
    async fn subscribe(&self, _key: &ConfigKey) -> SourceResult<()> {
        Ok(())
    }

    /// 取消订阅单个键
    async fn unsubscribe(&self, _key: &ConfigKey) -> SourceResult<()> {
        Ok(())
    }

    /// 取出推送事件流
    ///
    /// 推送型后端第一次调用时返回 `Some`，之后以及拉取型后端均返回 `None`
    fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<SourceEvent>> {
        None
    }
}
