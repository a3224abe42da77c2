//! 单键配置监视器
//!
//! 保存一个配置键的最新值，读取无锁，写入只由同步驱动执行

use crate::key::ConfigKey;
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// 配置变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// 首次出现或删除后重新出现
    Added,
    /// 值被修改
    Modified,
    /// 值被删除
    Deleted,
}

/// 单键配置监视器
#[derive(Debug)]
pub struct Watcher {
    /// 监视的配置键
    key: ConfigKey,
    /// 当前值，`None` 表示缺失
    slot: ArcSwapOption<String>,
    /// 变更版本号，每次可观察的变更加一
    version: watch::Sender<u64>,
}

impl Watcher {
    /// 创建新的监视器，初始值为缺失
    pub fn new(key: impl Into<ConfigKey>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            key: key.into(),
            slot: ArcSwapOption::empty(),
            version,
        }
    }

    /// 获取监视的配置键
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// 读取当前值
    ///
    /// 不阻塞写入方，可被任意数量的线程同时调用
    pub fn read(&self) -> Option<String> {
        self.slot.load().as_deref().cloned()
    }

    /// 应用一次变更通知
    ///
    /// # 参数
    /// * `value` - 新值，`None` 表示键已被删除
    ///
    /// # 返回
    /// * `Option<ChangeType>` - 产生的变更，重复通知返回 `None`
    pub fn apply(&self, value: Option<String>) -> Option<ChangeType> {
        let current = self.slot.load();
        let change = match (current.as_deref(), value.as_ref()) {
            (None, None) => return None,
            (Some(old), Some(new)) if old == new => return None,
            (None, Some(_)) => ChangeType::Added,
            (Some(_), Some(_)) => ChangeType::Modified,
            (Some(_), None) => ChangeType::Deleted,
        };
        drop(current);

        self.slot.store(value.map(Arc::new));
        self.version.send_modify(|version| *version += 1);
        Some(change)
    }

    /// 当前版本号
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// 订阅变更通知，接收方在每次可观察的变更后被唤醒
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}
