//! 内存配置源
//!
//! 进程内的命名空间配置存储，提供与远程配置中心相同的发布、删除语义，
//! 同时支持推送模式和仅拉取模式。

use crate::error::{SourceError, SourceResult};
use crate::key::ConfigKey;
use crate::source::{ConfigurationSource, SourceEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// 存储状态
#[derive(Debug, Default)]
struct MemoryState {
    /// 键值存储
    values: HashMap<ConfigKey, String>,
    /// 已订阅的键
    subscribed: HashSet<ConfigKey>,
}

/// 内存配置源
#[derive(Debug)]
pub struct MemorySource {
    /// 配置源名称
    name: String,
    /// 存储状态；事件在持锁期间发出，保证同一个键的事件顺序与写入顺序一致
    state: Mutex<MemoryState>,
    /// 是否可用（模拟后端故障）
    available: AtomicBool,
    /// 推送事件发送器，仅拉取模式下为 `None`
    events: Option<mpsc::UnboundedSender<SourceEvent>>,
    /// 推送事件接收器，等待同步驱动取走
    receiver: Mutex<Option<mpsc::UnboundedReceiver<SourceEvent>>>,
}

impl MemorySource {
    /// 创建推送模式的内存配置源
    ///
    /// # 参数
    /// * `namespace` - 命名空间（后端自己的“分组”概念）
    pub fn new(namespace: &str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: format!("memory:{namespace}"),
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
            events: Some(sender),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// 创建仅拉取模式的内存配置源
    pub fn pull_only(namespace: &str) -> Self {
        Self {
            name: format!("memory:{namespace}"),
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
            events: None,
            receiver: Mutex::new(None),
        }
    }

    /// 发布配置
    ///
    /// # 参数
    /// * `key` - 配置键
    /// * `value` - 配置值
    ///
    /// # 返回
    /// * `bool` - 值是否发生变化
    pub fn publish(&self, key: impl Into<ConfigKey>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        let mut state = self.state.lock();

        let changed = state.values.get(&key) != Some(&value);
        state.values.insert(key.clone(), value.clone());
        debug!("发布配置: {} = {}", key, value);

        if state.subscribed.contains(&key) {
            self.push(SourceEvent {
                key,
                value: Some(value),
            });
        }
        changed
    }

    /// 删除配置
    ///
    /// # 返回
    /// * `bool` - 键删除前是否存在
    pub fn remove(&self, key: impl Into<ConfigKey>) -> bool {
        let key = key.into();
        let mut state = self.state.lock();

        let existed = state.values.remove(&key).is_some();
        debug!("删除配置: {}", key);

        if existed && state.subscribed.contains(&key) {
            self.push(SourceEvent::removed(key));
        }
        existed
    }

    /// 读取存储中的当前值（不经过可用性检查）
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.lock().values.get(key).cloned()
    }

    /// 设置可用状态，不可用时拉取和订阅都会失败
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 当前是否订阅了指定键
    pub fn is_subscribed(&self, key: &str) -> bool {
        self.state.lock().subscribed.contains(key)
    }

    fn ensure_available(&self) -> SourceResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::Unavailable(format!("{} 暂不可用", self.name)))
        }
    }

    fn push(&self, event: SourceEvent) {
        if let Some(sender) = &self.events {
            // 接收方已关闭说明同步驱动已停止，事件无人消费
            let _ = sender.send(event);
        }
    }
}

#[async_trait]
impl ConfigurationSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, keys: &[ConfigKey]) -> SourceResult<HashMap<ConfigKey, Option<String>>> {
        self.ensure_available()?;
        let state = self.state.lock();
        Ok(keys
            .iter()
            .map(|key| (key.clone(), state.values.get(key).cloned()))
            .collect())
    }

    async fn subscribe(&self, key: &ConfigKey) -> SourceResult<()> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        if !state.subscribed.insert(key.clone()) {
            return Ok(());
        }

        let current = state.values.get(key).cloned();
        self.push(SourceEvent {
            key: key.clone(),
            value: current,
        });
        Ok(())
    }

    async fn unsubscribe(&self, key: &ConfigKey) -> SourceResult<()> {
        self.state.lock().subscribed.remove(key);
        Ok(())
    }

    fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<SourceEvent>> {
        self.receiver.lock().take()
    }
}
