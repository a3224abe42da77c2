//! 同步驱动模块
//!
//! 驱动与配置源之间的拉取/推送循环，把每个键的变更分发给对应的监视器。
//! 后端通信失败只记录日志并在下个周期重试，监视器继续提供最后一次已知的值。

use crate::error::{Result, SyncError};
use crate::key::ConfigKey;
use crate::registry::{Registration, WatchRegistry};
use crate::source::{ConfigurationSource, SourceEvent};
use crate::watcher::{GroupWatcher, ItemOutcome};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 同步选项
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 拉取周期，同时也是订阅失败后的重试周期
    pub period: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
        }
    }
}

/// 单个键的同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    /// 尚未收到任何通知
    Unseen,
    /// 最近一次通知带有值
    Present,
    /// 最近一次通知是删除
    Absent,
}

/// 同步驱动状态
#[derive(Debug, Clone, Serialize)]
pub struct DriverStatus {
    /// 驱动是否运行中
    pub is_running: bool,
    /// 是否使用推送模式
    pub push_mode: bool,
    /// 注册的键数量
    pub registered_keys: usize,
    /// 当前向配置源订阅的键数量（包括分组条目）
    pub subscribed_keys: usize,
    /// 等待重试订阅的键数量
    pub pending_subscriptions: usize,
    /// 周期计数
    pub sync_cycles: u64,
    /// 失败周期计数
    pub failed_cycles: u64,
    /// 已分发的事件数
    pub dispatched_events: u64,
    /// 被丢弃的事件数（条目已不再被引用）
    pub discarded_events: u64,
    /// 最后一次成功拉取的时间
    pub last_sync: Option<DateTime<Utc>>,
}

impl DriverStatus {
    fn new(registered_keys: usize) -> Self {
        Self {
            is_running: false,
            push_mode: false,
            registered_keys,
            subscribed_keys: 0,
            pending_subscriptions: 0,
            sync_cycles: 0,
            failed_cycles: 0,
            dispatched_events: 0,
            discarded_events: 0,
            last_sync: None,
        }
    }
}

type KeyStates = Arc<Mutex<HashMap<ConfigKey, KeyState>>>;

/// 同步驱动
pub struct SyncDriver {
    /// 监视器注册表，启动后不再变化
    registry: Arc<WatchRegistry>,
    /// 配置源
    source: Arc<dyn ConfigurationSource>,
    /// 同步选项
    options: SyncOptions,
    /// 驱动状态
    status: Arc<RwLock<DriverStatus>>,
    /// 每个键的同步状态
    key_states: KeyStates,
    /// 停止信号
    shutdown: Option<watch::Sender<bool>>,
    /// 同步任务
    task: Option<JoinHandle<()>>,
    /// 是否已经取走过配置源的推送事件流
    stream_taken: bool,
}

impl SyncDriver {
    /// 创建新的同步驱动
    ///
    /// # 参数
    /// * `registry` - 监视器注册表（所有权转移给驱动）
    /// * `source` - 配置源
    /// * `options` - 同步选项
    pub fn new(
        registry: WatchRegistry,
        source: Arc<dyn ConfigurationSource>,
        options: SyncOptions,
    ) -> Self {
        let status = DriverStatus::new(registry.len());
        Self {
            registry: Arc::new(registry),
            source,
            options,
            status: Arc::new(RwLock::new(status)),
            key_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown: None,
            task: None,
            stream_taken: false,
        }
    }

    /// 启动同步任务
    ///
    /// 推送型配置源的事件流只能取走一次，停止后再次启动会以拉取模式运行
    pub async fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            warn!("同步驱动已在运行");
            return Ok(());
        }

        let events = self.source.take_event_stream();
        if events.is_some() {
            self.stream_taken = true;
        } else if self.stream_taken {
            warn!(
                "配置源 {} 的推送事件流已在上次启动时取走，本次以拉取模式运行",
                self.source.name()
            );
        }
        info!(
            "启动配置同步驱动，配置源: {}，注册键数量: {}，模式: {}",
            self.source.name(),
            self.registry.len(),
            if events.is_some() { "推送" } else { "拉取" }
        );

        {
            let mut status = self.status.write().await;
            status.is_running = true;
            status.push_mode = events.is_some();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = SyncEngine {
            registry: Arc::clone(&self.registry),
            source: Arc::clone(&self.source),
            period: self.options.period,
            status: Arc::clone(&self.status),
            key_states: Arc::clone(&self.key_states),
            last_values: HashMap::new(),
            refs: HashMap::new(),
            pending: BTreeSet::new(),
        };

        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(engine.run(events, shutdown_rx)));
        Ok(())
    }

    /// 停止同步任务，取消所有订阅
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }

        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| SyncError::Other(anyhow::anyhow!("同步任务异常退出: {e}")))?;
        }
        Ok(())
    }

    /// 获取驱动状态
    pub async fn status(&self) -> DriverStatus {
        self.status.read().await.clone()
    }

    /// 获取单个键的同步状态
    pub fn key_state(&self, key: &str) -> KeyState {
        self.key_states
            .lock()
            .get(key)
            .copied()
            .unwrap_or(KeyState::Unseen)
    }

    /// 获取注册表
    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// 运行在同步任务内的状态，所有分发都在这一个任务中串行执行
struct SyncEngine {
    registry: Arc<WatchRegistry>,
    source: Arc<dyn ConfigurationSource>,
    period: Duration,
    status: Arc<RwLock<DriverStatus>>,
    key_states: KeyStates,
    /// 每个已订阅键最后一次分发的值
    last_values: HashMap<ConfigKey, Option<String>>,
    /// 订阅引用计数（注册键和分组条目共用）
    refs: HashMap<ConfigKey, usize>,
    /// 订阅失败、等待重试的键
    pending: BTreeSet<ConfigKey>,
}

impl SyncEngine {
    async fn run(
        mut self,
        mut events: Option<mpsc::UnboundedReceiver<SourceEvent>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let keys: Vec<ConfigKey> = self.registry.keys().cloned().collect();
        for key in &keys {
            self.acquire(key).await;
        }
        self.refresh_counts().await;

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = Self::next_event(&mut events) => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        warn!("推送事件流已关闭，切换为拉取模式");
                        events = None;
                        self.status.write().await.push_mode = false;
                    }
                },
                _ = ticker.tick() => {
                    self.on_tick(events.is_none()).await;
                }
            }
        }

        self.deregister_all().await;
        info!("配置同步驱动已停止");
    }

    /// 等待下一个推送事件，拉取模式下永不返回
    async fn next_event(
        events: &mut Option<mpsc::UnboundedReceiver<SourceEvent>>,
    ) -> Option<SourceEvent> {
        match events {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    /// 周期任务：重试失败的订阅，拉取模式下执行一次完整同步
    async fn on_tick(&mut self, pull: bool) {
        let mut failed = !self.retry_pending().await;

        if pull {
            failed |= !self.pull_cycle().await;
        }

        {
            let mut status = self.status.write().await;
            status.sync_cycles += 1;
            if failed {
                status.failed_cycles += 1;
            } else if pull {
                status.last_sync = Some(Utc::now());
            }
        }
        self.refresh_counts().await;
    }

    /// 拉取一次所有关心的键，先处理注册键，再处理分组条目，
    /// 这样本周期分组定义新增的条目也能在同一周期拿到值
    async fn pull_cycle(&mut self) -> bool {
        let primary: Vec<ConfigKey> = self.registry.keys().cloned().collect();
        if !self.fetch_and_dispatch(&primary).await {
            return false;
        }

        let items: Vec<ConfigKey> = self
            .refs
            .keys()
            .filter(|key| self.registry.get(key.as_str()).is_none())
            .cloned()
            .collect();
        if items.is_empty() {
            return true;
        }
        self.fetch_and_dispatch(&items).await
    }

    async fn fetch_and_dispatch(&mut self, keys: &[ConfigKey]) -> bool {
        let values = match self.source.fetch(keys).await {
            Ok(values) => values,
            Err(e) => {
                warn!("从配置源 {} 拉取配置失败，下个周期重试: {}", self.source.name(), e);
                return false;
            }
        };

        let mut values: Vec<(ConfigKey, Option<String>)> = values.into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, value) in values {
            if self.last_values.get(&key) == Some(&value) {
                continue;
            }
            self.dispatch(SourceEvent { key, value }).await;
        }
        true
    }

    /// 分发一个单键事件
    async fn dispatch(&mut self, event: SourceEvent) {
        let SourceEvent { key, value } = event;

        if !self.refs.contains_key(&key) {
            debug!("丢弃已取消订阅的键的事件: {}", key);
            self.status.write().await.discarded_events += 1;
            return;
        }

        self.transition(&key, value.is_some());
        self.last_values.insert(key.clone(), value.clone());
        self.status.write().await.dispatched_events += 1;

        let registry = Arc::clone(&self.registry);
        match registry.get(key.as_str()) {
            Some(Registration::Single(watcher)) => {
                if let Some(change) = watcher.apply(value.clone()) {
                    info!("配置变更: {} ({:?})", key, change);
                }
            }
            Some(Registration::Group(group)) => {
                self.apply_definition(group, value.as_deref()).await;
            }
            None => {}
        }

        // 条目事件交给所有分组，不包含该条目的分组会直接丢弃
        for group in registry.groups() {
            if let ItemOutcome::Applied(change) =
                group.on_item_value_changed(key.as_str(), value.clone())
            {
                info!("分组 {} 条目变更: {} ({:?})", group.key(), key, change);
            }
        }
    }

    /// 应用分组定义变更并同步条目订阅
    async fn apply_definition(&mut self, group: &Arc<GroupWatcher>, raw: Option<&str>) {
        let diff = match group.on_definition_changed(raw) {
            Ok(diff) => diff,
            Err(e) => {
                warn!("分组定义解析失败，保留原有成员 {}: {}", group.key(), e);
                return;
            }
        };

        if diff.is_empty() {
            return;
        }
        info!(
            "分组 {} 成员变更: 新增 {:?}, 移除 {:?}",
            group.key(),
            diff.added,
            diff.removed
        );

        for name in &diff.removed {
            self.release(&ConfigKey::from(name.as_str())).await;
        }

        for name in &diff.added {
            let key = ConfigKey::from(name.as_str());
            // 其他地方已订阅的键不会再收到初始推送，直接用已知值填充
            if let Some(Some(value)) = self.last_values.get(&key) {
                group.on_item_value_changed(name, Some(value.clone()));
            }
            self.acquire(&key).await;
        }
    }

    /// 增加引用，首次引用时向配置源订阅
    async fn acquire(&mut self, key: &ConfigKey) {
        let count = self.refs.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            return;
        }

        if let Err(e) = self.source.subscribe(key).await {
            warn!("订阅配置键失败，下个周期重试 {}: {}", key, e);
            self.pending.insert(key.clone());
        }
    }

    /// 减少引用，最后一个引用释放时取消订阅
    async fn release(&mut self, key: &ConfigKey) {
        let Some(count) = self.refs.get_mut(key) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }

        self.refs.remove(key);
        self.pending.remove(key);
        self.last_values.remove(key);
        self.key_states.lock().remove(key);

        if let Err(e) = self.source.unsubscribe(key).await {
            warn!("取消订阅配置键失败 {}: {}", key, e);
        }
    }

    /// 重试失败的订阅
    ///
    /// # 返回
    /// * `bool` - 所有重试是否都成功
    async fn retry_pending(&mut self) -> bool {
        let pending = std::mem::take(&mut self.pending);
        let mut all_ok = true;

        for key in pending {
            if !self.refs.contains_key(&key) {
                continue;
            }
            match self.source.subscribe(&key).await {
                Ok(()) => info!("重试订阅成功: {}", key),
                Err(e) => {
                    debug!("重试订阅失败 {}: {}", key, e);
                    self.pending.insert(key);
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    /// 更新键状态机
    ///
    /// 首次通知就是“不存在”时保持 `Unseen`，只有见过值之后的删除才进入 `Absent`
    fn transition(&self, key: &ConfigKey, present: bool) {
        let mut states = self.key_states.lock();
        let previous = states.get(key).copied().unwrap_or(KeyState::Unseen);
        let next = match (previous, present) {
            (_, true) => KeyState::Present,
            (KeyState::Unseen, false) => return,
            (_, false) => KeyState::Absent,
        };

        states.insert(key.clone(), next);
        if previous != next {
            debug!("键状态迁移 {}: {:?} -> {:?}", key, previous, next);
        }
    }

    async fn refresh_counts(&self) {
        let mut status = self.status.write().await;
        status.subscribed_keys = self.refs.len();
        status.pending_subscriptions = self.pending.len();
    }

    /// 停止时取消所有订阅
    async fn deregister_all(&mut self) {
        for key in self.refs.keys() {
            if let Err(e) = self.source.unsubscribe(key).await {
                warn!("取消订阅配置键失败 {}: {}", key, e);
            }
        }
        self.refs.clear();
        self.pending.clear();
        self.last_values.clear();
        self.key_states.lock().clear();

        let mut status = self.status.write().await;
        status.is_running = false;
        status.subscribed_keys = 0;
        status.pending_subscriptions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceResult;
    use crate::source::{DirectorySource, MemorySource};
    use crate::watcher::Watcher;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const FLAT_KEY: &str = "test-module.default.testKey";
    const GROUP_KEY: &str = "test-module.default.testKeyGroup";

    fn options() -> SyncOptions {
        SyncOptions {
            period: Duration::from_millis(20),
        }
    }

    async fn wait_until<F: Fn() -> bool>(mut changes: watch::Receiver<u64>, condition: F) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                changes.changed().await.expect("监视器已释放");
            }
        })
        .await
        .expect("等待条件超时");
    }

    fn setup(source: Arc<MemorySource>) -> (SyncDriver, Arc<Watcher>, Arc<GroupWatcher>) {
        let watcher = Arc::new(Watcher::new(FLAT_KEY));
        let group = Arc::new(GroupWatcher::new(GROUP_KEY));
        let mut registry = WatchRegistry::new();
        registry.register_watcher(Arc::clone(&watcher)).unwrap();
        registry.register_group(Arc::clone(&group)).unwrap();
        (SyncDriver::new(registry, source, options()), watcher, group)
    }

    #[tokio::test]
    async fn test_push_mode_single_key() {
        let source = Arc::new(MemorySource::new("skywalking"));
        let (mut driver, watcher, _group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();

        assert_eq!(watcher.read(), None);
        source.publish(FLAT_KEY, "500");
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("500")).await;
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Present);

        source.remove(FLAT_KEY);
        wait_until(watcher.subscribe(), || watcher.read().is_none()).await;
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Absent);

        source.publish(FLAT_KEY, "600");
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("600")).await;
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Present);

        driver.stop().await.unwrap();
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Unseen);
        assert!(!source.is_subscribed(FLAT_KEY));
        assert!(!driver.status().await.is_running);
    }

    #[tokio::test]
    async fn test_pull_mode_fills_new_items_in_same_cycle() {
        let source = Arc::new(MemorySource::pull_only("skywalking"));
        source.publish("item1", "100");
        source.publish("item2", "200");
        let (mut driver, _watcher, group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();

        source.publish(GROUP_KEY, "item1\n item2");
        wait_until(group.subscribe(), || group.group_items().len() == 2).await;
        assert_eq!(group.group_items().get("item1"), Some("100"));
        assert_eq!(group.group_items().get("item2"), Some("200"));

        let status = driver.status().await;
        assert!(!status.push_mode);
        assert!(status.last_sync.is_some());
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_mode_outage_keeps_last_known_value() {
        let source = Arc::new(MemorySource::pull_only("skywalking"));
        source.publish(FLAT_KEY, "v1");
        let (mut driver, watcher, _group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("v1")).await;

        source.set_available(false);
        source.publish(FLAT_KEY, "v2");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(watcher.read().as_deref(), Some("v1"));
        assert!(driver.status().await.failed_cycles > 0);

        source.set_available(true);
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("v2")).await;
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_push_mode_retries_failed_subscriptions() {
        let source = Arc::new(MemorySource::new("skywalking"));
        source.publish(FLAT_KEY, "500");
        source.set_available(false);
        let (mut driver, watcher, _group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(watcher.read(), None);
        assert!(driver.status().await.pending_subscriptions > 0);

        source.set_available(true);
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("500")).await;
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_shared_item_stays_subscribed() {
        let source = Arc::new(MemorySource::new("skywalking"));
        let shared = Arc::new(Watcher::new("shared"));
        let group = Arc::new(GroupWatcher::new(GROUP_KEY));
        let mut registry = WatchRegistry::new();
        registry.register_watcher(Arc::clone(&shared)).unwrap();
        registry.register_group(Arc::clone(&group)).unwrap();
        let mut driver = SyncDriver::new(registry, source.clone(), options());
        driver.start().await.unwrap();

        source.publish("shared", "1");
        source.publish(GROUP_KEY, "shared");
        wait_until(group.subscribe(), || group.group_items().get("shared") == Some("1")).await;

        source.publish(GROUP_KEY, "other");
        wait_until(group.subscribe(), || group.group_items().is_empty()).await;
        assert!(source.is_subscribed("shared"));
        assert_eq!(shared.read().as_deref(), Some("1"));

        // 重新引用时直接使用已知值
        source.publish(GROUP_KEY, "shared");
        wait_until(group.subscribe(), || group.group_items().get("shared") == Some("1")).await;
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dereferenced_item_is_unsubscribed() {
        let source = Arc::new(MemorySource::new("skywalking"));
        let (mut driver, _watcher, group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();

        source.publish(GROUP_KEY, "item1\nitem2");
        wait_until(group.subscribe(), || group.item_names().len() == 2).await;
        source.publish("item1", "100");
        wait_until(group.subscribe(), || group.group_items().contains_key("item1")).await;
        assert!(source.is_subscribed("item1"));

        source.publish(GROUP_KEY, "item2");
        wait_until(group.subscribe(), || !group.contains("item1")).await;
        source.publish("item1", "999");

        // 等待驱动处理完后续事件
        source.publish("item2", "200");
        wait_until(group.subscribe(), || group.group_items().contains_key("item2")).await;
        assert!(!source.is_subscribed("item1"));
        assert_eq!(group.group_items().get("item1"), None);
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_never_published_key_stays_unseen() {
        let source = Arc::new(MemorySource::new("skywalking"));
        let (mut driver, watcher, group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();

        // 订阅时推送的初始“不存在”先于分组定义事件被处理
        source.publish(GROUP_KEY, "item1");
        wait_until(group.subscribe(), || group.contains("item1")).await;

        assert_eq!(watcher.read(), None);
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Unseen);
        assert_eq!(driver.key_state(GROUP_KEY), KeyState::Present);

        source.publish(FLAT_KEY, "500");
        wait_until(watcher.subscribe(), || watcher.read().is_some()).await;
        source.remove(FLAT_KEY);
        wait_until(watcher.subscribe(), || watcher.read().is_none()).await;
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Absent);
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_mode_never_published_key_stays_unseen() {
        let source = Arc::new(MemorySource::pull_only("skywalking"));
        source.publish(GROUP_KEY, "item1");
        let (mut driver, _watcher, group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();

        wait_until(group.subscribe(), || group.contains("item1")).await;
        assert_eq!(driver.key_state(FLAT_KEY), KeyState::Unseen);
        assert_eq!(driver.key_state("item1"), KeyState::Unseen);
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_item_name_does_not_block_other_items() {
        let root = TempDir::new().unwrap();
        let source = Arc::new(DirectorySource::new(root.path(), "skywalking").unwrap());
        source.write(&ConfigKey::from("item1"), "100").await.unwrap();
        source
            .write(&ConfigKey::from(GROUP_KEY), "item1\nsub/item2")
            .await
            .unwrap();

        let group = Arc::new(GroupWatcher::new(GROUP_KEY));
        let mut registry = WatchRegistry::new();
        registry.register_group(Arc::clone(&group)).unwrap();
        let mut driver = SyncDriver::new(registry, source.clone(), options());
        driver.start().await.unwrap();

        wait_until(group.subscribe(), || {
            group.group_items().get("item1") == Some("100")
        })
        .await;
        assert_eq!(group.definition(), vec!["item1", "sub/item2"]);
        assert!(!group.group_items().contains_key("sub/item2"));

        source.write(&ConfigKey::from("item1"), "200").await.unwrap();
        wait_until(group.subscribe(), || {
            group.group_items().get("item1") == Some("200")
        })
        .await;
        assert_eq!(driver.status().await.failed_cycles, 0);
        driver.stop().await.unwrap();
    }

    /// 推送事件流一开始就关闭的配置源，拉取委托给内存配置源
    struct ClosedStreamSource {
        inner: MemorySource,
        receiver: Mutex<Option<mpsc::UnboundedReceiver<SourceEvent>>>,
    }

    impl ClosedStreamSource {
        fn new() -> Self {
            let (_sender, receiver) = mpsc::unbounded_channel();
            Self {
                inner: MemorySource::pull_only("skywalking"),
                receiver: Mutex::new(Some(receiver)),
            }
        }
    }

    #[async_trait]
    impl ConfigurationSource for ClosedStreamSource {
        fn name(&self) -> &str {
            "closed-stream"
        }

        async fn fetch(
            &self,
            keys: &[ConfigKey],
        ) -> SourceResult<HashMap<ConfigKey, Option<String>>> {
            self.inner.fetch(keys).await
        }

        fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<SourceEvent>> {
            self.receiver.lock().take()
        }
    }

    #[tokio::test]
    async fn test_closed_event_stream_falls_back_to_pull() {
        let source = Arc::new(ClosedStreamSource::new());
        let watcher = Arc::new(Watcher::new(FLAT_KEY));
        let mut registry = WatchRegistry::new();
        registry.register_watcher(Arc::clone(&watcher)).unwrap();
        let mut driver = SyncDriver::new(registry, source.clone(), options());
        driver.start().await.unwrap();

        source.inner.publish(FLAT_KEY, "500");
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("500")).await;

        let status = driver.status().await;
        assert!(!status.push_mode);
        assert!(status.last_sync.is_some());
        driver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_stop_uses_pull_mode() {
        let source = Arc::new(MemorySource::new("skywalking"));
        let (mut driver, watcher, _group) = setup(Arc::clone(&source));
        driver.start().await.unwrap();
        assert!(driver.status().await.push_mode);
        driver.stop().await.unwrap();

        driver.start().await.unwrap();
        assert!(!driver.status().await.push_mode);
        source.publish(FLAT_KEY, "500");
        wait_until(watcher.subscribe(), || watcher.read().as_deref() == Some("500")).await;
        driver.stop().await.unwrap();
    }
}
