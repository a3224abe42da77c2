//! 分组配置监视器
//!
//! 分组定义键的值列出了一组条目键，分组监视器随定义变化动态增删条目监视器。
//! 所有变更在同一个临界区内完成，快照通过 `ArcSwap` 发布，读取方永远看不到
//! 执行到一半的变更。

use crate::error::DefinitionError;
use crate::key::ConfigKey;
use crate::watcher::definition::GroupDefinition;
use crate::watcher::single::{ChangeType, Watcher};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// 分组成员变化
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// 新增的条目（需要向配置源订阅）
    pub added: Vec<String>,
    /// 移除的条目（需要向配置源取消订阅）
    pub removed: Vec<String>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 条目变更通知的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// 已应用到条目监视器
    Applied(ChangeType),
    /// 重复通知，无变化
    Unchanged,
    /// 条目不在当前分组定义中，通知被丢弃
    Discarded,
}

/// 分组条目快照（只包含有值的条目）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupItems(BTreeMap<String, String>);

impl GroupItems {
    /// 获取条目值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for GroupItems {
    /// 空分组渲染为 `{}`，下游会直接和这个字面量比较
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// 临界区内的分组状态
#[derive(Debug, Default)]
struct GroupState {
    /// 最近一次解析的分组定义
    definition: GroupDefinition,
    /// 条目名称到监视器的映射，键集合始终等于 `definition`
    items: HashMap<String, Watcher>,
}

/// 分组配置监视器
#[derive(Debug)]
pub struct GroupWatcher {
    /// 分组定义键
    key: ConfigKey,
    /// 分组状态
    state: Mutex<GroupState>,
    /// 最近一次发布的快照
    snapshot: ArcSwap<GroupItems>,
    /// 变更版本号
    version: watch::Sender<u64>,
}

impl GroupWatcher {
    /// 创建新的分组监视器，初始为空分组
    pub fn new(key: impl Into<ConfigKey>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            key: key.into(),
            state: Mutex::new(GroupState::default()),
            snapshot: ArcSwap::from_pointee(GroupItems::default()),
            version,
        }
    }

    /// 获取分组定义键
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// 处理分组定义变更
    ///
    /// 新出现的条目立即建立监视器（初始值缺失），不再被引用的条目立即移除，
    /// 不等待配置源送达该条目自己的删除通知。解析失败时保持原有成员不变。
    ///
    /// # 参数
    /// * `raw` - 分组定义的新值，`None` 表示定义键已删除（等价于空分组）
    ///
    /// # 返回
    /// * `Result<MembershipDiff, DefinitionError>` - 成员变化或解析错误
    pub fn on_definition_changed(
        &self,
        raw: Option<&str>,
    ) -> Result<MembershipDiff, DefinitionError> {
        let definition = match raw {
            Some(raw) => GroupDefinition::parse(raw)?,
            None => GroupDefinition::default(),
        };

        let mut state = self.state.lock();
        let mut diff = MembershipDiff::default();

        for name in definition.names() {
            if !state.items.contains_key(name) {
                state
                    .items
                    .insert(name.clone(), Watcher::new(name.as_str()));
                diff.added.push(name.clone());
            }
        }

        let mut removed: Vec<String> = state
            .items
            .keys()
            .filter(|name| !definition.contains(name))
            .cloned()
            .collect();
        removed.sort();
        for name in &removed {
            state.items.remove(name);
        }
        diff.removed = removed;

        let reordered = state.definition != definition;
        state.definition = definition;

        if !diff.is_empty() || reordered {
            self.publish(&state);
            debug!(
                "分组 {} 成员变更: 新增 {:?}, 移除 {:?}",
                self.key, diff.added, diff.removed
            );
        }

        Ok(diff)
    }

    /// 处理条目值变更
    ///
    /// 条目已不在当前定义中时静默丢弃，迟到的通知不会让已移除的条目复活
    pub fn on_item_value_changed(&self, name: &str, value: Option<String>) -> ItemOutcome {
        let state = self.state.lock();
        let Some(watcher) = state.items.get(name) else {
            return ItemOutcome::Discarded;
        };

        match watcher.apply(value) {
            Some(change) => {
                self.publish(&state);
                ItemOutcome::Applied(change)
            }
            None => ItemOutcome::Unchanged,
        }
    }

    /// 获取当前分组条目快照
    ///
    /// 不获取锁，只加载最近一次发布的快照
    pub fn group_items(&self) -> Arc<GroupItems> {
        self.snapshot.load_full()
    }

    /// 当前分组定义中的条目名称（按定义顺序）
    pub fn definition(&self) -> Vec<String> {
        self.state.lock().definition.names().to_vec()
    }

    /// 当前跟踪的条目名称
    pub fn item_names(&self) -> Vec<String> {
        self.definition()
    }

    /// 是否正在跟踪指定条目
    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().items.contains_key(name)
    }

    /// 当前版本号
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// 订阅分组变更通知
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// 在持有锁的情况下重建并发布快照
    fn publish(&self, state: &GroupState) {
        let items: BTreeMap<String, String> = state
            .items
            .iter()
            .filter_map(|(name, watcher)| watcher.read().map(|value| (name.clone(), value)))
            .collect();
        self.snapshot.store(Arc::new(GroupItems(items)));
        self.version.send_modify(|version| *version += 1);
    }
}
