//! 监视器注册表
//!
//! 启动阶段把配置键登记到单键监视器或分组监视器，之后交给同步驱动独占使用

use crate::error::RegistryError;
use crate::key::ConfigKey;
use crate::watcher::{GroupWatcher, Watcher};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// 注册项
#[derive(Debug, Clone)]
pub enum Registration {
    /// 普通配置键
    Single(Arc<Watcher>),
    /// 分组定义键
    Group(Arc<GroupWatcher>),
}

/// 监视器注册表
#[derive(Debug, Default)]
pub struct WatchRegistry {
    entries: BTreeMap<ConfigKey, Registration>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单键监视器
    ///
    /// # 参数
    /// * `watcher` - 监视器，以它自己的键注册
    ///
    /// # 返回
    /// * `Result<(), RegistryError>` - 键已被注册时返回错误
    pub fn register_watcher(&mut self, watcher: Arc<Watcher>) -> Result<(), RegistryError> {
        let key = watcher.key().clone();
        self.insert(key, Registration::Single(watcher))
    }

    /// 注册分组监视器
    pub fn register_group(&mut self, group: Arc<GroupWatcher>) -> Result<(), RegistryError> {
        let key = group.key().clone();
        self.insert(key, Registration::Group(group))
    }

    fn insert(&mut self, key: ConfigKey, registration: Registration) -> Result<(), RegistryError> {
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey {
                key: key.to_string(),
            });
        }
        debug!("注册配置监视器: {}", key);
        self.entries.insert(key, registration);
        Ok(())
    }

    /// 查找注册项
    pub fn get(&self, key: &str) -> Option<&Registration> {
        self.entries.get(key)
    }

    /// 查找单键监视器
    pub fn watcher(&self, key: &str) -> Option<&Arc<Watcher>> {
        match self.entries.get(key) {
            Some(Registration::Single(watcher)) => Some(watcher),
            _ => None,
        }
    }

    /// 查找分组监视器
    pub fn group(&self, key: &str) -> Option<&Arc<GroupWatcher>> {
        match self.entries.get(key) {
            Some(Registration::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// 所有已注册的键
    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.entries.keys()
    }

    /// 所有分组监视器
    pub fn groups(&self) -> impl Iterator<Item = &Arc<GroupWatcher>> {
        self.entries.values().filter_map(|registration| match registration {
            Registration::Group(group) => Some(group),
            Registration::Single(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigKey, &Registration)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
