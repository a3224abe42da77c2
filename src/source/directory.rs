//! 目录配置源
//!
//! 每个配置键对应 `<root>/<namespace>/<key>` 文件，文件不存在即键不存在。
//! 默认是拉取型后端；启用监控后通过文件系统事件推送变更。

use crate::error::{SourceError, SourceResult};
use crate::key::ConfigKey;
use crate::source::{ConfigurationSource, SourceEvent};
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 文件监控相关状态
struct WatchState {
    /// 已订阅的键
    subscribed: Arc<Mutex<HashSet<ConfigKey>>>,
    /// 刷新队列，文件事件和订阅请求都经过它，由单个任务依次读取文件
    refresh: mpsc::UnboundedSender<ConfigKey>,
    /// 推送事件接收器，等待同步驱动取走
    receiver: Mutex<Option<mpsc::UnboundedReceiver<SourceEvent>>>,
    /// 文件系统监控器，随配置源一起释放
    _watcher: Mutex<RecommendedWatcher>,
}

/// 目录配置源
pub struct DirectorySource {
    /// 配置源名称
    name: String,
    /// 命名空间目录
    dir: PathBuf,
    /// 监控状态，拉取模式下为 `None`
    watch: Option<WatchState>,
}

impl DirectorySource {
    /// 创建拉取模式的目录配置源，命名空间目录不存在时自动创建
    ///
    /// # 参数
    /// * `root` - 存储根目录
    /// * `namespace` - 命名空间
    pub fn new<P: AsRef<Path>>(root: P, namespace: &str) -> SourceResult<Self> {
        let dir = root.as_ref().join(namespace);
        std::fs::create_dir_all(&dir)?;
        let dir = std::fs::canonicalize(&dir)?;

        Ok(Self {
            name: format!("directory:{}", dir.display()),
            dir,
            watch: None,
        })
    }

    /// 创建带文件监控的目录配置源（推送模式）
    ///
    /// 需要在 tokio 运行时内调用
    pub fn watching<P: AsRef<Path>>(root: P, namespace: &str) -> SourceResult<Self> {
        let mut source = Self::new(root, namespace)?;
        info!("启动配置目录监控: {}", source.dir.display());

        let subscribed = Arc::new(Mutex::new(HashSet::new()));
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handler_tx = refresh_tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => Self::forward_file_event(&event, &handler_tx),
                Err(e) => error!("配置目录监控事件错误: {}", e),
            },
            notify::Config::default().with_poll_interval(Duration::from_secs(1)),
        )
        .map_err(|e| SourceError::Watch(format!("创建文件监控器失败: {e}")))?;

        watcher
            .watch(&source.dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                SourceError::Watch(format!("监控目录失败 {}: {}", source.dir.display(), e))
            })?;

        tokio::spawn(Self::refresh_loop(
            source.dir.clone(),
            Arc::clone(&subscribed),
            refresh_rx,
            event_tx,
        ));

        source.watch = Some(WatchState {
            subscribed,
            refresh: refresh_tx,
            receiver: Mutex::new(Some(event_rx)),
            _watcher: Mutex::new(watcher),
        });
        Ok(source)
    }

    /// 命名空间目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 写入配置
    pub async fn write(&self, key: &ConfigKey, value: &str) -> SourceResult<()> {
        let path = Self::key_path(&self.dir, key)?;
        tokio::fs::write(&path, value).await?;
        debug!("写入配置文件: {}", path.display());
        Ok(())
    }

    /// 删除配置
    ///
    /// # 返回
    /// * `SourceResult<bool>` - 文件删除前是否存在
    pub async fn delete(&self, key: &ConfigKey) -> SourceResult<bool> {
        let path = Self::key_path(&self.dir, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 把文件事件转换为刷新请求
    fn forward_file_event(event: &Event, refresh: &mpsc::UnboundedSender<ConfigKey>) {
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }

        for path in &event.paths {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                let _ = refresh.send(ConfigKey::from(name));
            }
        }
    }

    /// 依次读取需要刷新的键并推送事件
    async fn refresh_loop(
        dir: PathBuf,
        subscribed: Arc<Mutex<HashSet<ConfigKey>>>,
        mut refresh: mpsc::UnboundedReceiver<ConfigKey>,
        events: mpsc::UnboundedSender<SourceEvent>,
    ) {
        while let Some(key) = refresh.recv().await {
            let wanted = subscribed.lock().contains(&key);
            if !wanted {
                continue;
            }

            match Self::read_key(&dir, &key).await {
                Ok(value) => {
                    if events.send(SourceEvent { key, value }).is_err() {
                        debug!("推送事件接收方已关闭，停止目录刷新任务");
                        break;
                    }
                }
                Err(e) => warn!("读取配置文件失败 {}: {}", key, e),
            }
        }
    }

    /// 键对应的文件路径，拒绝会逃出命名空间目录的键
    fn key_path(dir: &Path, key: &ConfigKey) -> SourceResult<PathBuf> {
        let name = key.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(SourceError::InvalidKey {
                key: name.to_string(),
            });
        }
        Ok(dir.join(name))
    }

    /// 读取单个键
    async fn read_key(dir: &Path, key: &ConfigKey) -> SourceResult<Option<String>> {
        let path = Self::key_path(dir, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| SourceError::InvalidPayload {
                    key: key.to_string(),
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConfigurationSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, keys: &[ConfigKey]) -> SourceResult<HashMap<ConfigKey, Option<String>>> {
        // 命名空间目录消失视为后端不可用，保留上次的值
        if tokio::fs::metadata(&self.dir).await.is_err() {
            return Err(SourceError::Unavailable(format!(
                "配置目录不存在: {}",
                self.dir.display()
            )));
        }

        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            match Self::read_key(&self.dir, key).await {
                Ok(value) => {
                    values.insert(key.clone(), value);
                }
                Err(SourceError::InvalidPayload { key }) => {
                    warn!("配置内容不是合法文本，跳过: {}", key);
                }
                // 单个键不可用不影响同批次其他键
                Err(SourceError::InvalidKey { key }) => {
                    warn!("配置键不能作为文件名，跳过: {}", key);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(values)
    }

    async fn subscribe(&self, key: &ConfigKey) -> SourceResult<()> {
        if let Some(watch) = &self.watch {
            if let Err(e) = Self::key_path(&self.dir, key) {
                // 重试也不会成功，不进入待重试队列
                warn!("忽略无法订阅的配置键: {}", e);
                return Ok(());
            }
            watch.subscribed.lock().insert(key.clone());
            watch
                .refresh
                .send(key.clone())
                .map_err(|_| SourceError::Watch("目录刷新任务已停止".to_string()))?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, key: &ConfigKey) -> SourceResult<()> {
        if let Some(watch) = &self.watch {
            watch.subscribed.lock().remove(key);
        }
        Ok(())
    }

    fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<SourceEvent>> {
        self.watch
            .as_ref()
            .and_then(|watch| watch.receiver.lock().take())
    }
}
