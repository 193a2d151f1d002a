//! SDK 入口 - 配置与门面
//!
//! `TrackSync` 把存储、传输、驱动器装配在一起；宿主应用只跟它打交道。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::api::{HttpTrackerApi, TrackerApi};
use crate::error::Result;
use crate::events::{NotificationBus, SyncNotification};
use crate::metadata::MetadataCatalog;
use crate::storage::StorageManager;
use crate::sync::{CollectionKind, DriverState, SyncDriver, SyncFlags, SyncMode, SyncReport};

/// 初始化日志输出（宿主没有自己的 tracing 配置时使用）
///
/// 重复调用安全：已有全局 subscriber 时静默跳过。
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// 服务器凭证
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

/// SDK 配置
#[derive(Debug, Clone)]
pub struct TrackSyncConfig {
    /// 数据存储目录
    pub data_dir: PathBuf,
    /// 服务器基础地址，如 `https://tracker.example.org`
    pub server_url: Option<String>,
    /// 凭证（basic 或 bearer）
    pub credentials: Option<Credentials>,
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for TrackSyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tracksync-data"),
            server_url: None,
            credentials: None,
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(60),
        }
    }
}

impl TrackSyncConfig {
    pub fn builder() -> TrackSyncConfigBuilder {
        TrackSyncConfigBuilder::new()
    }
}

/// SDK 配置构建器
pub struct TrackSyncConfigBuilder {
    config: TrackSyncConfig,
}

impl TrackSyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TrackSyncConfig::default(),
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    pub fn basic_auth<S: Into<String>>(mut self, username: S, password: S) -> Self {
        self.config.credentials = Some(Credentials::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn bearer_token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.credentials = Some(Credentials::Bearer(token.into()));
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = Some(secs);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> TrackSyncConfig {
        self.config
    }
}

impl Default for TrackSyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// TrackSync SDK 门面
pub struct TrackSync {
    storage: Arc<StorageManager>,
    driver: Arc<SyncDriver>,
    notifications: NotificationBus,
}

impl TrackSync {
    /// 初始化 SDK：打开存储、构造 HTTP 传输与驱动器
    ///
    /// 服务器地址或凭证缺失在这里立即报前置条件错误。
    pub async fn initialize(
        config: TrackSyncConfig,
        catalog: Arc<dyn MetadataCatalog>,
    ) -> Result<Self> {
        let api = Arc::new(HttpTrackerApi::new(&config)?);
        Self::with_api(config, catalog, api).await
    }

    /// 用自定义传输初始化（测试或嵌入场景）
    pub async fn with_api(
        config: TrackSyncConfig,
        catalog: Arc<dyn MetadataCatalog>,
        api: Arc<dyn TrackerApi>,
    ) -> Result<Self> {
        let storage = Arc::new(StorageManager::new(&config.data_dir).await?);
        let notifications = NotificationBus::default();
        let driver = Arc::new(SyncDriver::new(
            api,
            Arc::clone(&storage),
            catalog,
            notifications.clone(),
        ));

        info!("TrackSync SDK 初始化完成: data_dir={}", config.data_dir.display());

        Ok(Self {
            storage,
            driver,
            notifications,
        })
    }

    /// 执行一次同步运行；运行中再次调用返回 `SyncInProgress`
    pub async fn sync(&self, mode: SyncMode) -> Result<SyncReport> {
        self.driver.sync(mode).await
    }

    /// 请求在当前项之后停止
    pub fn request_stop(&self) {
        self.driver.request_stop();
    }

    /// 驱动器当前状态
    pub fn driver_state(&self) -> DriverState {
        self.driver.state()
    }

    /// 订阅同步通知
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    /// 驱动器句柄（台账介入等进阶用法）
    pub fn driver(&self) -> &SyncDriver {
        &self.driver
    }

    /// 实体存储句柄
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// 最近一次成功运行的服务器时钟
    pub async fn last_synced(&self) -> Result<Option<DateTime<Utc>>> {
        self.driver.last_synced().await
    }

    /// 某集合类型是否全部加载完成
    pub async fn is_collection_loaded(&self, kind: CollectionKind) -> Result<bool> {
        self.driver.is_collection_loaded(kind).await
    }

    /// 清空全部同步状态
    pub async fn clear_sync_state(&self) -> Result<()> {
        self.driver.clear_sync_state().await
    }

    /// 读取同步开关（没存过返回默认全开）
    pub async fn sync_flags(&self) -> Result<SyncFlags> {
        SyncFlags::load(&self.storage.kv()).await
    }

    /// 持久化同步开关
    pub async fn set_sync_flags(&self, flags: &SyncFlags) -> Result<()> {
        flags.store(&self.storage.kv()).await
    }

    /// 关闭 SDK，刷盘
    pub async fn shutdown(&self) -> Result<()> {
        self.storage.shutdown().await?;
        info!("TrackSync SDK 已关闭");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticCatalog;

    #[test]
    fn builder_collects_all_fields() {
        let config = TrackSyncConfig::builder()
            .data_dir("/data/tracksync")
            .server_url("https://tracker.example.org")
            .basic_auth("admin", "district")
            .connect_timeout_secs(5)
            .request_timeout_secs(30)
            .build();

        assert_eq!(config.data_dir, PathBuf::from("/data/tracksync"));
        assert_eq!(
            config.server_url.as_deref(),
            Some("https://tracker.example.org")
        );
        assert!(matches!(config.credentials, Some(Credentials::Basic { .. })));
        assert_eq!(config.connect_timeout_secs, Some(5));
        assert_eq!(config.request_timeout_secs, Some(30));
    }

    #[tokio::test]
    async fn flags_roundtrip_through_kv() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = TrackSyncConfig::builder()
            .data_dir(dir.path())
            .server_url("https://tracker.example.org")
            .basic_auth("admin", "district")
            .build();
        let sdk = TrackSync::initialize(config, Arc::new(StaticCatalog::new()))
            .await
            .unwrap();

        assert_eq!(sdk.sync_flags().await.unwrap(), SyncFlags::default());

        let flags = SyncFlags {
            enrollments: false,
            ..SyncFlags::default()
        };
        sdk.set_sync_flags(&flags).await.unwrap();
        assert_eq!(sdk.sync_flags().await.unwrap(), flags);
    }
}
