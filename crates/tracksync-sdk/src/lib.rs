//! TrackSync SDK - 健康信息系统追踪数据同步 SDK
//!
//! 本 SDK 将远端服务器上的分层追踪数据（受访者、注册、事件）增量同步到本地存储：
//! - 📒 持久化进度台账：按（组织单元 × 项目）粒度记录已加载状态与服务器时间戳
//! - 🔁 两种同步模式：首次全量加载 / 基于服务器时钟的增量更新
//! - 🛟 可恢复：失败中断后，下一次运行从失败点之后继续，不会重拉已完成的单元
//! - ✍️ 本地优先合并：有未上传本地修改的记录永远不会被服务器数据覆盖
//! - ⚙️ 事件系统：同步进度与完成通知的广播订阅机制
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracksync_sdk::{TrackSync, TrackSyncConfig, StaticCatalog, SyncMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackSyncConfig::builder()
//!         .data_dir("/path/to/data")
//!         .server_url("https://tracker.example.org")
//!         .basic_auth("admin", "district")
//!         .build();
//!
//!     let catalog = Arc::new(StaticCatalog::new());
//!     let sdk = TrackSync::initialize(config, catalog).await?;
//!
//!     // 首次全量加载
//!     sdk.sync(SyncMode::FullLoad).await?;
//!
//!     // 之后只拉取有变化的单元
//!     sdk.sync(SyncMode::IncrementalUpdate).await?;
//!
//!     sdk.shutdown().await?;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod api;
pub mod error;
pub mod events;
pub mod metadata;
pub mod sdk;
pub mod storage;
pub mod sync;
pub mod version;

// 重新导出核心类型，方便使用
pub use api::{HttpTrackerApi, TrackedEntityBundle, TrackerApi};
pub use error::{Result, TrackSyncError};
pub use events::{NotificationBus, SyncNotification};
pub use metadata::{MetadataCatalog, OrgUnit, Program, ProgramCategory, StaticCatalog};
pub use sdk::{init_logging, Credentials, TrackSync, TrackSyncConfig, TrackSyncConfigBuilder};
pub use storage::entities::{
    DataValue, Enrollment, Event, SystemInfo, TrackedEntityAttributeValue, TrackedEntityInstance,
};
pub use storage::StorageManager;
pub use sync::{
    enumerate, CollectionKind, DriverState, LedgerEntry, SyncDriver, SyncFlags, SyncLedger,
    SyncMode, SyncReport, WorkItem,
};
