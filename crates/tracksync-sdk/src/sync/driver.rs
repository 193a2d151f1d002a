//! 同步驱动器 - 状态机编排
//!
//! 状态流转：`Idle → FetchingClock → Working(mode) → Finalizing → Idle`
//!
//! 驱动器不持有业务数据，只持有游标状态。每次只派发一个抓取任务，
//! 任务在独立的 tokio task 上执行，驱动器挂起等完成通知，台账与
//! 枚举游标因此天然单写。任务成功后调和入库、推进台账，然后从枚举
//! 顶部重新扫描；已完成项跳过的代价很低，换来简单的断点续传。
//!
//! ## NOTE: Driver 不做重试
//!
//! 任何抓取失败都在当前项中止整个运行；重试 / 退避策略属于外层
//! 调度层。台账里已提交的进度保留，下一次运行从失败点之后继续。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

use crate::api::{TrackedEntityBundle, TrackerApi};
use crate::error::{Result, TrackSyncError};
use crate::events::{NotificationBus, SyncNotification};
use crate::metadata::MetadataCatalog;
use crate::storage::entities::{Enrollment, Event, SystemInfo};
use crate::storage::StorageManager;

use super::ledger::{LedgerEntry, SyncLedger};
use super::reconciler::Reconciler;
use super::work::{enumerate, CollectionKind, SyncFlags, WorkItem};
use super::SyncMode;

/// 全局高水位标记：最近一次成功运行的服务器时钟
pub const LAST_SYNCED_KEY: &str = "sync:last_synced";

/// 驱动器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    FetchingClock,
    Working(SyncMode),
    Finalizing,
}

/// 单次运行的结果摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub success: bool,
    /// 因停止请求在两项之间中止
    pub aborted: bool,
    pub items_synced: usize,
    pub events_touched: usize,
}

/// 抓取任务的解码结果
enum FetchedCollection {
    TrackedEntityInstances(TrackedEntityBundle),
    Enrollments(Vec<Enrollment>),
    Events(Vec<Event>),
}

/// 同步驱动器
pub struct SyncDriver {
    api: Arc<dyn TrackerApi>,
    storage: Arc<StorageManager>,
    catalog: Arc<dyn MetadataCatalog>,
    ledger: SyncLedger,
    reconciler: Reconciler,
    notifications: NotificationBus,
    state: RwLock<DriverState>,
    /// 运行锁：驱动器不可重入，运行中再次启动直接拒绝
    run_lock: AsyncMutex<()>,
    stop_requested: AtomicBool,
}

impl SyncDriver {
    pub fn new(
        api: Arc<dyn TrackerApi>,
        storage: Arc<StorageManager>,
        catalog: Arc<dyn MetadataCatalog>,
        notifications: NotificationBus,
    ) -> Self {
        let ledger = SyncLedger::new(storage.kv());
        let reconciler = Reconciler::new(Arc::clone(&storage));
        Self {
            api,
            storage,
            catalog,
            ledger,
            reconciler,
            notifications,
            state: RwLock::new(DriverState::Idle),
            run_lock: AsyncMutex::new(()),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// 当前状态
    pub fn state(&self) -> DriverState {
        *self.state.read()
    }

    /// 进度台账（进度细节不随失败通知外发，调用方直接查台账）
    pub fn ledger(&self) -> &SyncLedger {
        &self.ledger
    }

    /// 请求在当前项之后停止；不取消已在途的网络请求
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// 执行一次同步运行
    pub async fn sync(&self, mode: SyncMode) -> Result<SyncReport> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| TrackSyncError::SyncInProgress)?;
        self.stop_requested.store(false, Ordering::SeqCst);

        match self.run(mode).await {
            Ok(report) => {
                self.set_state(DriverState::Idle);
                Ok(report)
            }
            Err(e) => {
                error!("同步运行失败: mode={:?}, error={}", mode, e);
                self.set_state(DriverState::Finalizing);
                // 单条终态失败通知；台账保留已提交的进度
                self.notifications.emit(SyncNotification::LoadingFinished {
                    mode,
                    success: false,
                });
                self.set_state(DriverState::Idle);
                Err(e)
            }
        }
    }

    async fn run(&self, mode: SyncMode) -> Result<SyncReport> {
        info!("🔄 同步运行开始: mode={:?}", mode);
        self.set_state(DriverState::FetchingClock);
        let system_info = self.fetch_clock().await?;
        let server_date = system_info.server_date;
        debug!("服务器时钟: {}", server_date);

        self.set_state(DriverState::Working(mode));
        let flags = SyncFlags::load(&self.storage.kv()).await?;

        let mut items_synced = 0usize;
        let mut events_touched = 0usize;
        let mut aborted = false;

        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("收到停止请求，不再派发下一项");
                aborted = true;
                break;
            }

            let Some((item, entry)) = self.next_pending_item(mode, server_date, &flags).await?
            else {
                // 完整扫描没有待处理项
                break;
            };

            self.notifications.emit(SyncNotification::Progress {
                message: format!("loading {}: {}: {}", item.kind, item.org_unit, item.program),
            });
            debug!("派发抓取任务: key={}", item.ledger_key());

            let updated_since = match (mode, item.kind) {
                (SyncMode::IncrementalUpdate, CollectionKind::Events) => entry.last_updated,
                _ => None,
            };
            let payload = self.dispatch(&item, updated_since).await?;
            let touched = self.apply(&item, payload).await?;
            if item.kind == CollectionKind::Events {
                events_touched += touched;
            }

            let key = item.ledger_key();
            self.ledger.set_loaded(&key, true).await?;
            self.ledger.set_updated(&key, Some(server_date)).await?;
            items_synced += 1;
        }

        self.set_state(DriverState::Finalizing);
        if aborted {
            info!("同步运行中止: mode={:?}, items={}", mode, items_synced);
            return Ok(SyncReport {
                mode,
                success: false,
                aborted: true,
                items_synced,
                events_touched,
            });
        }

        // 成功收尾：推进全局高水位标记
        self.storage.kv().set(LAST_SYNCED_KEY, &server_date).await?;
        self.notifications.emit(SyncNotification::LoadingFinished {
            mode,
            success: true,
        });
        if mode == SyncMode::IncrementalUpdate && events_touched > 0 {
            debug!("sending invalidate");
            self.notifications.emit(SyncNotification::InvalidateEventCache);
        }
        info!("✅ 同步运行完成: mode={:?}, items={}", mode, items_synced);
        Ok(SyncReport {
            mode,
            success: true,
            aborted: false,
            items_synced,
            events_touched,
        })
    }

    /// 从枚举顶部扫描，返回第一个待处理的工作项及其台账记录
    async fn next_pending_item(
        &self,
        mode: SyncMode,
        server_date: DateTime<Utc>,
        flags: &SyncFlags,
    ) -> Result<Option<(WorkItem, LedgerEntry)>> {
        for item in enumerate(self.catalog.as_ref(), flags) {
            let entry = self.ledger.get(&item.ledger_key()).await?;
            let pending = match mode {
                SyncMode::FullLoad => !entry.loaded,
                // 从未记录过时钟值一律视为过期：首跑与台账不完整时强制拉取
                SyncMode::IncrementalUpdate => {
                    entry.last_updated.map_or(true, |at| at < server_date)
                }
            };
            if pending {
                return Ok(Some((item, entry)));
            }
        }
        Ok(None)
    }

    /// 时钟探针在独立 task 上执行，驱动器挂起等结果
    async fn fetch_clock(&self) -> Result<SystemInfo> {
        let api = Arc::clone(&self.api);
        let handle = tokio::spawn(async move { api.system_info().await });
        handle
            .await
            .map_err(|e| TrackSyncError::Runtime(format!("时钟探针异常退出: {}", e)))?
    }

    /// 派发一个抓取任务到独立 task；同一时刻只有一个在途
    async fn dispatch(
        &self,
        item: &WorkItem,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<FetchedCollection> {
        let api = Arc::clone(&self.api);
        let task_item = item.clone();
        let handle = tokio::spawn(async move {
            match task_item.kind {
                CollectionKind::TrackedEntityInstances => api
                    .tracked_entity_instances(&task_item.org_unit, &task_item.program)
                    .await
                    .map(FetchedCollection::TrackedEntityInstances),
                CollectionKind::Enrollments => api
                    .enrollments(&task_item.org_unit, &task_item.program)
                    .await
                    .map(FetchedCollection::Enrollments),
                CollectionKind::Events => api
                    .events(&task_item.org_unit, &task_item.program, updated_since)
                    .await
                    .map(FetchedCollection::Events),
            }
        });
        handle
            .await
            .map_err(|e| TrackSyncError::Runtime(format!("抓取任务异常退出: {}", e)))?
    }

    /// 调和入库，返回触达条数
    async fn apply(&self, item: &WorkItem, payload: FetchedCollection) -> Result<usize> {
        match payload {
            FetchedCollection::TrackedEntityInstances(bundle) => {
                self.reconciler
                    .apply_tracked_entity_instances(item, bundle)
                    .await
            }
            FetchedCollection::Enrollments(enrollments) => {
                self.reconciler.apply_enrollments(item, enrollments).await
            }
            FetchedCollection::Events(events) => self.reconciler.apply_events(item, events).await,
        }
    }

    /// 最近一次成功运行的服务器时钟
    pub async fn last_synced(&self) -> Result<Option<DateTime<Utc>>> {
        self.storage.kv().get(LAST_SYNCED_KEY).await
    }

    /// 某集合类型是否全部加载完成
    pub async fn is_collection_loaded(&self, kind: CollectionKind) -> Result<bool> {
        let flags = SyncFlags::load(&self.storage.kv()).await?;
        for item in enumerate(self.catalog.as_ref(), &flags) {
            if item.kind != kind {
                continue;
            }
            if !self.ledger.get(&item.ledger_key()).await?.loaded {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 清空全部同步状态：每个可枚举工作项的台账记录与全局标记
    pub async fn clear_sync_state(&self) -> Result<()> {
        // 用全开的开关枚举：开关被关掉期间写入的记录也要清到
        let flags = SyncFlags::default();
        let keys: Vec<String> = enumerate(self.catalog.as_ref(), &flags)
            .map(|item| item.ledger_key())
            .collect();
        self.ledger.clear_all(keys).await?;
        self.storage.kv().delete(LAST_SYNCED_KEY).await?;
        info!("同步状态已清空");
        Ok(())
    }

    fn set_state(&self, state: DriverState) {
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Program, ProgramCategory, StaticCatalog};
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;
    use tempfile::TempDir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    struct MockApi {
        server_date: DateTime<Utc>,
        fail_clock: AtomicBool,
        fail_keys: Mutex<HashSet<String>>,
        fetch_log: Mutex<Vec<String>>,
        events_payload: Mutex<HashMap<String, Vec<Event>>>,
        fetch_delay: Mutex<Option<Duration>>,
    }

    impl MockApi {
        fn new(server_date: DateTime<Utc>) -> Self {
            Self {
                server_date,
                fail_clock: AtomicBool::new(false),
                fail_keys: Mutex::new(HashSet::new()),
                fetch_log: Mutex::new(Vec::new()),
                events_payload: Mutex::new(HashMap::new()),
                fetch_delay: Mutex::new(None),
            }
        }

        fn fail_on(&self, key: &str) {
            self.fail_keys.lock().insert(key.to_string());
        }

        fn clear_failures(&self) {
            self.fail_keys.lock().clear();
        }

        fn log(&self) -> Vec<String> {
            self.fetch_log.lock().clone()
        }

        fn clear_log(&self) {
            self.fetch_log.lock().clear();
        }

        async fn record(&self, kind: &str, org_unit: &str, program: &str) -> Result<()> {
            let delay = *self.fetch_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let key = format!("{}:{}:{}", kind, org_unit, program);
            self.fetch_log.lock().push(key.clone());
            if self.fail_keys.lock().contains(&key) {
                return Err(TrackSyncError::Transport {
                    url: key,
                    cause: "mock failure".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl TrackerApi for MockApi {
        async fn system_info(&self) -> Result<SystemInfo> {
            if self.fail_clock.load(Ordering::SeqCst) {
                return Err(TrackSyncError::Transport {
                    url: "system/info".to_string(),
                    cause: "mock clock failure".to_string(),
                });
            }
            Ok(SystemInfo {
                server_date: self.server_date,
            })
        }

        async fn tracked_entity_instances(
            &self,
            org_unit: &str,
            program: &str,
        ) -> Result<TrackedEntityBundle> {
            self.record("tracked_entity_instances", org_unit, program)
                .await?;
            Ok(TrackedEntityBundle::default())
        }

        async fn enrollments(&self, org_unit: &str, program: &str) -> Result<Vec<Enrollment>> {
            self.record("enrollments", org_unit, program).await?;
            Ok(Vec::new())
        }

        async fn events(
            &self,
            org_unit: &str,
            program: &str,
            _updated_since: Option<DateTime<Utc>>,
        ) -> Result<Vec<Event>> {
            self.record("events", org_unit, program).await?;
            Ok(self
                .events_payload
                .lock()
                .get(&format!("{}:{}", org_unit, program))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn program(id: &str, category: ProgramCategory) -> Program {
        Program {
            id: id.to_string(),
            name: id.to_string(),
            category,
        }
    }

    /// OU1×P1 与 OU2×P2，三种集合类型全开 → 6 个工作项
    fn two_cell_catalog() -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        catalog.add_org_unit("OU1", "Eastern District");
        catalog.add_org_unit("OU2", "Western District");
        catalog.assign_program(
            "OU1",
            program("P1", ProgramCategory::MultipleEventsWithRegistration),
        );
        catalog.assign_program(
            "OU2",
            program("P2", ProgramCategory::SingleEventWithRegistration),
        );
        catalog
    }

    /// OU1×P1（SEWoR）→ 只有一个 events 工作项
    fn events_only_catalog() -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        catalog.add_org_unit("OU1", "Eastern District");
        catalog.assign_program(
            "OU1",
            program("P1", ProgramCategory::SingleEventWithoutRegistration),
        );
        catalog
    }

    async fn harness(
        catalog: StaticCatalog,
        api: Arc<MockApi>,
    ) -> (TempDir, Arc<SyncDriver>) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::new(dir.path()).await.unwrap());
        let driver = Arc::new(SyncDriver::new(
            api,
            storage,
            Arc::new(catalog),
            NotificationBus::default(),
        ));
        (dir, driver)
    }

    fn sample_event(uid: &str) -> Event {
        Event {
            local_id: None,
            uid: uid.to_string(),
            enrollment_uid: None,
            local_enrollment_id: None,
            org_unit: Some("OU1".to_string()),
            program: Some("P1".to_string()),
            program_stage: None,
            status: Some("COMPLETED".to_string()),
            event_date: None,
            from_server: true,
            data_values: Vec::new(),
        }
    }

    #[tokio::test]
    async fn full_load_marks_every_cell_and_second_run_fetches_nothing() {
        let api = Arc::new(MockApi::new(ts(1000)));
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        let report = driver.sync(SyncMode::FullLoad).await.unwrap();
        assert!(report.success);
        assert_eq!(report.items_synced, 6);
        assert_eq!(api.log().len(), 6);
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.last_synced().await.unwrap(), Some(ts(1000)));

        let entry = driver.ledger().get("events:OU2:P2").await.unwrap();
        assert!(entry.loaded);
        assert_eq!(entry.last_updated, Some(ts(1000)));

        // 第二次全量：所有键已加载，零次抓取
        let report = driver.sync(SyncMode::FullLoad).await.unwrap();
        assert!(report.success);
        assert_eq!(report.items_synced, 0);
        assert_eq!(api.log().len(), 6);
    }

    #[tokio::test]
    async fn failed_item_aborts_run_and_next_run_resumes_there() {
        let api = Arc::new(MockApi::new(ts(1000)));
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        // 全部 6 个键的枚举顺序
        let keys = [
            "tracked_entity_instances:OU1:P1",
            "enrollments:OU1:P1",
            "events:OU1:P1",
            "tracked_entity_instances:OU2:P2",
            "enrollments:OU2:P2",
            "events:OU2:P2",
        ];
        api.fail_on(keys[2]);

        let err = driver.sync(SyncMode::FullLoad).await.unwrap_err();
        assert!(err.is_transport_error());

        // 前两项已持久化，失败项未被标记
        assert!(driver.ledger().get(keys[0]).await.unwrap().loaded);
        assert!(driver.ledger().get(keys[1]).await.unwrap().loaded);
        assert!(!driver.ledger().get(keys[2]).await.unwrap().loaded);
        // 失败的运行不推进全局标记
        assert_eq!(driver.last_synced().await.unwrap(), None);

        // 下一次运行跳过前两项，先重试失败项
        api.clear_failures();
        api.clear_log();
        let report = driver.sync(SyncMode::FullLoad).await.unwrap();
        assert!(report.success);
        assert_eq!(api.log().first().map(String::as_str), Some(keys[2]));
        assert_eq!(api.log().len(), 4);
    }

    #[tokio::test]
    async fn incremental_update_fetches_only_stale_cells() {
        let api = Arc::new(MockApi::new(ts(2000)));
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        // 与服务器时钟相等 → 已是最新；更旧 → 过期；其余键没有记录 → 强制拉取
        let current = "tracked_entity_instances:OU1:P1";
        let stale = "enrollments:OU1:P1";
        driver
            .ledger()
            .set_updated(current, Some(ts(2000)))
            .await
            .unwrap();
        driver.ledger().set_updated(stale, Some(ts(1000))).await.unwrap();

        let report = driver.sync(SyncMode::IncrementalUpdate).await.unwrap();
        assert!(report.success);
        assert_eq!(report.items_synced, 5);

        let log = api.log();
        assert!(!log.contains(&current.to_string()));
        assert!(log.contains(&stale.to_string()));

        // 拉取过的键记录新的服务器时钟
        let entry = driver.ledger().get(stale).await.unwrap();
        assert_eq!(entry.last_updated, Some(ts(2000)));
        // 已是最新的键保持原值
        let entry = driver.ledger().get(current).await.unwrap();
        assert_eq!(entry.last_updated, Some(ts(2000)));
    }

    #[tokio::test]
    async fn empty_events_cell_is_marked_loaded_with_server_clock() {
        let api = Arc::new(MockApi::new(ts(1000)));
        let (_dir, driver) = harness(events_only_catalog(), Arc::clone(&api)).await;

        let report = driver.sync(SyncMode::FullLoad).await.unwrap();
        assert!(report.success);
        assert_eq!(report.items_synced, 1);
        assert_eq!(api.log(), vec!["events:OU1:P1".to_string()]);

        let entry = driver.ledger().get("events:OU1:P1").await.unwrap();
        assert!(entry.loaded);
        assert_eq!(entry.last_updated, Some(ts(1000)));
    }

    #[tokio::test]
    async fn clock_probe_failure_fails_the_run_before_any_dispatch() {
        let api = Arc::new(MockApi::new(ts(1000)));
        api.fail_clock.store(true, Ordering::SeqCst);
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        let mut rx = driver.notifications.subscribe();
        let err = driver.sync(SyncMode::FullLoad).await.unwrap_err();
        assert!(err.is_transport_error());
        assert!(api.log().is_empty());
        assert_eq!(
            rx.recv().await.unwrap(),
            SyncNotification::LoadingFinished {
                mode: SyncMode::FullLoad,
                success: false,
            }
        );
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[tokio::test]
    async fn second_sync_while_running_is_rejected() {
        let api = Arc::new(MockApi::new(ts(1000)));
        *api.fetch_delay.lock() = Some(Duration::from_millis(200));
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        let background = Arc::clone(&driver);
        let handle = tokio::spawn(async move { background.sync(SyncMode::FullLoad).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = driver.sync(SyncMode::FullLoad).await.unwrap_err();
        assert!(matches!(err, TrackSyncError::SyncInProgress));

        let report = handle.await.unwrap().unwrap();
        assert!(report.success);
    }

    #[tokio::test]
    async fn stop_request_halts_between_items() {
        let api = Arc::new(MockApi::new(ts(1000)));
        *api.fetch_delay.lock() = Some(Duration::from_millis(200));
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        let background = Arc::clone(&driver);
        let handle = tokio::spawn(async move { background.sync(SyncMode::FullLoad).await });
        // 第一项在途时请求停止
        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.request_stop();

        let report = handle.await.unwrap().unwrap();
        assert!(report.aborted);
        assert!(!report.success);
        assert_eq!(report.items_synced, 1);
        assert_eq!(api.log().len(), 1);
        // 中止的运行不推进全局标记
        assert_eq!(driver.last_synced().await.unwrap(), None);
    }

    #[tokio::test]
    async fn incremental_run_touching_events_emits_invalidate() {
        let api = Arc::new(MockApi::new(ts(1000)));
        api.events_payload
            .lock()
            .insert("OU1:P1".to_string(), vec![sample_event("ev-1")]);
        let (_dir, driver) = harness(events_only_catalog(), Arc::clone(&api)).await;

        let mut rx = driver.notifications.subscribe();
        driver.sync(SyncMode::IncrementalUpdate).await.unwrap();

        let mut received = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            received.push(notification);
        }
        assert!(received.contains(&SyncNotification::LoadingFinished {
            mode: SyncMode::IncrementalUpdate,
            success: true,
        }));
        assert!(received.contains(&SyncNotification::InvalidateEventCache));
    }

    #[tokio::test]
    async fn full_load_does_not_emit_invalidate() {
        let api = Arc::new(MockApi::new(ts(1000)));
        api.events_payload
            .lock()
            .insert("OU1:P1".to_string(), vec![sample_event("ev-1")]);
        let (_dir, driver) = harness(events_only_catalog(), Arc::clone(&api)).await;

        let mut rx = driver.notifications.subscribe();
        driver.sync(SyncMode::FullLoad).await.unwrap();

        let mut received = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            received.push(notification);
        }
        assert!(received.contains(&SyncNotification::LoadingFinished {
            mode: SyncMode::FullLoad,
            success: true,
        }));
        assert!(!received.contains(&SyncNotification::InvalidateEventCache));
    }

    #[tokio::test]
    async fn clear_sync_state_resets_ledger_and_marker() {
        let api = Arc::new(MockApi::new(ts(1000)));
        let (_dir, driver) = harness(two_cell_catalog(), Arc::clone(&api)).await;

        driver.sync(SyncMode::FullLoad).await.unwrap();
        assert!(driver
            .is_collection_loaded(CollectionKind::Events)
            .await
            .unwrap());

        driver.clear_sync_state().await.unwrap();
        assert!(!driver
            .is_collection_loaded(CollectionKind::Events)
            .await
            .unwrap());
        assert_eq!(driver.last_synced().await.unwrap(), None);

        // 清空后重新全量，所有键重新拉取
        api.clear_log();
        let report = driver.sync(SyncMode::FullLoad).await.unwrap();
        assert_eq!(report.items_synced, 6);
    }
}
