//! 存储模块 - SQLite 实体存储 + sled KV 存储
//!
//! `StorageManager` 持有两样东西：
//! - 实体库（rusqlite）：受访者、注册、事件及其子记录
//! - KV 库（sled）：同步台账、开关、全局标记
//!
//! 实体写入直接提交并立即返回生成的本地主键，受访者 → 属性值这类
//! 依赖生成主键的链接顺序由此天然成立。

pub mod dao;
pub mod entities;
pub mod kv;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, TrackSyncError};
use dao::{
    DataValueDao, EnrollmentDao, EventDao, TrackedEntityAttributeValueDao,
    TrackedEntityInstanceDao,
};
use entities::{DataValue, Enrollment, Event, TrackedEntityAttributeValue, TrackedEntityInstance};
use kv::KvStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracked_entity_instance (
    local_id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE,
    tracked_entity TEXT,
    org_unit TEXT,
    from_server INTEGER NOT NULL DEFAULT 1,
    last_updated TEXT
);
CREATE TABLE IF NOT EXISTS tracked_entity_attribute_value (
    local_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute TEXT NOT NULL,
    value TEXT NOT NULL,
    tracked_entity_instance_uid TEXT NOT NULL,
    local_instance_id INTEGER,
    UNIQUE (attribute, tracked_entity_instance_uid)
);
CREATE TABLE IF NOT EXISTS enrollment (
    local_id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE,
    org_unit TEXT,
    program TEXT,
    status TEXT,
    tracked_entity_instance_uid TEXT,
    local_instance_id INTEGER,
    enrollment_date TEXT,
    from_server INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS event (
    local_id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE,
    enrollment_uid TEXT,
    local_enrollment_id INTEGER,
    org_unit TEXT,
    program TEXT,
    program_stage TEXT,
    status TEXT,
    event_date TEXT,
    from_server INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS data_value (
    local_id INTEGER PRIMARY KEY AUTOINCREMENT,
    data_element TEXT NOT NULL,
    value TEXT NOT NULL,
    event_uid TEXT NOT NULL,
    local_event_id INTEGER,
    UNIQUE (data_element, event_uid)
);
CREATE INDEX IF NOT EXISTS idx_attribute_value_instance
    ON tracked_entity_attribute_value (tracked_entity_instance_uid);
CREATE INDEX IF NOT EXISTS idx_data_value_event ON data_value (event_uid);
";

/// 存储管理器
pub struct StorageManager {
    #[allow(dead_code)]
    base_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    kv: Arc<KvStore>,
}

impl StorageManager {
    /// 创建新的存储管理器
    ///
    /// # 参数
    /// - `base_path`: 数据存储的基础路径；实体库在 `tracker.db`，KV 在 `kv/`
    pub async fn new(base_path: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base_path)
            .await
            .map_err(|e| TrackSyncError::IO(format!("创建存储目录失败: {}", e)))?;

        let kv = Arc::new(KvStore::new(base_path).await?);

        let db_path = base_path.join("tracker.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| TrackSyncError::Database(format!("打开数据库失败: {}", e)))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| TrackSyncError::Database(format!("设置 journal_mode 失败: {}", e)))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| TrackSyncError::Database(format!("设置 foreign_keys 失败: {}", e)))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| TrackSyncError::Database(format!("初始化表结构失败: {}", e)))?;

        info!("存储初始化完成: {}", db_path.display());

        Ok(Self {
            base_path: base_path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
            kv,
        })
    }

    /// KV 存储句柄
    pub fn kv(&self) -> Arc<KvStore> {
        Arc::clone(&self.kv)
    }

    // ============================================================
    // 受访者
    // ============================================================

    /// 保存受访者（按 uid 覆盖），返回本地主键
    pub async fn save_tracked_entity_instance(
        &self,
        instance: &TrackedEntityInstance,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        TrackedEntityInstanceDao::new(&conn).upsert(instance)
    }

    /// 按服务器 uid 查受访者本地主键
    pub async fn tracked_entity_instance_local_id(&self, uid: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        TrackedEntityInstanceDao::new(&conn).local_id_by_uid(uid)
    }

    pub async fn tracked_entity_instance_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<TrackedEntityInstance>> {
        let conn = self.conn.lock();
        TrackedEntityInstanceDao::new(&conn).get_by_uid(uid)
    }

    /// 保存受访者属性值（按 (attribute, 受访者) 覆盖）
    pub async fn save_attribute_value(&self, value: &TrackedEntityAttributeValue) -> Result<i64> {
        let conn = self.conn.lock();
        TrackedEntityAttributeValueDao::new(&conn).upsert(value)
    }

    pub async fn attribute_values_for_instance(
        &self,
        uid: &str,
    ) -> Result<Vec<TrackedEntityAttributeValue>> {
        let conn = self.conn.lock();
        TrackedEntityAttributeValueDao::new(&conn).list_for_instance(uid)
    }

    // ============================================================
    // 注册
    // ============================================================

    /// 保存注册（按 uid 覆盖），返回本地主键
    pub async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<i64> {
        let conn = self.conn.lock();
        EnrollmentDao::new(&conn).upsert(enrollment)
    }

    pub async fn enrollment_by_uid(&self, uid: &str) -> Result<Option<Enrollment>> {
        let conn = self.conn.lock();
        EnrollmentDao::new(&conn).get_by_uid(uid)
    }

    // ============================================================
    // 事件
    // ============================================================

    /// 插入新事件，返回本地主键
    pub async fn insert_event(&self, event: &Event) -> Result<i64> {
        let conn = self.conn.lock();
        EventDao::new(&conn).insert(event)
    }

    /// 按本地主键覆盖事件
    pub async fn update_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn.lock();
        EventDao::new(&conn).update(event)
    }

    pub async fn event_by_uid(&self, uid: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock();
        EventDao::new(&conn).get_by_uid(uid)
    }

    /// 保存事件数据值（按 (data_element, 事件) 覆盖）
    pub async fn save_data_value(&self, value: &DataValue) -> Result<i64> {
        let conn = self.conn.lock();
        DataValueDao::new(&conn).upsert(value)
    }

    pub async fn data_values_for_event(&self, event_uid: &str) -> Result<Vec<DataValue>> {
        let conn = self.conn.lock();
        DataValueDao::new(&conn).list_for_event(event_uid)
    }

    /// 关闭前刷盘
    pub async fn shutdown(&self) -> Result<()> {
        self.kv.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn instance(uid: &str) -> TrackedEntityInstance {
        TrackedEntityInstance {
            local_id: None,
            uid: uid.to_string(),
            tracked_entity: Some("person".to_string()),
            org_unit: Some("OU1".to_string()),
            from_server: true,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn save_returns_local_id_and_upsert_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path()).await.unwrap();

        let first = storage
            .save_tracked_entity_instance(&instance("tei-1"))
            .await
            .unwrap();
        let second = storage
            .save_tracked_entity_instance(&instance("tei-1"))
            .await
            .unwrap();
        // 同一 uid 再保存拿到同一个本地主键
        assert_eq!(first, second);

        let other = storage
            .save_tracked_entity_instance(&instance("tei-2"))
            .await
            .unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn attribute_value_links_by_local_id() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path()).await.unwrap();

        let local_id = storage
            .save_tracked_entity_instance(&instance("tei-1"))
            .await
            .unwrap();

        let value = TrackedEntityAttributeValue {
            local_id: None,
            attribute: "firstName".to_string(),
            value: "Ada".to_string(),
            tracked_entity_instance_uid: "tei-1".to_string(),
            local_instance_id: Some(local_id),
        };
        storage.save_attribute_value(&value).await.unwrap();

        let stored = storage
            .attribute_values_for_instance("tei-1")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].local_instance_id, Some(local_id));

        // 同一 (attribute, 受访者) 再保存是覆盖不是追加
        let mut updated = value.clone();
        updated.value = "Grace".to_string();
        storage.save_attribute_value(&updated).await.unwrap();
        let stored = storage
            .attribute_values_for_instance("tei-1")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, "Grace");
    }

    #[tokio::test]
    async fn event_roundtrip_preserves_provenance_flag() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path()).await.unwrap();

        let event = Event {
            local_id: None,
            uid: "ev-1".to_string(),
            enrollment_uid: None,
            local_enrollment_id: None,
            org_unit: Some("OU1".to_string()),
            program: Some("P1".to_string()),
            program_stage: None,
            status: Some("ACTIVE".to_string()),
            event_date: None,
            from_server: false,
            data_values: Vec::new(),
        };
        storage.insert_event(&event).await.unwrap();

        let stored = storage.event_by_uid("ev-1").await.unwrap().unwrap();
        assert!(!stored.from_server);
        assert_eq!(stored.status.as_deref(), Some("ACTIVE"));
    }
}
