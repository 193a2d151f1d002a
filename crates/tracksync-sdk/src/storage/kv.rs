//! KV 存储模块 - 基于 sled 的键值存储
//!
//! 本模块提供：
//! - 同步台账与偏好设置的持久化
//! - JSON 序列化的值编码
//! - 前缀扫描与前缀删除
//!
//! 每次写入都是独立提交，不跨 key 批量；崩溃最多丢失正在写入的那一条。

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, TrackSyncError};

/// KV 存储组件
#[derive(Debug)]
pub struct KvStore {
    #[allow(dead_code)]
    base_path: PathBuf,
    db: sled::Db,
}

impl KvStore {
    /// 创建新的 KV 存储实例
    pub async fn new(base_path: &Path) -> Result<Self> {
        let base_path = base_path.to_path_buf();
        let kv_path = base_path.join("kv");

        // 创建 KV 存储目录
        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| TrackSyncError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 打开 sled 数据库（旧实例可能刚释放锁，重试多次带退避）
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut db_opt: Option<sled::Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = format!("{}", e);
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            TrackSyncError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        Ok(Self { base_path, db })
    }

    /// 设置键值对
    pub async fn set<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize,
    {
        let value_bytes = serde_json::to_vec(value)
            .map_err(|e| TrackSyncError::Serialization(format!("序列化值失败: {}", e)))?;

        self.db
            .insert(key, value_bytes)
            .map_err(|e| TrackSyncError::KvStore(format!("设置键值对失败: {}", e)))?;

        Ok(())
    }

    /// 获取键值对
    pub async fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: for<'de> Deserialize<'de>,
    {
        let result = self
            .db
            .get(key)
            .map_err(|e| TrackSyncError::KvStore(format!("获取键值对失败: {}", e)))?;

        match result {
            Some(value_bytes) => {
                let value = serde_json::from_slice(&value_bytes)
                    .map_err(|e| TrackSyncError::Serialization(format!("反序列化值失败: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 删除键值对
    pub async fn delete<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        let result = self
            .db
            .remove(key)
            .map_err(|e| TrackSyncError::KvStore(format!("删除键值对失败: {}", e)))?;

        Ok(result.map(|v| v.to_vec()))
    }

    /// 检查键是否存在
    pub async fn exists<K>(&self, key: K) -> Result<bool>
    where
        K: AsRef<[u8]>,
    {
        let result = self
            .db
            .contains_key(key)
            .map_err(|e| TrackSyncError::KvStore(format!("检查键存在失败: {}", e)))?;

        Ok(result)
    }

    /// 获取指定前缀的所有键值对
    pub async fn scan_prefix<V>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: for<'de> Deserialize<'de>,
    {
        let mut results = Vec::new();

        for result in self.db.scan_prefix(prefix) {
            let (key, value_bytes) = result
                .map_err(|e| TrackSyncError::KvStore(format!("扫描前缀失败: {}", e)))?;

            let value = serde_json::from_slice(&value_bytes)
                .map_err(|e| TrackSyncError::Serialization(format!("反序列化值失败: {}", e)))?;

            results.push((key.to_vec(), value));
        }

        Ok(results)
    }

    /// 删除指定前缀的所有键值对，返回删除条数
    pub async fn remove_prefix(&self, prefix: &[u8]) -> Result<u64> {
        let mut keys_to_remove = Vec::new();

        for result in self.db.scan_prefix(prefix) {
            let (key, _) = result
                .map_err(|e| TrackSyncError::KvStore(format!("扫描前缀失败: {}", e)))?;
            keys_to_remove.push(key.to_vec());
        }

        let mut removed = 0u64;
        for key in keys_to_remove {
            self.db
                .remove(&key)
                .map_err(|e| TrackSyncError::KvStore(format!("删除键失败: {}", e)))?;
            removed += 1;
        }

        Ok(removed)
    }

    /// 将缓冲写入刷到磁盘
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| TrackSyncError::KvStore(format!("刷盘失败: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_kv_store_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let store = KvStore::new(temp_dir.path()).await.unwrap();

        // 设置和获取
        let test_data = json!({
            "name": "test",
            "value": 123
        });

        store.set("test_key", &test_data).await.unwrap();
        let retrieved: serde_json::Value = store.get("test_key").await.unwrap().unwrap();
        assert_eq!(retrieved, test_data);

        // 检查存在性
        assert!(store.exists("test_key").await.unwrap());
        assert!(!store.exists("non_existent_key").await.unwrap());

        // 删除
        store.delete("test_key").await.unwrap();
        let deleted: Option<serde_json::Value> = store.get("test_key").await.unwrap();
        assert!(deleted.is_none());
    }

    #[tokio::test]
    async fn test_kv_store_prefix_scan_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = KvStore::new(temp_dir.path()).await.unwrap();

        for i in 1..=3 {
            let key = format!("sync_loaded:item{}", i);
            store.set(key.as_str(), &true).await.unwrap();
        }
        store.set("other:item", &true).await.unwrap();

        let results: Vec<(Vec<u8>, bool)> = store.scan_prefix(b"sync_loaded:").await.unwrap();
        assert_eq!(results.len(), 3);

        let removed = store.remove_prefix(b"sync_loaded:").await.unwrap();
        assert_eq!(removed, 3);
        assert!(store.exists("other:item").await.unwrap());
        assert!(!store.exists("sync_loaded:item1").await.unwrap());
    }
}
