//! 同步进度台账 - Ledger Key 规范
//!
//! 格式：`sync_loaded:{kind}:{org_unit}:{program}` 与
//! `sync_updated:{kind}:{org_unit}:{program}`
//!
//! 每个键独立写入独立提交，崩溃最多丢失正在写的那一条。时间戳取
//! 服务器时钟而非本地时钟：本地机器时间会在服务器认为的「上次发
//! 送」与客户端认为的「上次接收」之间制造漂移。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::Result;
use crate::storage::kv::KvStore;

const LOADED_PREFIX: &str = "sync_loaded";
const UPDATED_PREFIX: &str = "sync_updated";

/// 单个工作项的台账记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// 仅当该键的抓取 + 调和完整成功过才为 true
    pub loaded: bool,
    /// 最近一次成功时的服务器时钟；从未成功过则缺失
    pub last_updated: Option<DateTime<Utc>>,
}

/// 进度台账
#[derive(Clone)]
pub struct SyncLedger {
    kv: Arc<KvStore>,
}

impl SyncLedger {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    fn loaded_key(item_key: &str) -> String {
        format!("{}:{}", LOADED_PREFIX, item_key)
    }

    fn updated_key(item_key: &str) -> String {
        format!("{}:{}", UPDATED_PREFIX, item_key)
    }

    pub async fn get(&self, item_key: &str) -> Result<LedgerEntry> {
        let loaded = self
            .kv
            .get::<_, bool>(Self::loaded_key(item_key).as_str())
            .await?
            .unwrap_or(false);
        let last_updated = self
            .kv
            .get::<_, DateTime<Utc>>(Self::updated_key(item_key).as_str())
            .await?;
        Ok(LedgerEntry {
            loaded,
            last_updated,
        })
    }

    pub async fn set_loaded(&self, item_key: &str, loaded: bool) -> Result<()> {
        self.kv
            .set(Self::loaded_key(item_key).as_str(), &loaded)
            .await
    }

    /// 记录最近成功时的服务器时钟；`None` 清除记录
    ///
    /// 时间戳一经记录只允许前进。出现回退说明服务器时钟异常或存在
    /// bug，记录警告并保留较新的值。
    pub async fn set_updated(&self, item_key: &str, at: Option<DateTime<Utc>>) -> Result<()> {
        let key = Self::updated_key(item_key);
        match at {
            None => {
                self.kv.delete(key.as_str()).await?;
            }
            Some(new_value) => {
                if let Some(existing) = self.kv.get::<_, DateTime<Utc>>(key.as_str()).await? {
                    if new_value < existing {
                        warn!(
                            "台账时间戳回退被拒绝: key={}, existing={}, new={}",
                            item_key, existing, new_value
                        );
                        return Ok(());
                    }
                }
                self.kv.set(key.as_str(), &new_value).await?;
            }
        }
        Ok(())
    }

    /// 清空给定工作项集合的全部台账记录
    pub async fn clear_all<I>(&self, item_keys: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        for item_key in item_keys {
            self.kv.delete(Self::loaded_key(&item_key).as_str()).await?;
            self.kv.delete(Self::updated_key(&item_key).as_str()).await?;
        }
        Ok(())
    }
}
