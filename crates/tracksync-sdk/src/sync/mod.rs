//! 同步模块
//!
//! 职责：
//! - 枚举（组织单元 × 集合类型 × 项目）工作集
//! - 维护按工作项粒度的持久化进度台账
//! - 一次派发一个抓取任务，成功后调和入库并推进台账
//! - 区分首次全量加载与基于服务器时钟的增量更新

pub mod driver;
pub mod ledger;
pub mod reconciler;
pub mod work;

pub use driver::{DriverState, SyncDriver, SyncReport};
pub use ledger::{LedgerEntry, SyncLedger};
pub use reconciler::Reconciler;
pub use work::{enumerate, CollectionKind, SyncFlags, WorkItem};

use serde::{Deserialize, Serialize};

/// 同步模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// 首次全量加载：拉取每个尚未加载的工作项
    FullLoad,
    /// 增量更新：只拉取台账时间戳早于服务器时钟的工作项
    IncrementalUpdate,
}
