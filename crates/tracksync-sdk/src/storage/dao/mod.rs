//! 数据访问层 - 每张表一个 DAO，借用同一个连接
//!
//! DAO 不拥有连接；`StorageManager` 持锁后把 `&Connection` 借给它们。
//! 插入统一返回 `last_insert_rowid`，后续链接步骤靠它拿到本地主键。

pub mod enrollment;
pub mod event;
pub mod tracked_entity_instance;

pub use enrollment::EnrollmentDao;
pub use event::{DataValueDao, EventDao};
pub use tracked_entity_instance::{TrackedEntityAttributeValueDao, TrackedEntityInstanceDao};

use chrono::{DateTime, Utc};

/// 时间列统一存 RFC 3339 文本
pub(crate) fn dt_to_text(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|v| v.to_rfc3339())
}

pub(crate) fn text_to_dt(text: Option<String>) -> Option<DateTime<Utc>> {
    text.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
