//! 数据实体定义 - 对应数据库表结构
//!
//! 同步下来的每条记录都带三样东西：本地主键 `local_id`（SQLite 自增）、
//! 服务器标识 `uid`、来源标记 `from_server`。来源标记决定合并时的覆盖
//! 优先级：只有 `from_server = true` 的本地记录才允许被服务器数据覆盖。

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 服务器系统信息（时钟探针的返回值）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// 服务器当前时间；增量模式下台账时间戳与它比较
    pub server_date: DateTime<Utc>,
}

/// 受访者（tracked entity instance）- 对应 tracked_entity_instance 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntityInstance {
    pub local_id: Option<i64>,
    pub uid: String,
    pub tracked_entity: Option<String>,
    pub org_unit: Option<String>,
    pub from_server: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// 受访者属性值 - 对应 tracked_entity_attribute_value 表
///
/// 保存前通过 uid 查出所属受访者的 local_id 建立本地外键。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntityAttributeValue {
    pub local_id: Option<i64>,
    pub attribute: String,
    pub value: String,
    pub tracked_entity_instance_uid: String,
    pub local_instance_id: Option<i64>,
}

/// 注册（enrollment）- 对应 enrollment 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub local_id: Option<i64>,
    pub uid: String,
    /// 服务器响应可能省略组织单元，保存前由当前工作项补齐
    pub org_unit: Option<String>,
    pub program: Option<String>,
    pub status: Option<String>,
    pub tracked_entity_instance_uid: Option<String>,
    pub local_instance_id: Option<i64>,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub from_server: bool,
}

/// 事件（event）- 对应 event 表
///
/// `data_values` 只在线上响应里内联出现；入库后存在 data_value 表。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub local_id: Option<i64>,
    pub uid: String,
    /// 无注册单事件（SEWoR）没有父注册
    pub enrollment_uid: Option<String>,
    pub local_enrollment_id: Option<i64>,
    pub org_unit: Option<String>,
    pub program: Option<String>,
    pub program_stage: Option<String>,
    pub status: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub from_server: bool,
    pub data_values: Vec<DataValue>,
}

/// 事件数据值 - 对应 data_value 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataValue {
    pub local_id: Option<i64>,
    pub data_element: String,
    pub value: String,
    pub event_uid: String,
    pub local_event_id: Option<i64>,
}

/// 解析服务器时间戳
///
/// 服务器可能返回 RFC 3339（`2015-03-04T11:22:33.123Z`）或固定
/// `yyyy-MM-dd'T'HH:mm:ss.SSSZ` 格式（偏移量无冒号，`+0000`）；
/// 个别接口还会省略偏移量。三种都接受，统一转成 UTC。
pub fn parse_server_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parse_timestamp_accepts_rfc3339() {
        let dt = parse_server_timestamp("2015-03-04T11:22:33.123Z").unwrap();
        assert_eq!(dt.hour(), 11);
    }

    #[test]
    fn parse_timestamp_accepts_colonless_offset() {
        // 服务器端的 yyyy-MM-dd'T'HH:mm:ss.SSSZ 渲染
        let dt = parse_server_timestamp("2015-03-04T11:22:33.123+0000").unwrap();
        assert_eq!(dt, parse_server_timestamp("2015-03-04T11:22:33.123Z").unwrap());
    }

    #[test]
    fn parse_timestamp_accepts_naive() {
        assert!(parse_server_timestamp("2015-03-04T11:22:33.123").is_some());
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_server_timestamp("not a date").is_none());
    }
}
