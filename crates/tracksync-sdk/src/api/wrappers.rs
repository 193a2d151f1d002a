//! 响应解码辅助 - 把 JSON 响应体拆成类型化的集合
//!
//! 解码规则：
//! - 系统信息：单个对象，serverDate 解析失败即转换错误
//! - 受访者：捆绑包，实例与属性值一次拆出；零实例是合法空包
//! - 注册 / 事件：信封对象；命名字段缺失视为「还没有记录」，不是错误

use serde_json::Value;

use crate::error::{Result, TrackSyncError};
use crate::storage::entities::{
    parse_server_timestamp, DataValue, Enrollment, Event, SystemInfo,
    TrackedEntityAttributeValue, TrackedEntityInstance,
};

use super::TrackedEntityBundle;

/// 解码系统信息
pub fn parse_system_info(body: &str) -> Result<SystemInfo> {
    let root: Value = serde_json::from_str(body)?;
    let server_date = root
        .get("serverDate")
        .and_then(|v| v.as_str())
        .and_then(parse_server_timestamp)
        .ok_or_else(|| {
            TrackSyncError::InvalidData("systemInfo 缺少可解析的 serverDate".to_string())
        })?;
    Ok(SystemInfo { server_date })
}

/// 解码受访者捆绑包
///
/// 响应把属性值内联在每个实例下；这里拆成两个平铺列表，属性值带上
/// 所属实例的 uid 供后续链接。
pub fn parse_tracked_entity_bundle(body: &str) -> Result<TrackedEntityBundle> {
    let root: Value = serde_json::from_str(body)?;
    let items = match root.get("trackedEntityInstances") {
        None => return Ok(TrackedEntityBundle::default()),
        Some(v) => v.as_array().ok_or_else(|| {
            TrackSyncError::InvalidData("trackedEntityInstances 不是数组".to_string())
        })?,
    };

    let mut bundle = TrackedEntityBundle::default();
    for item in items {
        let uid = require_str(item, "trackedEntityInstance")?;
        bundle.instances.push(TrackedEntityInstance {
            local_id: None,
            uid: uid.to_string(),
            tracked_entity: opt_str(item, "trackedEntity"),
            org_unit: opt_str(item, "orgUnit"),
            from_server: true,
            last_updated: item
                .get("lastUpdated")
                .and_then(|v| v.as_str())
                .and_then(parse_server_timestamp),
        });

        if let Some(attributes) = item.get("attributes").and_then(|v| v.as_array()) {
            for attr in attributes {
                let attribute = require_str(attr, "attribute")?;
                bundle.attribute_values.push(TrackedEntityAttributeValue {
                    local_id: None,
                    attribute: attribute.to_string(),
                    value: attr
                        .get("value")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    tracked_entity_instance_uid: uid.to_string(),
                    local_instance_id: None,
                });
            }
        }
    }

    Ok(bundle)
}

/// 解码注册列表
pub fn parse_enrollments(body: &str) -> Result<Vec<Enrollment>> {
    let root: Value = serde_json::from_str(body)?;
    let items = match root.get("enrollments") {
        // 该单元可能还没有任何注册
        None => return Ok(Vec::new()),
        Some(v) => v
            .as_array()
            .ok_or_else(|| TrackSyncError::InvalidData("enrollments 不是数组".to_string()))?,
    };

    let mut enrollments = Vec::new();
    for item in items {
        enrollments.push(Enrollment {
            local_id: None,
            uid: require_str(item, "enrollment")?.to_string(),
            org_unit: opt_str(item, "orgUnit"),
            program: opt_str(item, "program"),
            status: opt_str(item, "status"),
            tracked_entity_instance_uid: opt_str(item, "trackedEntityInstance"),
            local_instance_id: None,
            enrollment_date: item
                .get("enrollmentDate")
                .and_then(|v| v.as_str())
                .and_then(parse_server_timestamp),
            from_server: true,
        });
    }
    Ok(enrollments)
}

/// 解码事件列表
pub fn parse_events(body: &str) -> Result<Vec<Event>> {
    let root: Value = serde_json::from_str(body)?;
    let items = match root.get("events") {
        // 该单元可能还没有任何事件
        None => return Ok(Vec::new()),
        Some(v) => v
            .as_array()
            .ok_or_else(|| TrackSyncError::InvalidData("events 不是数组".to_string()))?,
    };

    let mut events = Vec::new();
    for item in items {
        let uid = require_str(item, "event")?.to_string();
        let mut data_values = Vec::new();
        if let Some(values) = item.get("dataValues").and_then(|v| v.as_array()) {
            for value in values {
                data_values.push(DataValue {
                    local_id: None,
                    data_element: require_str(value, "dataElement")?.to_string(),
                    value: value
                        .get("value")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    event_uid: uid.clone(),
                    local_event_id: None,
                });
            }
        }

        events.push(Event {
            local_id: None,
            uid,
            enrollment_uid: opt_str(item, "enrollment"),
            local_enrollment_id: None,
            org_unit: opt_str(item, "orgUnit"),
            program: opt_str(item, "program"),
            program_stage: opt_str(item, "programStage"),
            status: opt_str(item, "status"),
            event_date: item
                .get("eventDate")
                .and_then(|v| v.as_str())
                .and_then(parse_server_timestamp),
            from_server: true,
            data_values,
        });
    }
    Ok(events)
}

fn require_str<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| TrackSyncError::InvalidData(format!("记录缺少 {} 字段", field)))
}

fn opt_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(|v| v.as_str()).map(String::from)
}
