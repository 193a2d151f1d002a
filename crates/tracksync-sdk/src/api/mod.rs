//! 远端接口模块 - 抓取任务的传输与解码
//!
//! 每个抓取任务对应 trait 上的一个方法：恰好发出一个请求，解码成
//! 类型化的集合或带上下文的错误。驱动器把任务派发到独立的 tokio
//! task 上执行，自己挂起等完成通知。

pub mod http;
pub mod wrappers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::entities::{
    Enrollment, Event, SystemInfo, TrackedEntityAttributeValue, TrackedEntityInstance,
};

pub use http::HttpTrackerApi;

/// 受访者响应是捆绑包：实例与属性值一起返回，解码时拆开
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackedEntityBundle {
    pub instances: Vec<TrackedEntityInstance>,
    pub attribute_values: Vec<TrackedEntityAttributeValue>,
}

/// 远端追踪服务器接口
///
/// 实现约定：
/// - 每个方法恰好发出一个出站请求
/// - 零条记录是合法的空结果，不是错误
/// - 失败携带请求 URL、原始响应体（若有）与底层原因
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// 时钟探针：获取服务器系统信息
    async fn system_info(&self) -> Result<SystemInfo>;

    /// 拉取一个（组织单元 × 项目）单元的受访者捆绑包
    async fn tracked_entity_instances(
        &self,
        org_unit: &str,
        program: &str,
    ) -> Result<TrackedEntityBundle>;

    /// 拉取一个单元的注册；响应缺少 enrollments 字段视为空集合
    async fn enrollments(&self, org_unit: &str, program: &str) -> Result<Vec<Enrollment>>;

    /// 拉取一个单元的事件；增量模式传入上次记录的截止时间
    async fn events(
        &self,
        org_unit: &str,
        program: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>>;
}
