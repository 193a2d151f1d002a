//! 调和器 - 把抓取到的集合合并进本地存储
//!
//! 链接与优先级规则：
//! - 受访者先入库（立即拿到本地主键），属性值再按服务器 uid 查出
//!   所属实例的本地主键建立链接
//! - 注册的组织单元以当前工作项为准（服务器响应可能省略），受访者
//!   链接能解析就建，解析不到容忍
//! - 事件走本地优先：本地已有同 uid 记录且带未上传修改时绝不覆盖；
//!   只有本地记录本身来自服务器才允许覆盖，覆盖前带上原本地主键与
//!   注册链接，覆盖后重新链接每个数据值
//!
//! 最后一条是整个系统最重要的正确性规则：朴素覆盖会悄悄丢掉用户
//! 录入但还没上传的数据。

use std::sync::Arc;

use tracing::debug;

use crate::api::TrackedEntityBundle;
use crate::error::Result;
use crate::storage::entities::{Enrollment, Event};
use crate::storage::StorageManager;

use super::work::WorkItem;

/// 调和器
pub struct Reconciler {
    storage: Arc<StorageManager>,
}

impl Reconciler {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    /// 合并受访者捆绑包，返回入库的实例数
    pub async fn apply_tracked_entity_instances(
        &self,
        item: &WorkItem,
        bundle: TrackedEntityBundle,
    ) -> Result<usize> {
        let mut saved = 0usize;

        // 实例必须先落库：属性值链接依赖生成的本地主键
        for mut instance in bundle.instances {
            instance.from_server = true;
            self.storage.save_tracked_entity_instance(&instance).await?;
            saved += 1;
        }

        for mut value in bundle.attribute_values {
            value.local_instance_id = self
                .storage
                .tracked_entity_instance_local_id(&value.tracked_entity_instance_uid)
                .await?;
            self.storage.save_attribute_value(&value).await?;
        }

        debug!(
            "调和受访者完成: key={}, instances={}",
            item.ledger_key(),
            saved
        );
        Ok(saved)
    }

    /// 合并注册列表，返回入库条数
    pub async fn apply_enrollments(
        &self,
        item: &WorkItem,
        enrollments: Vec<Enrollment>,
    ) -> Result<usize> {
        let mut saved = 0usize;

        for mut enrollment in enrollments {
            // 服务器响应可能省略组织单元，以当前工作项为准
            enrollment.org_unit = Some(item.org_unit.clone());
            if let Some(uid) = enrollment.tracked_entity_instance_uid.clone() {
                // 解析不到受访者是容忍的：不是每条注册都必须能链接上
                enrollment.local_instance_id =
                    self.storage.tracked_entity_instance_local_id(&uid).await?;
            }
            enrollment.from_server = true;
            self.storage.save_enrollment(&enrollment).await?;
            saved += 1;
        }

        debug!(
            "调和注册完成: key={}, enrollments={}",
            item.ledger_key(),
            saved
        );
        Ok(saved)
    }

    /// 合并事件列表，返回触达的事件数
    pub async fn apply_events(&self, item: &WorkItem, events: Vec<Event>) -> Result<usize> {
        let mut touched = 0usize;

        for mut event in events {
            touched += 1;
            match self.storage.event_by_uid(&event.uid).await? {
                Some(local) => {
                    // 带上已有的本地主键与注册链接
                    event.local_id = local.local_id;
                    event.local_enrollment_id = local.local_enrollment_id;
                    if local.from_server {
                        event.from_server = true;
                        let data_values = std::mem::take(&mut event.data_values);
                        self.storage.update_event(&event).await?;
                        for mut value in data_values {
                            value.event_uid = event.uid.clone();
                            value.local_event_id = event.local_id;
                            self.storage.save_data_value(&value).await?;
                        }
                    } else {
                        // 本地有未上传的修改，保持原样
                        debug!("事件有本地修改，跳过覆盖: uid={}", event.uid);
                    }
                }
                None => {
                    if let Some(enrollment_uid) = event.enrollment_uid.clone() {
                        if let Some(enrollment) =
                            self.storage.enrollment_by_uid(&enrollment_uid).await?
                        {
                            event.local_enrollment_id = enrollment.local_id;
                        }
                        // 解析不到也可能是注册还没同步，照常入库
                    }
                    // 无注册单事件本来就没有父注册
                    event.from_server = true;
                    let data_values = std::mem::take(&mut event.data_values);
                    let local_id = self.storage.insert_event(&event).await?;
                    for mut value in data_values {
                        value.event_uid = event.uid.clone();
                        value.local_event_id = Some(local_id);
                        self.storage.save_data_value(&value).await?;
                    }
                }
            }
        }

        debug!("调和事件完成: key={}, events={}", item.ledger_key(), touched);
        Ok(touched)
    }
}
