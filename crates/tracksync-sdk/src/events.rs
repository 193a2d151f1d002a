//! 事件系统模块 - 同步通知的广播与订阅
//!
//! 通知是 fire-and-forget：没有订阅者时发送直接丢弃，永远不会让
//! 同步运行失败。

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::sync::SyncMode;

/// 同步通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncNotification {
    /// 进度消息（派发下一个工作项前发出）
    Progress { message: String },
    /// 终态通知：区分首次全量加载与增量更新，携带成败
    LoadingFinished { mode: SyncMode, success: bool },
    /// 增量更新触达过事件时发出，下游事件缓存应失效
    InvalidateEventCache,
}

/// 通知总线
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<SyncNotification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 订阅通知流
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.sender.subscribe()
    }

    /// 发出通知；无订阅者时丢弃
    pub fn emit(&self, notification: SyncNotification) {
        let _ = self.sender.send(notification);
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscribers_does_not_fail() {
        let bus = NotificationBus::default();
        bus.emit(SyncNotification::InvalidateEventCache);
    }

    #[tokio::test]
    async fn subscribers_receive_notifications_in_order() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        bus.emit(SyncNotification::LoadingFinished {
            mode: SyncMode::FullLoad,
            success: true,
        });
        bus.emit(SyncNotification::InvalidateEventCache);

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncNotification::LoadingFinished {
                mode: SyncMode::FullLoad,
                success: true,
            }
        );
        assert_eq!(rx.recv().await.unwrap(), SyncNotification::InvalidateEventCache);
    }
}
