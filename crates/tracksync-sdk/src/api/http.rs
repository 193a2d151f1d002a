//! HTTP 传输实现 - 基于 reqwest
//!
//! 每个抓取任务对应一次 `GET {server_url}/api/{resource}`，带
//! `Accept: application/json` 与 basic / bearer 凭证。服务器地址或
//! 凭证缺失在构造时立即报前置条件错误，不会发请求。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, TrackSyncError};
use crate::sdk::{Credentials, TrackSyncConfig};
use crate::storage::entities::{Enrollment, Event, SystemInfo};

use super::{wrappers, TrackedEntityBundle, TrackerApi};

/// 基于 reqwest 的追踪服务器客户端
#[derive(Debug)]
pub struct HttpTrackerApi {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpTrackerApi {
    /// 创建新的 HTTP 客户端
    pub fn new(config: &TrackSyncConfig) -> Result<Self> {
        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| TrackSyncError::Precondition("未配置服务器地址".to_string()))?;
        let credentials = config
            .credentials
            .clone()
            .ok_or_else(|| TrackSyncError::Precondition("未配置凭证".to_string()))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder
            .build()
            .map_err(|e| TrackSyncError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/api/{}", self.base_url, resource)
    }

    /// 发出一次 GET 并返回响应体
    async fn get_body(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        request = match &self.credentials {
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Bearer(token) => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(|e| TrackSyncError::Transport {
            url: url.to_string(),
            cause: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TrackSyncError::Transport {
            url: url.to_string(),
            cause: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(TrackSyncError::Transport {
                url: url.to_string(),
                cause: format!("HTTP {}: {}", status, body),
            });
        }

        Ok(body)
    }

    fn conversion(url: String, body: String, cause: TrackSyncError) -> TrackSyncError {
        TrackSyncError::Conversion {
            url,
            body: Some(body),
            cause: cause.to_string(),
        }
    }
}

#[async_trait]
impl TrackerApi for HttpTrackerApi {
    async fn system_info(&self) -> Result<SystemInfo> {
        let url = self.url("system/info");
        let body = self.get_body(&url).await?;
        wrappers::parse_system_info(&body).map_err(|e| Self::conversion(url, body, e))
    }

    async fn tracked_entity_instances(
        &self,
        org_unit: &str,
        program: &str,
    ) -> Result<TrackedEntityBundle> {
        let url = self.url(&format!(
            "trackedEntityInstances.json?ou={}&program={}",
            org_unit, program
        ));
        let body = self.get_body(&url).await?;
        wrappers::parse_tracked_entity_bundle(&body).map_err(|e| Self::conversion(url, body, e))
    }

    async fn enrollments(&self, org_unit: &str, program: &str) -> Result<Vec<Enrollment>> {
        let url = self.url(&format!(
            "enrollments.json?ou={}&program={}",
            org_unit, program
        ));
        let body = self.get_body(&url).await?;
        wrappers::parse_enrollments(&body).map_err(|e| Self::conversion(url, body, e))
    }

    async fn events(
        &self,
        org_unit: &str,
        program: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>> {
        let mut resource = format!("events.json?orgUnit={}&program={}", org_unit, program);
        if let Some(cutoff) = updated_since {
            resource.push_str(&format!("&lastUpdated={}", cutoff.to_rfc3339()));
        }
        let url = self.url(&resource);
        let body = self.get_body(&url).await?;
        wrappers::parse_events(&body).map_err(|e| Self::conversion(url, body, e))
    }
}
