//! Tenant Service Client
//!
//! REST client for the authoritative tenant-limits service. Fetching limits
//! blocks the caller and fails loudly; usage reporting is fire-and-log.

use crate::model::{Ceilings, ResourceKind, TenantId};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tenant service errors. Every variant means the remote is unavailable.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("tenant service unreachable: {0}")]
    Unreachable(String),

    #[error("tenant service request timed out")]
    Timeout,

    #[error("tenant service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid tenant service response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

/// Direction of a usage report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageDelta {
    Increment,
    Decrement,
}

impl UsageDelta {
    fn path(&self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        }
    }
}

/// Contract with the tenant-limits authority
#[async_trait]
pub trait RemoteLimitsClient: Send + Sync {
    /// Fetch the tenant's current ceilings
    async fn fetch(&self, tenant_id: TenantId) -> Result<Ceilings, RemoteError>;

    /// Report one resource created or removed
    async fn report_delta(
        &self,
        tenant_id: TenantId,
        kind: ResourceKind,
        delta: UsageDelta,
    ) -> Result<(), RemoteError>;
}

#[derive(Debug, Deserialize)]
struct TenantResponse {
    limits: Ceilings,
}

/// HTTP implementation of [`RemoteLimitsClient`]
pub struct HttpTenantClient {
    base_url: String,
    client: Client,
}

impl HttpTenantClient {
    /// Create a client whose requests all share one timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn error_for_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status { status, body })
    }
}

#[async_trait]
impl RemoteLimitsClient for HttpTenantClient {
    async fn fetch(&self, tenant_id: TenantId) -> Result<Ceilings, RemoteError> {
        let url = format!("{}/api/tenants/{}", self.base_url, tenant_id);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let tenant: TenantResponse = Self::error_for_status(response).await?.json().await?;
        Ok(tenant.limits)
    }

    async fn report_delta(
        &self,
        tenant_id: TenantId,
        kind: ResourceKind,
        delta: UsageDelta,
    ) -> Result<(), RemoteError> {
        let url = format!(
            "{}/api/tenants/{}/resources/{}",
            self.base_url,
            tenant_id,
            delta.path()
        );
        debug!("POST {} resource={}", url, kind);

        let response = self
            .client
            .post(&url)
            .query(&[("resource", kind.as_str())])
            .send()
            .await?;
        Self::error_for_status(response).await?;
        Ok(())
    }
}

/// Non-blocking usage reporting. Failures are logged and counted, never returned.
#[derive(Clone)]
pub struct UsageReporter {
    client: Arc<dyn RemoteLimitsClient>,
}

impl UsageReporter {
    pub fn new(client: Arc<dyn RemoteLimitsClient>) -> Self {
        Self { client }
    }

    pub fn report(
        &self,
        tenant_id: TenantId,
        kind: ResourceKind,
        delta: UsageDelta,
    ) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.report_delta(tenant_id, kind, delta).await {
                metrics::counter!(
                    "sentinel_remote_report_failures_total",
                    "kind" => kind.as_str(),
                    "delta" => delta.path()
                )
                .increment(1);
                warn!(
                    %tenant_id,
                    %kind,
                    ?delta,
                    error = %e,
                    "Failed to report resource usage to tenant service"
                );
            }
        })
    }
}
