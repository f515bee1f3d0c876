//! Test doubles for the remote tenant service and the event publisher

use crate::events::{EventPublisher, LifecycleEvent, PublishError};
use crate::model::{Ceilings, ResourceKind, TenantId};
use crate::remote::{RemoteError, RemoteLimitsClient, UsageDelta};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) type Report = (TenantId, ResourceKind, UsageDelta);

/// In-memory tenant service
pub(crate) struct MockRemote {
    default: Option<Ceilings>,
    overrides: Mutex<HashMap<TenantId, Ceilings>>,
    delay: Duration,
    fetches: AtomicUsize,
    reports: Mutex<Vec<Report>>,
}

impl MockRemote {
    /// Every tenant gets `ceilings`
    pub fn with_limits(ceilings: Ceilings) -> Self {
        Self {
            default: Some(ceilings),
            overrides: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
        }
    }

    /// Every call times out
    pub fn unavailable() -> Self {
        Self {
            default: None,
            ..Self::with_limits(Ceilings::new(0, 0, 0))
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, tenant_id: TenantId, ceilings: Ceilings) {
        self.overrides.lock().insert(tenant_id, ceilings);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl RemoteLimitsClient for MockRemote {
    async fn fetch(&self, tenant_id: TenantId) -> Result<Ceilings, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let configured = self.overrides.lock().get(&tenant_id).copied();
        configured.or(self.default).ok_or(RemoteError::Timeout)
    }

    async fn report_delta(
        &self,
        tenant_id: TenantId,
        kind: ResourceKind,
        delta: UsageDelta,
    ) -> Result<(), RemoteError> {
        self.reports.lock().push((tenant_id, kind, delta));
        match self.default {
            Some(_) => Ok(()),
            None => Err(RemoteError::Unreachable("connection refused".into())),
        }
    }
}

/// Publisher that keeps every event in memory
#[derive(Default)]
pub(crate) struct CapturePublisher {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl CapturePublisher {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventPublisher for CapturePublisher {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), PublishError> {
        self.events.lock().push(event);
        Ok(())
    }
}
