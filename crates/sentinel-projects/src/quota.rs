//! Quota Enforcement
//!
//! Decides whether a tenant may create one more resource of a kind. Limits
//! come from the [`LimitsCache`], read through to the tenant service on a
//! miss. The count comes from the [`ResourceCounter`] slot of the parent, which
//! stays locked inside the returned [`Reservation`] until the caller commits
//! or drops it.

use crate::cache::LimitsCache;
use crate::counter::{CounterError, CounterKey, CounterSlot, ResourceCounter};
use crate::model::{ResourceKind, TenantId, TenantLimits};
use crate::remote::{RemoteError, RemoteLimitsClient};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Quota decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied {
        kind: ResourceKind,
        current: i64,
        ceiling: u32,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("{} limit reached ({current}/{ceiling}). Upgrade your plan.", .kind.label())]
    LimitExceeded {
        kind: ResourceKind,
        current: i64,
        ceiling: u32,
    },

    #[error("unable to validate limits for tenant {tenant_id}: {source}")]
    LimitsUnavailable {
        tenant_id: TenantId,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Counter(#[from] CounterError),
}

/// Compare a count against the tenant's ceiling for `kind`
pub fn evaluate(kind: ResourceKind, current: i64, limits: &TenantLimits) -> QuotaDecision {
    let ceiling = limits.ceiling(kind);
    let effective = if current < 0 {
        error!(
            tenant_id = %limits.tenant_id,
            %kind,
            current,
            "Invariant violation: negative resource count, treating as zero"
        );
        0
    } else {
        current
    };

    if effective < i64::from(ceiling) {
        QuotaDecision::Allowed
    } else {
        QuotaDecision::Denied { kind, current, ceiling }
    }
}

/// Permission to create one resource. Holds the parent's counter slot.
#[derive(Debug)]
pub struct Reservation {
    slot: CounterSlot,
    tenant_id: TenantId,
    ceiling: u32,
}

impl Reservation {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.slot.key().kind
    }

    pub fn current(&self) -> i64 {
        self.slot.current()
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Record the created resource. Call only after it is persisted.
    pub fn commit(mut self) -> i64 {
        self.slot.increment()
    }
}

/// Quota guard
pub struct QuotaGuard {
    cache: Arc<LimitsCache>,
    counter: Arc<ResourceCounter>,
    remote: Arc<dyn RemoteLimitsClient>,
    /// Single-flight locks for cache-miss fetches
    fetches: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl QuotaGuard {
    pub fn new(
        cache: Arc<LimitsCache>,
        counter: Arc<ResourceCounter>,
        remote: Arc<dyn RemoteLimitsClient>,
    ) -> Self {
        Self {
            cache,
            counter,
            remote,
            fetches: DashMap::new(),
        }
    }

    /// Cached limits, fetching them once on a miss
    pub async fn resolve_limits(&self, tenant_id: TenantId) -> Result<TenantLimits, QuotaError> {
        if let Some(limits) = self.cache.get(&tenant_id) {
            return Ok(limits);
        }

        let lock = self.fetches.entry(tenant_id).or_default().value().clone();
        let resolved = {
            let _flight = lock.lock().await;
            match self.cache.get(&tenant_id) {
                Some(limits) => Ok(limits),
                None => self.fetch_limits(tenant_id).await,
            }
        };
        drop(lock);
        self.fetches.remove_if(&tenant_id, |_, lock| Arc::strong_count(lock) == 1);
        resolved
    }

    async fn fetch_limits(&self, tenant_id: TenantId) -> Result<TenantLimits, QuotaError> {
        metrics::counter!("sentinel_limits_fetch_total").increment(1);
        match self.remote.fetch(tenant_id).await {
            Ok(ceilings) => {
                self.cache.put(tenant_id, ceilings);
                info!(%tenant_id, ?ceilings, "Cached tenant limits from tenant service");
                Ok(self
                    .cache
                    .get(&tenant_id)
                    .unwrap_or_else(|| TenantLimits::new(tenant_id, ceilings)))
            }
            Err(source) => {
                metrics::counter!("sentinel_limits_fetch_failures_total").increment(1);
                warn!(%tenant_id, error = %source, "Failed to fetch tenant limits");
                Err(QuotaError::LimitsUnavailable { tenant_id, source })
            }
        }
    }

    /// Check the quota for one more `kind` under `parent_id` and, when
    /// allowed, keep the parent's counter locked until the reservation is
    /// committed or dropped.
    pub async fn check_and_reserve(
        &self,
        kind: ResourceKind,
        parent_id: Uuid,
        tenant_id: TenantId,
    ) -> Result<Reservation, QuotaError> {
        let limits = self.resolve_limits(tenant_id).await?;
        let slot = self.counter.lock(CounterKey::new(parent_id, kind)).await?;

        match evaluate(kind, slot.current(), &limits) {
            QuotaDecision::Allowed => {
                metrics::counter!(
                    "sentinel_quota_decisions_total",
                    "kind" => kind.as_str(),
                    "outcome" => "allowed"
                )
                .increment(1);
                Ok(Reservation {
                    slot,
                    tenant_id,
                    ceiling: limits.ceiling(kind),
                })
            }
            QuotaDecision::Denied { kind, current, ceiling } => {
                metrics::counter!(
                    "sentinel_quota_decisions_total",
                    "kind" => kind.as_str(),
                    "outcome" => "denied"
                )
                .increment(1);
                warn!(%tenant_id, %parent_id, %kind, current, ceiling, "Quota exceeded");
                Err(QuotaError::LimitExceeded { kind, current, ceiling })
            }
        }
    }
}
