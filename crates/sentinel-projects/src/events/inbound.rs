//! Inbound event handling
//!
//! Applies limit upgrades to the [`LimitsCache`] and verification outcomes to
//! domains. Handlers are idempotent. Failures are returned so the delivery is
//! rejected and dead-lettered instead of silently dropped.

use super::routing;
use super::transport::{Ack, Delivery};
use crate::cache::{CacheWrite, LimitsCache};
use crate::model::{Ceilings, DomainId, TenantId, VerificationTransition};
use crate::store::ResourceStore;
use sentinel_common::StoreError;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// `tenant.plan.upgraded` body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPlanUpgraded {
    pub tenant_id: TenantId,
    pub new_limits: Ceilings,
}

/// `domain.verified` body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainVerified {
    pub domain_id: DomainId,
    pub verified: bool,
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    PlanUpgraded(TenantPlanUpgraded),
    DomainVerified(DomainVerified),
    /// One of our own lifecycle events echoed back by the broker
    Lifecycle(&'static str),
}

impl InboundEvent {
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Self, EventError> {
        let malformed = |e: serde_json::Error| EventError::Malformed {
            routing_key: routing_key.to_string(),
            reason: e.to_string(),
        };

        match routing_key {
            routing::TENANT_PLAN_UPGRADED => {
                serde_json::from_slice(body).map(Self::PlanUpgraded).map_err(malformed)
            }
            routing::DOMAIN_VERIFIED => {
                serde_json::from_slice(body).map(Self::DomainVerified).map_err(malformed)
            }
            other => routing::LIFECYCLE
                .iter()
                .find(|key| **key == other)
                .map(|key| Self::Lifecycle(*key))
                .ok_or_else(|| EventError::UnknownRoutingKey(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed {routing_key} event: {reason}")]
    Malformed { routing_key: String, reason: String },

    #[error("no handler for routing key {0}")]
    UnknownRoutingKey(String),

    #[error("domain not found: {0}")]
    DomainNotFound(DomainId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// What applying an event changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Limits(CacheWrite),
    Verification(VerificationTransition),
    Ignored,
}

/// Event synchronizer
pub struct EventSynchronizer {
    cache: Arc<LimitsCache>,
    store: Arc<dyn ResourceStore>,
}

impl EventSynchronizer {
    pub fn new(cache: Arc<LimitsCache>, store: Arc<dyn ResourceStore>) -> Self {
        Self { cache, store }
    }

    /// Decode and apply one message
    pub async fn handle(&self, routing_key: &str, body: &[u8]) -> Result<EventOutcome, EventError> {
        match InboundEvent::decode(routing_key, body)? {
            InboundEvent::PlanUpgraded(event) => {
                Ok(EventOutcome::Limits(self.apply_plan_upgrade(&event)))
            }
            InboundEvent::DomainVerified(event) => self
                .apply_domain_verified(&event)
                .await
                .map(EventOutcome::Verification),
            InboundEvent::Lifecycle(key) => {
                debug!(routing_key = key, "Ignoring own lifecycle event");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// Upsert the tenant's ceilings. Replays leave the cache unchanged.
    pub fn apply_plan_upgrade(&self, event: &TenantPlanUpgraded) -> CacheWrite {
        let write = self.cache.put(event.tenant_id, event.new_limits);
        match write {
            CacheWrite::Unchanged => {
                debug!(tenant_id = %event.tenant_id, "Tenant limits already current")
            }
            _ => info!(
                tenant_id = %event.tenant_id,
                limits = ?event.new_limits,
                "Tenant limits cache updated"
            ),
        }
        write
    }

    /// Move a domain out of PENDING. The latest outcome wins.
    pub async fn apply_domain_verified(
        &self,
        event: &DomainVerified,
    ) -> Result<VerificationTransition, EventError> {
        let mut domain = self.store.get_domain(&event.domain_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EventError::DomainNotFound(event.domain_id),
            other => EventError::Store(other),
        })?;

        let transition = domain.apply_verification(event.verified);
        match transition {
            VerificationTransition::Unchanged => {
                debug!(domain_id = %domain.id, "Duplicate verification outcome");
                return Ok(transition);
            }
            VerificationTransition::Applied(status) if event.verified => {
                info!(domain_id = %domain.id, ?status, "Domain verified");
            }
            VerificationTransition::Applied(status) => {
                warn!(domain_id = %domain.id, ?status, "Domain verification failed");
            }
            VerificationTransition::Conflict { previous, current } => {
                metrics::counter!("sentinel_verification_conflicts_total").increment(1);
                warn!(
                    domain_id = %domain.id,
                    ?previous,
                    ?current,
                    "Conflicting verification outcome, applying latest"
                );
            }
        }

        self.store.save_domain(&domain).await?;
        Ok(transition)
    }

    /// Consume deliveries until the channel closes. Each delivery is settled
    /// only after its effects are committed.
    pub async fn run(self: Arc<Self>, mut deliveries: mpsc::Receiver<Delivery>) {
        info!("Event synchronizer started");
        while let Some(delivery) = deliveries.recv().await {
            let routing_key = delivery.routing_key.clone();
            match self.handle(&routing_key, &delivery.body).await {
                Ok(outcome) => {
                    metrics::counter!("sentinel_events_total", "outcome" => "applied").increment(1);
                    debug!(%routing_key, ?outcome, "Event applied");
                    delivery.settle(Ack::Ack);
                }
                Err(e) => {
                    metrics::counter!("sentinel_events_total", "outcome" => "rejected")
                        .increment(1);
                    error!(%routing_key, error = %e, "Failed to handle event");
                    delivery.settle(Ack::Reject { reason: e.to_string() });
                }
            }
        }
        info!("Event synchronizer stopped");
    }
}
