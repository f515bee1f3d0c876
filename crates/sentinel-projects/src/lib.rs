//! Sentinel Projects - Quota enforcement and cross-service sync
//!
//! Owns projects, domains and repositories for every tenant, and enforces
//! the tenant's plan ceilings on their creation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        PROJECT SERVICE                           │
//! │                                                                  │
//! │   create / delete ──► ResourceService ──► ResourceStore          │
//! │                            │                                     │
//! │                       QuotaGuard ──► LimitsCache ◄── upgrades    │
//! │                            │   └───► RemoteLimitsClient (miss)   │
//! │                     ResourceCounter                              │
//! │                                                                  │
//! │   broker ──► EventSynchronizer ──► LimitsCache / domains         │
//! │   ResourceService ──► EventPublisher ──► broker                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tenant service is authoritative for ceilings. This service is
//! authoritative for live counts. A creation is admitted only while the
//! parent's count is strictly below its ceiling, and the check, the insert
//! and the increment happen under the parent's counter lock.

#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod counter;
pub mod error;
pub mod events;
pub mod model;
pub mod quota;
pub mod remote;
pub mod runtime;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheWrite, LimitsCache};
pub use config::{ConfigError, ServiceConfig};
pub use counter::{CounterError, CounterKey, ResourceCounter};
pub use error::{Result, ServiceError};
pub use events::{EventOutcome, EventPublisher, EventSynchronizer, LifecycleEvent};
pub use model::{Ceilings, Domain, Project, Repository, ResourceKind, TenantLimits};
pub use quota::{QuotaDecision, QuotaError, QuotaGuard, Reservation};
pub use remote::{HttpTenantClient, RemoteError, RemoteLimitsClient, UsageDelta, UsageReporter};
pub use runtime::Runtime;
pub use service::{
    NewDomain, NewProject, NewRepository, NewResource, ProjectUpdate, ProjectView, ResourceService,
};
pub use store::{InMemoryResourceStore, ResourceStore};
