//! Cross-service events
//!
//! ```text
//!   tenant-service ──tenant.plan.upgraded──┐
//!   verification   ──domain.verified───────┤
//!                                          ▼
//!                               ┌─────────────────────┐
//!                               │  EventSynchronizer  │──► LimitsCache / domains
//!                               └─────────────────────┘
//!   ResourceService ──► EventPublisher ──► project.created | project.deleted
//!                                          domain.added    | repository.added
//! ```
//!
//! Delivery is at-least-once in both directions. Inbound handlers commit
//! local state before the delivery is acknowledged.

pub mod inbound;
pub mod outbound;
pub mod transport;

pub use inbound::{
    DomainVerified, EventError, EventOutcome, EventSynchronizer, InboundEvent, TenantPlanUpgraded,
};
pub use outbound::{
    ChannelPublisher, DomainAdded, EventPublisher, LifecycleEvent, ProjectCreated, ProjectDeleted,
    PublishError, RepositoryAdded,
};
pub use transport::{Ack, Delivery, OutboundMessage};

/// Routing keys
pub mod routing {
    pub const TENANT_PLAN_UPGRADED: &str = "tenant.plan.upgraded";
    pub const DOMAIN_VERIFIED: &str = "domain.verified";
    pub const PROJECT_CREATED: &str = "project.created";
    pub const PROJECT_DELETED: &str = "project.deleted";
    pub const DOMAIN_ADDED: &str = "domain.added";
    pub const REPOSITORY_ADDED: &str = "repository.added";

    /// Keys this service produces itself
    pub const LIFECYCLE: [&str; 4] =
        [PROJECT_CREATED, PROJECT_DELETED, DOMAIN_ADDED, REPOSITORY_ADDED];
}
