//! Error types for the project service

use crate::counter::CounterError;
use crate::model::{ProjectId, ResourceKind, TenantId};
use crate::quota::QuotaError;
use crate::remote::RemoteError;
use sentinel_common::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Project service error
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource or parent missing
    #[error("{} not found: {id}", .kind.label())]
    NotFound { kind: ResourceKind, id: Uuid },

    /// Acting user does not own the project
    #[error("you don't have permission to {action} this project")]
    Forbidden {
        action: &'static str,
        project_id: ProjectId,
    },

    /// Duplicate domain or repository url
    #[error("{} already exists: {name}", .kind.label())]
    AlreadyExists { kind: ResourceKind, name: String },

    /// Tenant is at its ceiling
    #[error("{} limit reached ({current}/{ceiling}). Upgrade your plan.", .kind.label())]
    LimitExceeded {
        kind: ResourceKind,
        current: i64,
        ceiling: u32,
    },

    /// Limits could not be fetched from the tenant service
    #[error("unable to validate {} limits for tenant {tenant_id}", .kind.label())]
    LimitsUnavailable {
        kind: ResourceKind,
        tenant_id: TenantId,
        #[source]
        source: RemoteError,
    },

    /// Local counters disagree with stored entities
    #[error("invariant violation: {0}")]
    InvariantViolation(CounterError),

    /// Store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub(crate) fn from_quota(kind: ResourceKind, err: QuotaError) -> Self {
        match err {
            QuotaError::LimitExceeded { kind, current, ceiling } => {
                Self::LimitExceeded { kind, current, ceiling }
            }
            QuotaError::LimitsUnavailable { tenant_id, source } => {
                Self::LimitsUnavailable { kind, tenant_id, source }
            }
            QuotaError::Counter(e) => e.into(),
        }
    }

    pub(crate) fn from_store(kind: ResourceKind, id: Uuid, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

impl From<CounterError> for ServiceError {
    fn from(err: CounterError) -> Self {
        match err {
            CounterError::Seed(e) => Self::Store(e),
            underflow => Self::InvariantViolation(underflow),
        }
    }
}

/// Result type for the project service
pub type Result<T> = std::result::Result<T, ServiceError>;
