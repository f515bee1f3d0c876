//! Local cache of tenant quota ceilings
//!
//! Entries never expire. A stale ceiling is preferred over no ceiling so
//! quota checks keep working while the tenant service is down.

use crate::model::{Ceilings, TenantId, TenantLimits};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Result of writing to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Inserted,
    Updated,
    Unchanged,
}

/// Per-tenant limits cache
#[derive(Debug, Default)]
pub struct LimitsCache {
    entries: DashMap<TenantId, TenantLimits>,
}

impl LimitsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached limits for a tenant
    pub fn get(&self, tenant_id: &TenantId) -> Option<TenantLimits> {
        self.entries.get(tenant_id).map(|e| e.value().clone())
    }

    /// Upsert ceilings for a tenant. Last applied write wins; a write with
    /// identical ceilings leaves the entry untouched.
    pub fn put(&self, tenant_id: TenantId, ceilings: Ceilings) -> CacheWrite {
        match self.entries.entry(tenant_id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().ceilings == ceilings {
                    return CacheWrite::Unchanged;
                }
                debug!(%tenant_id, ?ceilings, "Overwriting cached tenant limits");
                occupied.insert(TenantLimits::new(tenant_id, ceilings));
                CacheWrite::Updated
            }
            Entry::Vacant(vacant) => {
                vacant.insert(TenantLimits::new(tenant_id, ceilings));
                CacheWrite::Inserted
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
