//! Live counts of active children per parent
//!
//! Each (parent, kind) pair owns one async mutex. Holding a [`CounterSlot`]
//! serializes every check, increment and decrement for that parent, so a
//! quota check and the matching increment happen as one atomic unit.
//!
//! A slot is seeded from the [`ResourceStore`] the first time it is locked,
//! so counts survive restarts and pre-populated stores. After that it is only
//! moved by increments and decrements made alongside store writes.

use crate::model::ResourceKind;
use crate::store::ResourceStore;
use dashmap::DashMap;
use sentinel_common::StoreError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error};
use uuid::Uuid;

/// Counter identity: the parent and the kind of child being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// Tenant for projects, project for domains and repositories
    pub parent: Uuid,
    pub kind: ResourceKind,
}

impl CounterKey {
    pub fn new(parent: Uuid, kind: ResourceKind) -> Self {
        Self { parent, kind }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CounterError {
    #[error("{kind} counter for {parent} would go negative (current {current})")]
    Underflow {
        parent: Uuid,
        kind: ResourceKind,
        current: i64,
    },

    #[error("failed to seed counter: {0}")]
    Seed(#[from] StoreError),
}

/// `None` until seeded from the store
type Slot = Arc<Mutex<Option<i64>>>;

/// Per-parent resource counters
pub struct ResourceCounter {
    store: Arc<dyn ResourceStore>,
    slots: DashMap<CounterKey, Slot>,
}

impl ResourceCounter {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, key: CounterKey) -> Slot {
        self.slots.entry(key).or_default().value().clone()
    }

    /// Current count, waiting for any in-flight reservation on the same parent
    pub async fn current(&self, key: CounterKey) -> Result<i64, CounterError> {
        Ok(self.lock(key).await?.current())
    }

    /// Acquire the parent's serialization point
    pub async fn lock(&self, key: CounterKey) -> Result<CounterSlot, CounterError> {
        let mut guard = self.slot(key).lock_owned().await;
        if guard.is_none() {
            let count = self.store.count_active(&key.parent, key.kind).await?;
            debug!(parent = %key.parent, kind = %key.kind, count, "Seeded counter from store");
            *guard = Some(count);
        }
        Ok(CounterSlot { key, guard })
    }

    pub async fn increment(&self, key: CounterKey) -> Result<i64, CounterError> {
        Ok(self.lock(key).await?.increment())
    }

    pub async fn decrement(&self, key: CounterKey) -> Result<i64, CounterError> {
        self.lock(key).await?.decrement()
    }

    /// Drop the idle slots of a parent that can no longer gain children.
    /// A slot still held or awaited is kept.
    pub fn forget(&self, parent: Uuid) {
        for kind in [ResourceKind::Project, ResourceKind::Domain, ResourceKind::Repo] {
            let key = CounterKey::new(parent, kind);
            self.slots.remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
        }
    }
}

/// Exclusive handle on one seeded counter
#[derive(Debug)]
pub struct CounterSlot {
    key: CounterKey,
    guard: OwnedMutexGuard<Option<i64>>,
}

impl CounterSlot {
    pub fn key(&self) -> CounterKey {
        self.key
    }

    pub fn current(&self) -> i64 {
        (*self.guard).unwrap_or_default()
    }

    pub fn increment(&mut self) -> i64 {
        let next = self.current() + 1;
        *self.guard = Some(next);
        next
    }

    /// Decrement, refusing to go below zero
    pub fn decrement(&mut self) -> Result<i64, CounterError> {
        let current = self.current();
        if current <= 0 {
            error!(
                parent = %self.key.parent,
                kind = %self.key.kind,
                current,
                "Invariant violation: counter decrement below zero"
            );
            return Err(CounterError::Underflow {
                parent: self.key.parent,
                kind: self.key.kind,
                current,
            });
        }
        *self.guard = Some(current - 1);
        Ok(current - 1)
    }
}
