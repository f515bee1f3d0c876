//! Component wiring
//!
//! Builds the shared cache and counters, the guard, the service and the
//! event synchronizer, and starts the inbound consumer task. The broker
//! adapter feeds [`Runtime::inbound`] and drains the outbound receiver.

use crate::cache::LimitsCache;
use crate::config::ServiceConfig;
use crate::counter::ResourceCounter;
use crate::events::{ChannelPublisher, Delivery, EventSynchronizer, OutboundMessage};
use crate::quota::QuotaGuard;
use crate::remote::{HttpTenantClient, RemoteError, RemoteLimitsClient, UsageReporter};
use crate::service::ResourceService;
use crate::store::{InMemoryResourceStore, ResourceStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Running service
pub struct Runtime {
    pub service: Arc<ResourceService>,
    pub cache: Arc<LimitsCache>,
    /// Deliveries from the broker
    pub inbound: mpsc::Sender<Delivery>,
    outbound: Option<mpsc::Receiver<OutboundMessage>>,
    consumer: JoinHandle<()>,
}

impl Runtime {
    /// Start with the HTTP tenant client and the in-memory store
    pub fn start(config: &ServiceConfig) -> Result<Self, RemoteError> {
        let tenant_service = &config.tenant_service;
        let remote = HttpTenantClient::new(&tenant_service.base_url, tenant_service.timeout())?;
        info!(
            tenant_service = %config.tenant_service.base_url,
            timeout_ms = config.tenant_service.timeout_ms,
            "Using tenant service"
        );
        Ok(Self::with_components(
            config,
            Arc::new(InMemoryResourceStore::new()),
            Arc::new(remote),
        ))
    }

    pub fn with_components(
        config: &ServiceConfig,
        store: Arc<dyn ResourceStore>,
        remote: Arc<dyn RemoteLimitsClient>,
    ) -> Self {
        let capacity = config.events.channel_capacity.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);

        let cache = Arc::new(LimitsCache::new());
        let counter = Arc::new(ResourceCounter::new(store.clone()));
        let guard = Arc::new(QuotaGuard::new(cache.clone(), counter.clone(), remote.clone()));
        let publisher = Arc::new(ChannelPublisher::new(&config.events.exchange, outbound_tx));

        let service = Arc::new(ResourceService::new(
            store.clone(),
            counter,
            guard,
            UsageReporter::new(remote),
            publisher,
        ));
        let synchronizer = Arc::new(EventSynchronizer::new(cache.clone(), store));
        let consumer = tokio::spawn(synchronizer.run(inbound_rx));

        Self {
            service,
            cache,
            inbound: inbound_tx,
            outbound: Some(outbound_rx),
            consumer,
        }
    }

    /// Outbound messages for the broker adapter. Returns `None` once taken.
    pub fn take_outbound(&mut self) -> Option<mpsc::Receiver<OutboundMessage>> {
        self.outbound.take()
    }

    /// Close the inbound channel and wait for the consumer to drain it
    pub async fn shutdown(self) {
        drop(self.inbound);
        if let Err(e) = self.consumer.await {
            warn!(error = %e, "Event consumer ended abnormally");
        }
        info!("Runtime stopped");
    }
}
