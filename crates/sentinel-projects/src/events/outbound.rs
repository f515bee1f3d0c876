//! Resource lifecycle events produced by this service

use super::routing;
use super::transport::OutboundMessage;
use crate::model::{Domain, Project, ProjectId, Repository, TenantId, VerificationMethod};
use async_trait::async_trait;
use sentinel_common::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Project was created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreated {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub owner_id: Uuid,
    pub name: String,
}

impl ProjectCreated {
    pub fn new(project: &Project) -> Self {
        Self {
            metadata: EventMetadata::new(project.id, "Project"),
            project_id: project.id,
            tenant_id: project.tenant_id,
            owner_id: project.owner_id,
            name: project.name.clone(),
        }
    }
}

impl DomainEvent for ProjectCreated {
    fn event_type(&self) -> &'static str {
        routing::PROJECT_CREATED
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Project was soft-deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDeleted {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
}

impl ProjectDeleted {
    pub fn new(project: &Project) -> Self {
        Self {
            metadata: EventMetadata::new(project.id, "Project"),
            project_id: project.id,
            tenant_id: project.tenant_id,
        }
    }
}

impl DomainEvent for ProjectDeleted {
    fn event_type(&self) -> &'static str {
        routing::PROJECT_DELETED
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Domain was added and awaits verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainAdded {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub domain_id: Uuid,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub domain_url: String,
    pub verification_method: VerificationMethod,
    pub verification_token: String,
}

impl DomainAdded {
    pub fn new(domain: &Domain, tenant_id: TenantId) -> Self {
        Self {
            metadata: EventMetadata::new(domain.id, "Domain"),
            domain_id: domain.id,
            project_id: domain.project_id,
            tenant_id,
            domain_url: domain.domain_url.clone(),
            verification_method: domain.verification_method,
            verification_token: domain.verification_token().to_string(),
        }
    }
}

impl DomainEvent for DomainAdded {
    fn event_type(&self) -> &'static str {
        routing::DOMAIN_ADDED
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Repository was added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryAdded {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub repository_id: Uuid,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub url: String,
}

impl RepositoryAdded {
    pub fn new(repository: &Repository, tenant_id: TenantId) -> Self {
        Self {
            metadata: EventMetadata::new(repository.id, "Repository"),
            repository_id: repository.id,
            project_id: repository.project_id,
            tenant_id,
            name: repository.name.clone(),
            url: repository.url.clone(),
        }
    }
}

impl DomainEvent for RepositoryAdded {
    fn event_type(&self) -> &'static str {
        routing::REPOSITORY_ADDED
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

/// Any lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    ProjectCreated(ProjectCreated),
    ProjectDeleted(ProjectDeleted),
    DomainAdded(DomainAdded),
    RepositoryAdded(RepositoryAdded),
}

impl LifecycleEvent {
    fn inner(&self) -> &dyn DomainEvent {
        match self {
            Self::ProjectCreated(e) => e,
            Self::ProjectDeleted(e) => e,
            Self::DomainAdded(e) => e,
            Self::RepositoryAdded(e) => e,
        }
    }

    pub fn routing_key(&self) -> &'static str {
        self.inner().event_type()
    }

    pub fn metadata(&self) -> &EventMetadata {
        self.inner().metadata()
    }

    /// JSON body of the event
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::ProjectCreated(e) => serde_json::to_vec(e),
            Self::ProjectDeleted(e) => serde_json::to_vec(e),
            Self::DomainAdded(e) => serde_json::to_vec(e),
            Self::RepositoryAdded(e) => serde_json::to_vec(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("outbound channel closed")]
    Closed,
}

/// Producer side of the lifecycle events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), PublishError>;
}

/// Publisher that hands encoded messages to the broker adapter over a channel
pub struct ChannelPublisher {
    exchange: String,
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelPublisher {
    pub fn new(exchange: &str, tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            exchange: exchange.to_string(),
            tx,
        }
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), PublishError> {
        let message = OutboundMessage {
            exchange: self.exchange.clone(),
            routing_key: event.routing_key().to_string(),
            body: event.encode()?,
        };
        self.tx.send(message).await.map_err(|_| PublishError::Closed)
    }
}
