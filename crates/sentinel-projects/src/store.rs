//! Resource Store - Persistence abstraction for projects, domains and repositories
//!
//! Uniqueness rules enforced by every implementation:
//! - domain urls are unique across all projects
//! - repository urls are unique within a project

use crate::model::{
    Domain, DomainId, Project, ProjectId, Repository, RepositoryId, ResourceKind, TenantId,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use sentinel_common::{StoreError, StoreResult};
use std::collections::HashMap;
use uuid::Uuid;

/// Resource Store trait
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    async fn get_project(&self, id: &ProjectId) -> StoreResult<Project>;
    async fn save_project(&self, project: &Project) -> StoreResult<()>;
    async fn projects_by_tenant(&self, tenant_id: &TenantId) -> StoreResult<Vec<Project>>;

    async fn insert_domain(&self, domain: &Domain) -> StoreResult<()>;
    async fn get_domain(&self, id: &DomainId) -> StoreResult<Domain>;
    async fn save_domain(&self, domain: &Domain) -> StoreResult<()>;
    async fn remove_domain(&self, id: &DomainId) -> StoreResult<Domain>;
    async fn domain_url_exists(&self, domain_url: &str) -> StoreResult<bool>;
    async fn domains_by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<Domain>>;

    async fn insert_repository(&self, repository: &Repository) -> StoreResult<()>;
    async fn get_repository(&self, id: &RepositoryId) -> StoreResult<Repository>;
    async fn remove_repository(&self, id: &RepositoryId) -> StoreResult<Repository>;
    async fn repositories_by_project(
        &self,
        project_id: &ProjectId,
    ) -> StoreResult<Vec<Repository>>;

    /// Active children of `kind` under `parent`: a tenant's active projects,
    /// or a project's domains or repositories
    async fn count_active(&self, parent: &Uuid, kind: ResourceKind) -> StoreResult<i64>;
}

/// In-memory resource store (for testing and development)
#[derive(Default)]
pub struct InMemoryResourceStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    domains: RwLock<HashMap<DomainId, Domain>>,
    repositories: RwLock<HashMap<RepositoryId, Repository>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let mut projects = self.projects.write();
        if projects.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!("project {}", project.id)));
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &ProjectId) -> StoreResult<Project> {
        self.projects
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {}", id)))
    }

    async fn save_project(&self, project: &Project) -> StoreResult<()> {
        let mut projects = self.projects.write();
        match projects.get_mut(&project.id) {
            Some(existing) => {
                *existing = project.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("project {}", project.id))),
        }
    }

    async fn projects_by_tenant(&self, tenant_id: &TenantId) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<_> = self
            .projects
            .read()
            .values()
            .filter(|p| &p.tenant_id == tenant_id)
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn insert_domain(&self, domain: &Domain) -> StoreResult<()> {
        let mut domains = self.domains.write();
        if domains.values().any(|d| d.domain_url == domain.domain_url) {
            return Err(StoreError::Conflict(format!("domain {}", domain.domain_url)));
        }
        domains.insert(domain.id, domain.clone());
        Ok(())
    }

    async fn get_domain(&self, id: &DomainId) -> StoreResult<Domain> {
        self.domains
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("domain {}", id)))
    }

    async fn save_domain(&self, domain: &Domain) -> StoreResult<()> {
        let mut domains = self.domains.write();
        match domains.get_mut(&domain.id) {
            Some(existing) => {
                *existing = domain.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("domain {}", domain.id))),
        }
    }

    async fn remove_domain(&self, id: &DomainId) -> StoreResult<Domain> {
        self.domains
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("domain {}", id)))
    }

    async fn domain_url_exists(&self, domain_url: &str) -> StoreResult<bool> {
        Ok(self.domains.read().values().any(|d| d.domain_url == domain_url))
    }

    async fn domains_by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<Domain>> {
        let mut domains: Vec<_> = self
            .domains
            .read()
            .values()
            .filter(|d| &d.project_id == project_id)
            .cloned()
            .collect();
        domains.sort_by_key(|d| d.created_at);
        Ok(domains)
    }

    async fn insert_repository(&self, repository: &Repository) -> StoreResult<()> {
        let mut repositories = self.repositories.write();
        let duplicate = repositories
            .values()
            .any(|r| r.project_id == repository.project_id && r.url == repository.url);
        if duplicate {
            return Err(StoreError::Conflict(format!("repository {}", repository.url)));
        }
        repositories.insert(repository.id, repository.clone());
        Ok(())
    }

    async fn get_repository(&self, id: &RepositoryId) -> StoreResult<Repository> {
        self.repositories
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("repository {}", id)))
    }

    async fn remove_repository(&self, id: &RepositoryId) -> StoreResult<Repository> {
        self.repositories
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("repository {}", id)))
    }

    async fn repositories_by_project(
        &self,
        project_id: &ProjectId,
    ) -> StoreResult<Vec<Repository>> {
        let mut repositories: Vec<_> = self
            .repositories
            .read()
            .values()
            .filter(|r| &r.project_id == project_id)
            .cloned()
            .collect();
        repositories.sort_by_key(|r| r.created_at);
        Ok(repositories)
    }

    async fn count_active(&self, parent: &Uuid, kind: ResourceKind) -> StoreResult<i64> {
        let count = match kind {
            ResourceKind::Project => self
                .projects
                .read()
                .values()
                .filter(|p| &p.tenant_id == parent && p.is_active())
                .count(),
            ResourceKind::Domain => self
                .domains
                .read()
                .values()
                .filter(|d| &d.project_id == parent)
                .count(),
            ResourceKind::Repo => self
                .repositories
                .read()
                .values()
                .filter(|r| &r.project_id == parent)
                .count(),
        };
        Ok(count as i64)
    }
}
