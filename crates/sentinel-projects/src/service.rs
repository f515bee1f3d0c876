//! Resource Service
//!
//! Quota-guarded creation and counted deletion of projects, domains and
//! repositories. A successful creation:
//!
//! 1. reserves a slot through the [`QuotaGuard`] (parent counter locked)
//! 2. persists the resource and commits the reservation
//! 3. reports usage to the tenant service in the background
//! 4. publishes the lifecycle event
//!
//! Steps 3 and 4 never undo steps 1 and 2.

use crate::counter::{CounterKey, ResourceCounter};
use crate::error::{Result, ServiceError};
use crate::events::{
    DomainAdded, EventPublisher, LifecycleEvent, ProjectCreated, ProjectDeleted, RepositoryAdded,
};
use crate::model::{
    Domain, DomainId, Project, ProjectId, Repository, RepositoryId, ResourceKind, TenantId,
    VerificationMethod,
};
use crate::quota::QuotaGuard;
use crate::remote::{UsageDelta, UsageReporter};
use crate::store::ResourceStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sentinel_common::StoreError;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Project creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Domain creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDomain {
    pub domain_url: String,
    pub verification_method: Option<VerificationMethod>,
}

/// Repository creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRepository {
    pub name: String,
    pub url: String,
}

/// Any creation request, addressed by its parent
#[derive(Debug, Clone)]
pub enum NewResource {
    Project { tenant_id: TenantId, project: NewProject },
    Domain { project_id: ProjectId, domain: NewDomain },
    Repository { project_id: ProjectId, repository: NewRepository },
}

/// Project update request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Project with its live child counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub domain_count: i64,
    pub repo_count: i64,
}

/// Resource service
pub struct ResourceService {
    store: Arc<dyn ResourceStore>,
    counter: Arc<ResourceCounter>,
    guard: Arc<QuotaGuard>,
    reporter: UsageReporter,
    publisher: Arc<dyn EventPublisher>,
}

impl ResourceService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        counter: Arc<ResourceCounter>,
        guard: Arc<QuotaGuard>,
        reporter: UsageReporter,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            counter,
            guard,
            reporter,
            publisher,
        }
    }

    /// Create any resource, returning its id
    pub async fn create_resource(&self, request: NewResource) -> Result<Uuid> {
        match request {
            NewResource::Project { tenant_id, project } => {
                self.create_project(tenant_id, project).await.map(|p| p.id)
            }
            NewResource::Domain { project_id, domain } => {
                self.add_domain(project_id, domain).await.map(|d| d.id)
            }
            NewResource::Repository { project_id, repository } => {
                self.add_repository(project_id, repository).await.map(|r| r.id)
            }
        }
    }

    /// Delete any resource. Only projects check `acting_user` against the owner.
    pub async fn delete_resource(
        &self,
        kind: ResourceKind,
        id: Uuid,
        acting_user: Uuid,
    ) -> Result<()> {
        match kind {
            ResourceKind::Project => self.delete_project(id, acting_user).await,
            ResourceKind::Domain => self.delete_domain(id).await,
            ResourceKind::Repo => self.delete_repository(id).await,
        }
    }

    pub async fn create_project(
        &self,
        tenant_id: TenantId,
        request: NewProject,
    ) -> Result<Project> {
        info!(%tenant_id, "Creating project");

        let reservation = self
            .guard
            .check_and_reserve(ResourceKind::Project, tenant_id, tenant_id)
            .await
            .map_err(|e| ServiceError::from_quota(ResourceKind::Project, e))?;

        let project = Project::new(tenant_id, &request.name, request.description, request.owner_id);
        self.store.insert_project(&project).await?;
        reservation.commit();

        self.reporter.report(tenant_id, ResourceKind::Project, UsageDelta::Increment);
        self.publish(LifecycleEvent::ProjectCreated(ProjectCreated::new(&project))).await;

        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    pub async fn add_domain(&self, project_id: ProjectId, request: NewDomain) -> Result<Domain> {
        info!(%project_id, "Adding domain to project");

        let project = self.active_project(project_id).await?;
        let domain = Domain::new(
            project_id,
            &request.domain_url,
            request.verification_method.unwrap_or_default(),
        );
        if self.store.domain_url_exists(&domain.domain_url).await? {
            return Err(ServiceError::AlreadyExists {
                kind: ResourceKind::Domain,
                name: domain.domain_url,
            });
        }

        let reservation = self
            .guard
            .check_and_reserve(ResourceKind::Domain, project_id, project.tenant_id)
            .await
            .map_err(|e| ServiceError::from_quota(ResourceKind::Domain, e))?;
        self.store
            .insert_domain(&domain)
            .await
            .map_err(|e| already_exists(ResourceKind::Domain, &domain.domain_url, e))?;
        reservation.commit();

        self.reporter.report(project.tenant_id, ResourceKind::Domain, UsageDelta::Increment);
        self.publish(LifecycleEvent::DomainAdded(DomainAdded::new(&domain, project.tenant_id)))
            .await;

        info!(domain_id = %domain.id, domain = %domain.domain_url, "Domain added");
        Ok(domain)
    }

    pub async fn add_repository(
        &self,
        project_id: ProjectId,
        request: NewRepository,
    ) -> Result<Repository> {
        info!(%project_id, "Adding repository to project");

        let project = self.active_project(project_id).await?;
        let repository = Repository::new(project_id, &request.name, &request.url);

        let reservation = self
            .guard
            .check_and_reserve(ResourceKind::Repo, project_id, project.tenant_id)
            .await
            .map_err(|e| ServiceError::from_quota(ResourceKind::Repo, e))?;
        self.store
            .insert_repository(&repository)
            .await
            .map_err(|e| already_exists(ResourceKind::Repo, &repository.url, e))?;
        reservation.commit();

        self.reporter.report(project.tenant_id, ResourceKind::Repo, UsageDelta::Increment);
        self.publish(LifecycleEvent::RepositoryAdded(RepositoryAdded::new(
            &repository,
            project.tenant_id,
        )))
        .await;

        info!(repository_id = %repository.id, "Repository added");
        Ok(repository)
    }

    /// Soft-delete a project owned by `acting_user`
    pub async fn delete_project(&self, project_id: ProjectId, acting_user: Uuid) -> Result<()> {
        let project = self.active_project(project_id).await?;
        ensure_owner(&project, acting_user, "delete")?;
        let tenant_id = project.tenant_id;
        let mut slot = self
            .counter
            .lock(CounterKey::new(tenant_id, ResourceKind::Project))
            .await?;

        // Re-read under the tenant's lock so concurrent deletes count once
        let mut project = self.active_project(project_id).await?;
        slot.decrement()?;
        project.mark_deleted();
        if let Err(e) = self.store.save_project(&project).await {
            slot.increment();
            return Err(ServiceError::from_store(ResourceKind::Project, project_id, e));
        }
        drop(slot);
        self.counter.forget(project_id);

        self.reporter.report(tenant_id, ResourceKind::Project, UsageDelta::Decrement);
        self.publish(LifecycleEvent::ProjectDeleted(ProjectDeleted::new(&project))).await;

        info!(%project_id, "Project deleted");
        Ok(())
    }

    pub async fn delete_domain(&self, domain_id: DomainId) -> Result<()> {
        let domain = self
            .store
            .get_domain(&domain_id)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::Domain, domain_id, e))?;
        let tenant_id = self.project(domain.project_id).await?.tenant_id;

        let mut slot = self
            .counter
            .lock(CounterKey::new(domain.project_id, ResourceKind::Domain))
            .await?;

        // Re-read under the project's lock so concurrent deletes count once
        self.store
            .get_domain(&domain_id)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::Domain, domain_id, e))?;
        slot.decrement()?;
        if let Err(e) = self.store.remove_domain(&domain_id).await {
            slot.increment();
            return Err(ServiceError::from_store(ResourceKind::Domain, domain_id, e));
        }
        drop(slot);

        self.reporter.report(tenant_id, ResourceKind::Domain, UsageDelta::Decrement);
        info!(%domain_id, "Domain deleted");
        Ok(())
    }

    pub async fn delete_repository(&self, repository_id: RepositoryId) -> Result<()> {
        let repository = self
            .store
            .get_repository(&repository_id)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::Repo, repository_id, e))?;
        let tenant_id = self.project(repository.project_id).await?.tenant_id;

        let mut slot = self
            .counter
            .lock(CounterKey::new(repository.project_id, ResourceKind::Repo))
            .await?;

        self.store
            .get_repository(&repository_id)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::Repo, repository_id, e))?;
        slot.decrement()?;
        if let Err(e) = self.store.remove_repository(&repository_id).await {
            slot.increment();
            return Err(ServiceError::from_store(ResourceKind::Repo, repository_id, e));
        }
        drop(slot);

        self.reporter.report(tenant_id, ResourceKind::Repo, UsageDelta::Decrement);
        info!(%repository_id, "Repository deleted");
        Ok(())
    }

    pub async fn get_project(&self, project_id: ProjectId) -> Result<ProjectView> {
        let project = self.project(project_id).await?;
        let domain_count = self
            .counter
            .current(CounterKey::new(project_id, ResourceKind::Domain))
            .await?;
        let repo_count = self
            .counter
            .current(CounterKey::new(project_id, ResourceKind::Repo))
            .await?;

        Ok(ProjectView {
            project,
            domain_count,
            repo_count,
        })
    }

    /// Active projects of a tenant
    pub async fn projects_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Project>> {
        let projects = self.store.projects_by_tenant(&tenant_id).await?;
        Ok(projects.into_iter().filter(Project::is_active).collect())
    }

    /// Rename or describe a project owned by `acting_user`
    pub async fn update_project(
        &self,
        project_id: ProjectId,
        acting_user: Uuid,
        update: ProjectUpdate,
    ) -> Result<Project> {
        let mut project = self.active_project(project_id).await?;
        ensure_owner(&project, acting_user, "update")?;
        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(description) = update.description {
            project.description = Some(description);
        }
        project.updated_at = Utc::now();

        self.store
            .save_project(&project)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::Project, project_id, e))?;
        info!(%project_id, "Project updated");
        Ok(project)
    }

    pub async fn domains_by_project(&self, project_id: ProjectId) -> Result<Vec<Domain>> {
        Ok(self.store.domains_by_project(&project_id).await?)
    }

    pub async fn repositories_by_project(&self, project_id: ProjectId) -> Result<Vec<Repository>> {
        Ok(self.store.repositories_by_project(&project_id).await?)
    }

    async fn project(&self, project_id: ProjectId) -> Result<Project> {
        self.store
            .get_project(&project_id)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::Project, project_id, e))
    }

    async fn active_project(&self, project_id: ProjectId) -> Result<Project> {
        let project = self.project(project_id).await?;
        if !project.is_active() {
            return Err(ServiceError::NotFound {
                kind: ResourceKind::Project,
                id: project_id,
            });
        }
        Ok(project)
    }

    async fn publish(&self, event: LifecycleEvent) {
        let routing_key = event.routing_key();
        if let Err(e) = self.publisher.publish(event).await {
            metrics::counter!("sentinel_publish_failures_total", "routing_key" => routing_key)
                .increment(1);
            error!(routing_key, error = %e, "Failed to publish lifecycle event");
        }
    }
}

fn ensure_owner(project: &Project, acting_user: Uuid, action: &'static str) -> Result<()> {
    if project.owner_id != acting_user {
        warn!(
            project_id = %project.id,
            %acting_user,
            action,
            "Rejected project change by non-owner"
        );
        return Err(ServiceError::Forbidden {
            action,
            project_id: project.id,
        });
    }
    Ok(())
}

fn already_exists(kind: ResourceKind, name: &str, err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict(_) => ServiceError::AlreadyExists {
            kind,
            name: name.to_string(),
        },
        other => ServiceError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LimitsCache;
    use crate::events::EventSynchronizer;
    use crate::model::Ceilings;
    use crate::store::InMemoryResourceStore;
    use crate::testing::{CapturePublisher, MockRemote};
    use std::time::Duration;

    struct Fixture {
        service: ResourceService,
        sync: EventSynchronizer,
        cache: Arc<LimitsCache>,
        counter: Arc<ResourceCounter>,
        remote: Arc<MockRemote>,
        publisher: Arc<CapturePublisher>,
    }

    fn fixture(remote: MockRemote) -> Fixture {
        let remote = Arc::new(remote);
        let cache = Arc::new(LimitsCache::new());
        let store = Arc::new(InMemoryResourceStore::new());
        let counter = Arc::new(ResourceCounter::new(store.clone()));
        let publisher = Arc::new(CapturePublisher::default());
        let guard = Arc::new(QuotaGuard::new(cache.clone(), counter.clone(), remote.clone()));

        Fixture {
            service: ResourceService::new(
                store.clone(),
                counter.clone(),
                guard,
                UsageReporter::new(remote.clone()),
                publisher.clone(),
            ),
            sync: EventSynchronizer::new(cache.clone(), store),
            cache,
            counter,
            remote,
            publisher,
        }
    }

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.into(),
            description: None,
            owner_id: Uuid::new_v4(),
        }
    }

    fn new_domain(url: &str) -> NewDomain {
        NewDomain {
            domain_url: url.into(),
            verification_method: None,
        }
    }

    fn new_repository(name: &str, url: &str) -> NewRepository {
        NewRepository {
            name: name.into(),
            url: url.into(),
        }
    }

    async fn wait_for_reports(remote: &MockRemote, expected: usize) {
        for _ in 0..100 {
            if remote.reports().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} usage reports, saw {}", expected, remote.reports().len());
    }

    #[tokio::test]
    async fn test_project_limit_reached() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(2, 5, 5)));
        let tenant = Uuid::new_v4();

        f.service.create_project(tenant, new_project("a")).await.unwrap();
        f.service.create_project(tenant, new_project("b")).await.unwrap();
        let err = f.service.create_project(tenant, new_project("c")).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::LimitExceeded {
                kind: ResourceKind::Project,
                current: 2,
                ceiling: 2
            }
        ));
        assert_eq!(err.to_string(), "Project limit reached (2/2). Upgrade your plan.");
        assert_eq!(f.service.projects_by_tenant(tenant).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_event_lifts_limit() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(2, 5, 5)));
        let tenant = Uuid::new_v4();
        f.service.create_project(tenant, new_project("a")).await.unwrap();
        f.service.create_project(tenant, new_project("b")).await.unwrap();

        let body = serde_json::to_vec(&serde_json::json!({
            "tenantId": tenant,
            "newLimits": { "maxProjects": 5, "maxDomains": 5, "maxRepos": 5 }
        }))
        .unwrap();
        f.sync.handle("tenant.plan.upgraded", &body).await.unwrap();

        f.service.create_project(tenant, new_project("c")).await.unwrap();
        assert_eq!(f.remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_timeout_on_uncached_tenant() {
        let f = fixture(MockRemote::unavailable());
        let tenant = Uuid::new_v4();

        let err = f.service.create_project(tenant, new_project("a")).await.unwrap_err();

        assert!(matches!(err, ServiceError::LimitsUnavailable { .. }));
        assert!(f.cache.get(&tenant).is_none());
        assert!(f.service.projects_by_tenant(tenant).await.unwrap().is_empty());
        assert!(f.publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_report_failure_does_not_block_creation() {
        let f = fixture(MockRemote::unavailable());
        let tenant = Uuid::new_v4();
        f.cache.put(tenant, Ceilings::new(1, 1, 1));

        let project = f.service.create_project(tenant, new_project("a")).await.unwrap();

        wait_for_reports(&f.remote, 1).await;
        let view = f.service.get_project(project.id).await.unwrap();
        assert_eq!(view.project.id, project.id);
        assert_eq!(f.publisher.events().len(), 1);
    }

    #[tokio::test]
    async fn test_counter_tracks_create_and_delete() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(3, 3, 3)));
        let tenant = Uuid::new_v4();
        let key = CounterKey::new(tenant, ResourceKind::Project);

        let project = f.service.create_project(tenant, new_project("a")).await.unwrap();
        assert_eq!(f.counter.current(key).await, Ok(1));

        f.service.delete_project(project.id, project.owner_id).await.unwrap();
        assert_eq!(f.counter.current(key).await, Ok(0));

        let err = f
            .service
            .delete_project(project.id, project.owner_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NotFound {
                kind: ResourceKind::Project,
                ..
            }
        ));
        assert_eq!(f.counter.current(key).await, Ok(0));

        wait_for_reports(&f.remote, 2).await;
        let deltas: Vec<_> = f.remote.reports().into_iter().map(|(_, _, d)| d).collect();
        assert_eq!(deltas, vec![UsageDelta::Increment, UsageDelta::Decrement]);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_change_project() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(3, 3, 3)));
        let tenant = Uuid::new_v4();
        let project = f.service.create_project(tenant, new_project("a")).await.unwrap();
        let stranger = Uuid::new_v4();

        let rename = ProjectUpdate {
            name: Some("taken".into()),
            description: None,
        };
        let err = f
            .service
            .update_project(project.id, stranger, rename)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden { action: "update", .. }));

        let err = f
            .service
            .delete_resource(ResourceKind::Project, project.id, stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden { action: "delete", .. }));
        assert_eq!(err.to_string(), "you don't have permission to delete this project");

        let view = f.service.get_project(project.id).await.unwrap();
        assert_eq!(view.project.name, "a");
        assert!(view.project.is_active());
        let key = CounterKey::new(tenant, ResourceKind::Project);
        assert_eq!(f.counter.current(key).await, Ok(1));
        assert_eq!(f.publisher.events().len(), 1);
    }

    #[tokio::test]
    async fn test_domain_quota_is_per_project() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 1, 5)));
        let tenant = Uuid::new_v4();
        let first = f.service.create_project(tenant, new_project("a")).await.unwrap();
        let second = f.service.create_project(tenant, new_project("b")).await.unwrap();

        f.service.add_domain(first.id, new_domain("one.example.com")).await.unwrap();
        let err = f
            .service
            .add_domain(first.id, new_domain("two.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::LimitExceeded {
                kind: ResourceKind::Domain,
                current: 1,
                ceiling: 1
            }
        ));

        f.service.add_domain(second.id, new_domain("two.example.com")).await.unwrap();
        assert_eq!(f.service.get_project(first.id).await.unwrap().domain_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_domain_rejected() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();

        let domain = f
            .service
            .add_domain(project.id, new_domain("https://www.Example.com/"))
            .await
            .unwrap();
        assert_eq!(domain.domain_url, "example.com");

        let err = f.service.add_domain(project.id, new_domain("example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::AlreadyExists {
                kind: ResourceKind::Domain,
                ..
            }
        ));
        assert_eq!(f.service.get_project(project.id).await.unwrap().domain_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_repository_rejected() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();
        let url = "https://git.example.com/acme/web";

        f.service.add_repository(project.id, new_repository("web", url)).await.unwrap();
        let err = f
            .service
            .add_repository(project.id, new_repository("web-copy", url))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::AlreadyExists {
                kind: ResourceKind::Repo,
                ..
            }
        ));
        assert_eq!(f.service.get_project(project.id).await.unwrap().repo_count, 1);
        assert_eq!(f.service.repositories_by_project(project.id).await.unwrap().len(), 1);
        assert_eq!(f.publisher.events().len(), 2);
    }

    #[tokio::test]
    async fn test_children_of_deleted_project_not_found() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();
        f.service.delete_project(project.id, project.owner_id).await.unwrap();

        let err = f.service.add_domain(project.id, new_domain("example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NotFound {
                kind: ResourceKind::Project,
                ..
            }
        ));

        let missing = Uuid::new_v4();
        let err = f
            .service
            .create_resource(NewResource::Repository {
                project_id: missing,
                repository: new_repository("web", "https://git.example.com/web"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { id, .. } if id == missing));
    }

    #[tokio::test]
    async fn test_repository_lifecycle() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 1)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();
        let request = new_repository("web", "https://git.example.com/acme/web");

        let id = f
            .service
            .create_resource(NewResource::Repository {
                project_id: project.id,
                repository: request.clone(),
            })
            .await
            .unwrap();
        assert!(matches!(
            f.service.add_repository(project.id, request.clone()).await,
            Err(ServiceError::LimitExceeded {
                kind: ResourceKind::Repo,
                ..
            })
        ));

        let acting_user = project.owner_id;
        f.service.delete_resource(ResourceKind::Repo, id, acting_user).await.unwrap();
        assert_eq!(f.service.get_project(project.id).await.unwrap().repo_count, 0);
        assert!(matches!(
            f.service.delete_resource(ResourceKind::Repo, id, acting_user).await,
            Err(ServiceError::NotFound {
                kind: ResourceKind::Repo,
                ..
            })
        ));

        f.service.add_repository(project.id, request).await.unwrap();
        assert_eq!(f.service.repositories_by_project(project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_domain_frees_slot() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 1, 5)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();

        let domain = f.service.add_domain(project.id, new_domain("example.com")).await.unwrap();
        f.service
            .delete_resource(ResourceKind::Domain, domain.id, project.owner_id)
            .await
            .unwrap();

        assert_eq!(f.service.get_project(project.id).await.unwrap().repo_count, 1);
        assert_eq!(f.service.repositories_by_project(project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_domain_deletes_count_once() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();
        f.service.add_domain(project.id, new_domain("keep.example.com")).await.unwrap();
        let domain = f.service.add_domain(project.id, new_domain("example.com")).await.unwrap();

        let (first, second) = tokio::join!(
            f.service.delete_domain(domain.id),
            f.service.delete_domain(domain.id)
        );

        assert!(first.is_ok() != second.is_ok());
        let failed = if first.is_err() { first } else { second };
        assert!(matches!(
            failed,
            Err(ServiceError::NotFound {
                kind: ResourceKind::Domain,
                ..
            })
        ));
        assert_eq!(f.service.get_project(project.id).await.unwrap().domain_count, 1);
    }

    #[tokio::test]
    async fn test_replayed_lifecycle_events_leave_counters_alone() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let tenant = Uuid::new_v4();
        let project = f.service.create_project(tenant, new_project("a")).await.unwrap();
        f.service.add_domain(project.id, new_domain("example.com")).await.unwrap();

        let before = f.service.get_project(project.id).await.unwrap();
        for event in f.publisher.events() {
            let body = event.encode().unwrap();
            for _ in 0..2 {
                f.sync.handle(event.routing_key(), &body).await.unwrap();
            }
        }
        let after = f.service.get_project(project.id).await.unwrap();

        assert_eq!(before.domain_count, after.domain_count);
        let key = CounterKey::new(tenant, ResourceKind::Project);
        assert_eq!(f.counter.current(key).await, Ok(1));
    }

    #[tokio::test]
    async fn test_tenants_have_independent_limits() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(1, 1, 1)));
        let (small, large) = (Uuid::new_v4(), Uuid::new_v4());
        f.remote.set(large, Ceilings::new(3, 1, 1));

        f.service.create_project(small, new_project("a")).await.unwrap();
        assert!(f.service.create_project(small, new_project("b")).await.is_err());
        for name in ["a", "b", "c"] {
            f.service.create_project(large, new_project(name)).await.unwrap();
        }

        assert_eq!(f.cache.get(&large).unwrap().ceilings.max_projects, 3);
        assert_eq!(f.remote.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_update_project() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let project = f.service.create_project(Uuid::new_v4(), new_project("a")).await.unwrap();
        let update = ProjectUpdate {
            name: Some("renamed".into()),
            description: Some("docs".into()),
        };

        let updated = f
            .service
            .update_project(project.id, project.owner_id, update)
            .await
            .unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.description.as_deref(), Some("docs"));
        assert!(updated.updated_at >= project.updated_at);
    }

    #[tokio::test]
    async fn test_published_events_identify_tenant() {
        let f = fixture(MockRemote::with_limits(Ceilings::new(5, 5, 5)));
        let tenant = Uuid::new_v4();
        let project = f.service.create_project(tenant, new_project("a")).await.unwrap();
        f.service.add_domain(project.id, new_domain("example.com")).await.unwrap();
        f.service.delete_project(project.id, project.owner_id).await.unwrap();

        let keys: Vec<_> = f.publisher.events().iter().map(|e| e.routing_key()).collect();
        assert_eq!(keys, vec!["project.created", "domain.added", "project.deleted"]);
        match &f.publisher.events()[1] {
            LifecycleEvent::DomainAdded(e) => {
                assert_eq!(e.tenant_id, tenant);
                assert_eq!(e.project_id, project.id);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
