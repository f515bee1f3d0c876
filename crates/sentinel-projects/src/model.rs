//! Project Service Data Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant ID
pub type TenantId = Uuid;
/// Project ID
pub type ProjectId = Uuid;
/// Domain ID
pub type DomainId = Uuid;
/// Repository ID
pub type RepositoryId = Uuid;

/// Kind of quota-guarded resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Project,
    Domain,
    Repo,
}

impl ResourceKind {
    /// Wire name used by the tenant service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "PROJECT",
            Self::Domain => "DOMAIN",
            Self::Repo => "REPO",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Domain => "Domain",
            Self::Repo => "Repository",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota ceilings purchased by a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ceilings {
    /// Max active projects per tenant
    pub max_projects: u32,
    /// Max domains per project
    pub max_domains: u32,
    /// Max repositories per project
    pub max_repos: u32,
}

impl Ceilings {
    pub fn new(max_projects: u32, max_domains: u32, max_repos: u32) -> Self {
        Self { max_projects, max_domains, max_repos }
    }

    /// Ceiling for a resource kind
    pub fn ceiling(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Project => self.max_projects,
            ResourceKind::Domain => self.max_domains,
            ResourceKind::Repo => self.max_repos,
        }
    }
}

/// Cached tenant limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantLimits {
    /// Tenant the ceilings belong to
    pub tenant_id: TenantId,
    /// Current ceilings
    pub ceilings: Ceilings,
    /// When this entry was last applied locally
    pub last_updated: DateTime<Utc>,
}

impl TenantLimits {
    pub fn new(tenant_id: TenantId, ceilings: Ceilings) -> Self {
        Self {
            tenant_id,
            ceilings,
            last_updated: Utc::now(),
        }
    }

    pub fn ceiling(&self, kind: ResourceKind) -> u32 {
        self.ceilings.ceiling(kind)
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    Deleted,
}

/// Project owned by a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new active project
    pub fn new(
        tenant_id: TenantId,
        name: &str,
        description: Option<String>,
        owner_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            description,
            owner_id,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    /// Soft delete
    pub fn mark_deleted(&mut self) {
        self.status = ProjectStatus::Deleted;
        self.updated_at = Utc::now();
    }
}

/// Domain verification status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

/// How domain ownership is proven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    #[default]
    DnsTxt,
    HtmlFile,
    MetaTag,
}

/// Outcome of applying a verification result to a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationTransition {
    /// Pending domain moved to a terminal state
    Applied(VerificationStatus),
    /// Domain already in the requested state
    Unchanged,
    /// Domain was in the opposite terminal state; the new state was applied
    Conflict {
        previous: VerificationStatus,
        current: VerificationStatus,
    },
}

/// Domain attached to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: DomainId,
    pub project_id: ProjectId,
    pub domain_url: String,
    pub verification_method: VerificationMethod,
    verification_status: VerificationStatus,
    verification_token: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    /// Create a pending domain with a fresh verification token
    pub fn new(
        project_id: ProjectId,
        domain_url: &str,
        verification_method: VerificationMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            domain_url: normalize_domain_url(domain_url),
            verification_method,
            verification_status: VerificationStatus::Pending,
            verification_token: Uuid::new_v4().to_string(),
            verified_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification_status
    }

    pub fn verification_token(&self) -> &str {
        &self.verification_token
    }

    /// Apply a verification outcome. Later outcomes always win.
    pub fn apply_verification(&mut self, verified: bool) -> VerificationTransition {
        let target = if verified {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Failed
        };
        let previous = self.verification_status;
        if previous == target {
            return VerificationTransition::Unchanged;
        }

        self.verification_status = target;
        self.verified_at = verified.then(Utc::now);

        match previous {
            VerificationStatus::Pending => VerificationTransition::Applied(target),
            _ => VerificationTransition::Conflict { previous, current: target },
        }
    }
}

/// Source repository attached to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: RepositoryId,
    pub project_id: ProjectId,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(project_id: ProjectId, name: &str, url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_string(),
            url: url.trim().trim_end_matches('/').to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Canonical form of a domain: no scheme, no `www.`, no trailing slash, lowercase
pub fn normalize_domain_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.strip_suffix('/').unwrap_or(without_www).to_string()
}
