//! Repository interfaces over the relational store.
//!
//! Handlers and services depend on these traits only; the `Sql*`
//! implementations run against whichever provider the pool was opened for.

mod audit;
mod organizations;
mod permissions;
mod reports;
mod roles;
mod settings;
mod subscriptions;
mod users;

pub use audit::SqlAuditLogRepository;
pub use organizations::SqlOrganizationRepository;
pub use permissions::SqlPermissionRepository;
pub use reports::SqlReportRepository;
pub use roles::SqlRoleRepository;
pub use settings::SqlSettingRepository;
pub use subscriptions::SqlSubscriptionRepository;
pub use users::SqlUserRepository;

use async_trait::async_trait;
use reportflow_core::requests::*;
use reportflow_core::types::*;
use reportflow_core::ReportFlowResult;

/// Fields required to insert a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub organization_id: Option<String>,
    pub role_id: Option<String>,
}

/// Partial user update; `None` leaves the column untouched. For the
/// nullable links `Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub organization_id: Option<Option<String>>,
    pub role_id: Option<Option<String>>,
    pub status: Option<UserStatus>,
}

/// Fields of an audit record before it is stored.
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn create(&self, req: &CreateOrganizationRequest) -> ReportFlowResult<Organization>;
    async fn get(&self, id: &str) -> ReportFlowResult<Option<Organization>>;
    async fn find_by_slug(&self, slug: &str) -> ReportFlowResult<Option<Organization>>;
    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Organization>>;
    async fn update(
        &self,
        id: &str,
        req: &UpdateOrganizationRequest,
    ) -> ReportFlowResult<Option<Organization>>;
    /// Fails with `Conflict` while users still belong to the organization.
    async fn delete(&self, id: &str) -> ReportFlowResult<bool>;
    async fn count(&self) -> ReportFlowResult<i64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> ReportFlowResult<User>;
    async fn get(&self, id: &str) -> ReportFlowResult<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> ReportFlowResult<Option<User>>;
    async fn list(&self, page: Page) -> ReportFlowResult<Vec<User>>;
    async fn list_by_organization(&self, org_id: &str, page: Page) -> ReportFlowResult<Vec<User>>;
    async fn count_by_organization(&self, org_id: &str) -> ReportFlowResult<i64>;
    async fn update(&self, id: &str, changes: UserChanges) -> ReportFlowResult<Option<User>>;
    async fn set_password_hash(&self, id: &str, password_hash: &str) -> ReportFlowResult<bool>;
    async fn record_login(&self, id: &str) -> ReportFlowResult<()>;
    async fn delete(&self, id: &str) -> ReportFlowResult<bool>;
    async fn count(&self) -> ReportFlowResult<i64>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(
        &self,
        name: &str,
        description: &str,
        is_system: bool,
    ) -> ReportFlowResult<Role>;
    async fn get(&self, id: &str) -> ReportFlowResult<Option<Role>>;
    async fn find_by_name(&self, name: &str) -> ReportFlowResult<Option<Role>>;
    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Role>>;
    async fn update(&self, id: &str, req: &UpdateRoleRequest) -> ReportFlowResult<Option<Role>>;
    async fn delete(&self, id: &str) -> ReportFlowResult<bool>;
    async fn count(&self) -> ReportFlowResult<i64>;
    async fn permissions_of(&self, role_id: &str) -> ReportFlowResult<Vec<Permission>>;
    /// Returns `true` when the pair was newly inserted.
    async fn assign_permission(&self, role_id: &str, permission_id: &str) -> ReportFlowResult<bool>;
    async fn revoke_permission(&self, role_id: &str, permission_id: &str) -> ReportFlowResult<bool>;
    /// Replace the role's whole permission set atomically.
    async fn set_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> ReportFlowResult<()>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, req: &CreatePermissionRequest) -> ReportFlowResult<Permission>;
    async fn get(&self, id: &str) -> ReportFlowResult<Option<Permission>>;
    async fn find(&self, resource: &str, action: &str) -> ReportFlowResult<Option<Permission>>;
    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Permission>>;
    async fn update_description(
        &self,
        id: &str,
        description: &str,
    ) -> ReportFlowResult<Option<Permission>>;
    async fn delete(&self, id: &str) -> ReportFlowResult<bool>;
    async fn count(&self) -> ReportFlowResult<i64>;
    /// Every permission granted to a user through their role.
    async fn for_user(&self, user_id: &str) -> ReportFlowResult<Vec<Permission>>;
}

/// Reports are always addressed within an organization.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(
        &self,
        org_id: &str,
        created_by: Option<&str>,
        req: &CreateReportRequest,
    ) -> ReportFlowResult<Report>;
    async fn get_for_organization(
        &self,
        org_id: &str,
        id: &str,
    ) -> ReportFlowResult<Option<Report>>;
    async fn list_for_organization(
        &self,
        org_id: &str,
        page: Page,
    ) -> ReportFlowResult<Vec<Report>>;
    async fn update(
        &self,
        org_id: &str,
        id: &str,
        req: &UpdateReportRequest,
    ) -> ReportFlowResult<Option<Report>>;
    async fn delete(&self, org_id: &str, id: &str) -> ReportFlowResult<bool>;
    async fn count_by_status(&self, org_id: &str) -> ReportFlowResult<Vec<(ReportStatus, i64)>>;
    async fn count(&self) -> ReportFlowResult<i64>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, req: &CreateSubscriptionRequest) -> ReportFlowResult<Subscription>;
    async fn get(&self, id: &str) -> ReportFlowResult<Option<Subscription>>;
    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Subscription>>;
    /// Newest non-cancelled subscription, falling back to the newest overall.
    async fn current_for_organization(
        &self,
        org_id: &str,
    ) -> ReportFlowResult<Option<Subscription>>;
    async fn update(
        &self,
        id: &str,
        req: &UpdateSubscriptionRequest,
    ) -> ReportFlowResult<Option<Subscription>>;
    async fn delete(&self, id: &str) -> ReportFlowResult<bool>;
    async fn count(&self) -> ReportFlowResult<i64>;
}

#[async_trait]
pub trait SettingRepository: Send + Sync {
    async fn list(&self) -> ReportFlowResult<Vec<Setting>>;
    async fn get(&self, key: &str) -> ReportFlowResult<Option<Setting>>;
    /// Insert or overwrite. A `None` description keeps the stored one.
    async fn upsert(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> ReportFlowResult<Setting>;
    /// Returns `true` when the setting was inserted.
    async fn insert_if_missing(
        &self,
        key: &str,
        value: &str,
        description: &str,
    ) -> ReportFlowResult<bool>;
    async fn delete(&self, key: &str) -> ReportFlowResult<bool>;
}

/// Append-only: there is no update or delete.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: NewAuditLog) -> ReportFlowResult<AuditLog>;
    async fn query(&self, filter: &AuditQuery) -> ReportFlowResult<Vec<AuditLog>>;
    async fn count(&self) -> ReportFlowResult<i64>;
}
