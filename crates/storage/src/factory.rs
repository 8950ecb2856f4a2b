//! Wires a [`Database`] into the full set of repositories.

use std::sync::Arc;

use reportflow_core::config::DatabaseConfig;
use reportflow_core::ReportFlowResult;
use tokio::sync::OnceCell;
use tracing::info;

use crate::provider::Database;
use crate::repos::*;

static SHARED: OnceCell<RepositoryFactory> = OnceCell::const_new();

/// Shared handle to every repository, cheap to clone into request state.
#[derive(Clone)]
pub struct RepositoryFactory {
    db: Database,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub settings: Arc<dyn SettingRepository>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
}

impl RepositoryFactory {
    pub fn new(db: Database) -> Self {
        Self {
            organizations: Arc::new(SqlOrganizationRepository::new(db.clone())),
            users: Arc::new(SqlUserRepository::new(db.clone())),
            roles: Arc::new(SqlRoleRepository::new(db.clone())),
            permissions: Arc::new(SqlPermissionRepository::new(db.clone())),
            reports: Arc::new(SqlReportRepository::new(db.clone())),
            subscriptions: Arc::new(SqlSubscriptionRepository::new(db.clone())),
            settings: Arc::new(SqlSettingRepository::new(db.clone())),
            audit_logs: Arc::new(SqlAuditLogRepository::new(db.clone())),
            db,
        }
    }

    /// Connect to the configured database and apply migrations when enabled.
    pub async fn connect(config: &DatabaseConfig) -> ReportFlowResult<Self> {
        let db = Database::connect(config).await?;
        if config.run_migrations {
            db.migrate().await?;
        } else {
            info!("Schema migrations disabled by configuration");
        }
        Ok(Self::new(db))
    }

    /// Process-wide instance. The first caller connects and migrates; later
    /// callers get the same factory regardless of the config they pass.
    pub async fn shared(config: &DatabaseConfig) -> ReportFlowResult<&'static RepositoryFactory> {
        SHARED.get_or_try_init(|| Self::connect(config)).await
    }

    /// Fresh migrated in-memory SQLite database.
    pub async fn in_memory() -> ReportFlowResult<Self> {
        Self::connect(&DatabaseConfig::in_memory()).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportflow_core::requests::CreateOrganizationRequest;

    #[tokio::test]
    async fn test_repositories_share_one_database() {
        let repos = RepositoryFactory::in_memory().await.unwrap();
        let org = repos
            .organizations
            .create(&CreateOrganizationRequest {
                name: "Acme".into(),
                slug: None,
                plan: None,
            })
            .await
            .unwrap();
        let cloned = repos.clone();
        assert!(cloned.organizations.get(&org.id).await.unwrap().is_some());
        assert_eq!(cloned.users.count_by_organization(&org.id).await.unwrap(), 0);
        assert!(repos.database().ping().await);
    }

    #[tokio::test]
    async fn test_shared_instance_is_initialised_once() {
        let first = RepositoryFactory::shared(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        let second = RepositoryFactory::shared(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        assert!(std::ptr::eq(first, second));
    }
}
