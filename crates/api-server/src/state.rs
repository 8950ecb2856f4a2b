//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Instant;

use reportflow_core::config::AppConfig;
use reportflow_core::ReportFlowResult;
use reportflow_platform::{
    AccountService, AuditLogger, PasswordHasher, RbacService, SessionManager,
};
use reportflow_storage::RepositoryFactory;

#[derive(Clone)]
pub struct AppState {
    pub repos: RepositoryFactory,
    pub sessions: Arc<SessionManager>,
    pub rbac: RbacService,
    pub accounts: AccountService,
    pub audit: AuditLogger,
    pub instance_name: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &AppConfig, repos: RepositoryFactory) -> ReportFlowResult<Self> {
        let hasher = PasswordHasher::new(config.auth.pbkdf2_iterations);
        Ok(Self {
            sessions: Arc::new(SessionManager::new(&config.auth)?),
            rbac: RbacService::new(repos.clone()),
            accounts: AccountService::new(repos.clone(), hasher),
            audit: AuditLogger::new(repos.audit_logs.clone()),
            instance_name: config.instance_name.clone(),
            start_time: Instant::now(),
            repos,
        })
    }
}
