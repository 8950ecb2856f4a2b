//! Relational persistence for ReportFlow.
//!
//! Every entity is reached through a repository trait in [`repos`]; the
//! bundled SQL implementations run unchanged on SQLite, MySQL, and Postgres.

pub mod error;
pub mod factory;
pub mod provider;
pub mod repos;
pub mod rows;
pub mod schema;

pub use factory::RepositoryFactory;
pub use provider::{Database, DatabaseProvider};
pub use repos::{
    AuditLogRepository, NewAuditLog, NewUser, OrganizationRepository, PermissionRepository,
    ReportRepository, RoleRepository, SettingRepository, SubscriptionRepository, UserChanges,
    UserRepository,
};
