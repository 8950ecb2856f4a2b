//! First-start seeding: RBAC defaults, default settings, and the optional
//! bootstrap administrator.

use reportflow_core::config::AuthConfig;
use reportflow_core::requests::{validate_email, validate_password};
use reportflow_core::types::Setting;
use reportflow_core::ReportFlowResult;
use reportflow_storage::{NewUser, RepositoryFactory};
use tracing::{info, warn};

use crate::password::PasswordHasher;
use crate::rbac::{RbacService, ADMIN_ROLE};

const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    (Setting::SITE_NAME, "ReportFlow", "Display name of this installation"),
    (
        Setting::SIGNUP_ENABLED,
        "true",
        "Allow visitors to register new accounts",
    ),
];

/// What a bootstrap run changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub settings_created: usize,
    pub admin_created: bool,
}

pub async fn run(
    repos: &RepositoryFactory,
    rbac: &RbacService,
    hasher: &PasswordHasher,
    auth: &AuthConfig,
) -> ReportFlowResult<BootstrapReport> {
    let mut report = BootstrapReport::default();
    rbac.seed_defaults().await?;

    for (key, value, description) in DEFAULT_SETTINGS {
        if repos.settings.insert_if_missing(key, value, description).await? {
            report.settings_created += 1;
        }
    }

    if let (Some(email), Some(password)) = (
        auth.bootstrap_admin_email.as_deref(),
        auth.bootstrap_admin_password.as_deref(),
    ) {
        report.admin_created = ensure_admin(repos, hasher, email, password).await?;
    }

    info!(
        settings_created = report.settings_created,
        admin_created = report.admin_created,
        "Bootstrap complete"
    );
    Ok(report)
}

async fn ensure_admin(
    repos: &RepositoryFactory,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
) -> ReportFlowResult<bool> {
    validate_email(email)?;
    validate_password(password)?;
    if repos.users.find_by_email(email).await?.is_some() {
        return Ok(false);
    }
    let role_id = repos.roles.find_by_name(ADMIN_ROLE).await?.map(|r| r.id);
    if role_id.is_none() {
        warn!("Admin role missing; bootstrap administrator has no role");
    }
    let user = repos
        .users
        .create(NewUser {
            email: email.to_string(),
            name: "Administrator".into(),
            password_hash: hasher.hash(password),
            organization_id: None,
            role_id,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "Bootstrap administrator created");
    Ok(true)
}
