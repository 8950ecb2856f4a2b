//! Account lifecycle: self-service signup, credential checks, and
//! admin-driven user management. Passwords never leave this module in
//! clear text.

use reportflow_core::requests::{
    CreateOrganizationRequest, CreateSubscriptionRequest, CreateUserRequest, LoginRequest,
    RegisterRequest, UpdateUserRequest,
};
use reportflow_core::types::{Organization, Plan, Setting, SubscriptionStatus, User};
use reportflow_core::{ReportFlowError, ReportFlowResult};
use reportflow_storage::{NewUser, RepositoryFactory, UserChanges};
use tracing::{info, warn};

use crate::password::PasswordHasher;
use crate::rbac::MEMBER_ROLE;

/// Outcome of a successful signup.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub organization: Option<Organization>,
}

#[derive(Clone)]
pub struct AccountService {
    repos: RepositoryFactory,
    hasher: PasswordHasher,
    /// Verified against when the email is unknown so that both login
    /// failures pay the same KDF cost.
    dummy_hash: String,
}

impl AccountService {
    pub fn new(repos: RepositoryFactory, hasher: PasswordHasher) -> Self {
        let dummy_hash = hasher.hash("reportflow-unknown-account");
        Self {
            repos,
            hasher,
            dummy_hash,
        }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Whether self-service signup is open. Anything but `"false"` is open.
    pub async fn signup_enabled(&self) -> ReportFlowResult<bool> {
        let setting = self.repos.settings.get(Setting::SIGNUP_ENABLED).await?;
        Ok(setting.map_or(true, |s| !s.value.trim().eq_ignore_ascii_case("false")))
    }

    /// Create a user with the `member` role and, when requested, a new
    /// organization on the free plan with a trialing subscription.
    pub async fn register(&self, req: &RegisterRequest) -> ReportFlowResult<Registration> {
        req.validate()?;
        if !self.signup_enabled().await? {
            return Err(ReportFlowError::Forbidden("signup is disabled".into()));
        }
        if self.repos.users.find_by_email(&req.email).await?.is_some() {
            return Err(ReportFlowError::Conflict("email is already registered".into()));
        }

        let organization = match &req.organization_name {
            Some(name) => Some(self.create_organization(name).await?),
            None => None,
        };
        let role_id = self
            .repos
            .roles
            .find_by_name(MEMBER_ROLE)
            .await?
            .map(|r| r.id);
        if role_id.is_none() {
            warn!("Default member role missing; registering user without a role");
        }

        let created = self
            .repos
            .users
            .create(NewUser {
                email: req.email.clone(),
                name: req.name.clone(),
                password_hash: self.hasher.hash(&req.password),
                organization_id: organization.as_ref().map(|o| o.id.clone()),
                role_id,
            })
            .await;

        let user = match created {
            Ok(user) => user,
            Err(err) => {
                // Do not leave an ownerless organization behind.
                if let Some(org) = &organization {
                    if let Err(cleanup) = self.repos.organizations.delete(&org.id).await {
                        warn!(
                            organization_id = %org.id,
                            error = %cleanup,
                            "Signup rollback failed"
                        );
                    }
                }
                return Err(err);
            }
        };
        info!(
            user_id = %user.id,
            organization_id = user.organization_id.as_deref().unwrap_or("-"),
            "User registered"
        );
        Ok(Registration { user, organization })
    }

    async fn create_organization(&self, name: &str) -> ReportFlowResult<Organization> {
        let organization = self
            .repos
            .organizations
            .create(&CreateOrganizationRequest {
                name: name.trim().to_string(),
                slug: None,
                plan: Some(Plan::Free),
            })
            .await?;
        self.repos
            .subscriptions
            .create(&CreateSubscriptionRequest {
                organization_id: organization.id.clone(),
                plan: Plan::Free,
                status: Some(SubscriptionStatus::Trialing),
                seats: 1,
                current_period_end: None,
            })
            .await?;
        Ok(organization)
    }

    /// Check credentials. Unknown email, wrong password, and disabled
    /// accounts all yield `Unauthorized`.
    pub async fn authenticate(&self, req: &LoginRequest) -> ReportFlowResult<User> {
        let invalid = || ReportFlowError::Unauthorized("invalid email or password".into());
        let Some(user) = self.repos.users.find_by_email(&req.email).await? else {
            self.hasher.verify(&req.password, &self.dummy_hash);
            return Err(invalid());
        };
        if !self.hasher.verify(&req.password, &user.password_hash) {
            warn!(user_id = %user.id, "Login rejected: bad password");
            return Err(invalid());
        }
        if !user.is_active() {
            warn!(user_id = %user.id, "Login rejected: account disabled");
            return Err(ReportFlowError::Unauthorized("account is disabled".into()));
        }
        self.repos.users.record_login(&user.id).await?;
        Ok(user)
    }

    pub async fn create_user(&self, req: &CreateUserRequest) -> ReportFlowResult<User> {
        req.validate()?;
        self.repos
            .users
            .create(NewUser {
                email: req.email.clone(),
                name: req.name.clone(),
                password_hash: self.hasher.hash(&req.password),
                organization_id: req.organization_id.clone(),
                role_id: req.role_id.clone(),
            })
            .await
    }

    pub async fn update_user(&self, id: &str, req: &UpdateUserRequest) -> ReportFlowResult<User> {
        req.validate()?;
        let changes = UserChanges {
            email: req.email.clone(),
            name: req.name.clone(),
            password_hash: req.password.as_deref().map(|p| self.hasher.hash(p)),
            organization_id: req.organization_id.clone(),
            role_id: req.role_id.clone(),
            status: req.status,
        };
        self.repos
            .users
            .update(id, changes)
            .await?
            .ok_or_else(|| ReportFlowError::not_found("user", id))
    }
}
