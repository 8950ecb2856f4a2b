//! Request payloads accepted by the REST API, with boundary validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

use crate::error::{ReportFlowError, ReportFlowResult};
use crate::types::{OrganizationStatus, Plan, ReportStatus, SubscriptionStatus, UserStatus};

/// Maximum length of short string fields (names, titles, slugs).
pub const MAX_NAME_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

fn require(field: &str, value: &str) -> ReportFlowResult<()> {
    if value.trim().is_empty() {
        return Err(ReportFlowError::validation(format!("'{field}' must not be empty")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ReportFlowError::validation(format!(
            "'{field}' exceeds maximum length of {MAX_NAME_LEN}"
        )));
    }
    Ok(())
}

fn optional(field: &str, value: &Option<String>) -> ReportFlowResult<()> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> ReportFlowResult<()> {
    require("email", email)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ReportFlowError::validation("'email' is not a valid address"))
    }
}

pub fn validate_password(password: &str) -> ReportFlowResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ReportFlowError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ReportFlowError::validation(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Lower-cased, dash-separated slug derived from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn validate_slug(slug: &str) -> ReportFlowResult<()> {
    require("slug", slug)?;
    if slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Ok(())
    } else {
        Err(ReportFlowError::validation(
            "'slug' may only contain lowercase letters, digits, and dashes",
        ))
    }
}

fn validate_identifier(field: &str, value: &str) -> ReportFlowResult<()> {
    require(field, value)?;
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '*')
    {
        Ok(())
    } else {
        Err(ReportFlowError::validation(format!(
            "'{field}' may only contain letters, digits, '_', '-', '.', or '*'"
        )))
    }
}

// ─── Auth ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Creates a new organization owned by the registering user.
    #[serde(default)]
    pub organization_name: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        require("name", &self.name)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        optional("organization_name", &self.organization_name)?;
        if let Some(org) = &self.organization_name {
            if slugify(org).is_empty() {
                return Err(ReportFlowError::validation(
                    "'organization_name' must contain letters or digits",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ─── Organizations ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    /// Derived from `name` when omitted.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
}

impl CreateOrganizationRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        require("name", &self.name)?;
        match &self.slug {
            Some(slug) => validate_slug(slug),
            None if slugify(&self.name).is_empty() => Err(ReportFlowError::validation(
                "'name' must contain letters or digits",
            )),
            None => Ok(()),
        }
    }

    pub fn resolved_slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub plan: Option<Plan>,
    pub status: Option<OrganizationStatus>,
}

impl UpdateOrganizationRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        optional("name", &self.name)?;
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        Ok(())
    }
}

// ─── Users ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        validate_email(&self.email)?;
        require("name", &self.name)?;
        validate_password(&self.password)
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field
/// (`None`, via `#[serde(default)]`).
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    /// `null` detaches the user from its organization.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, nullable)]
    pub organization_id: Option<Option<String>>,
    /// `null` leaves the user without a role.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, nullable)]
    pub role_id: Option<Option<String>>,
    pub status: Option<UserStatus>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        optional("name", &self.name)?;
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

// ─── Roles & permissions ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permission_ids: Vec<String>,
}

impl CreateRoleRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        validate_identifier("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateRoleRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        if let Some(name) = &self.name {
            validate_identifier("name", name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetRolePermissionsRequest {
    pub permission_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePermissionRequest {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
}

impl CreatePermissionRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        validate_identifier("resource", &self.resource)?;
        validate_identifier("action", &self.action)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePermissionRequest {
    pub description: String,
}

// ─── Reports ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
}

impl CreateReportRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        require("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateReportRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ReportStatus>,
    #[schema(value_type = Object, nullable)]
    pub content: Option<serde_json::Value>,
}

impl UpdateReportRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        optional("title", &self.title)
    }
}

// ─── Subscriptions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    pub organization_id: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    #[serde(default = "default_seats")]
    pub seats: i64,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

fn default_seats() -> i64 {
    1
}

impl CreateSubscriptionRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        require("organization_id", &self.organization_id)?;
        validate_seats(self.seats)
    }
}

fn validate_seats(seats: i64) -> ReportFlowResult<()> {
    if seats < 1 {
        return Err(ReportFlowError::validation("'seats' must be at least 1"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
    pub seats: Option<i64>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl UpdateSubscriptionRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        if let Some(seats) = self.seats {
            validate_seats(seats)?;
        }
        Ok(())
    }
}

// ─── Settings ──────────────────────────────────────────────────────────────

pub const MAX_SETTING_KEY_LEN: usize = 191;
pub const MAX_SETTING_VALUE_LEN: usize = 4096;

pub fn validate_setting_key(key: &str) -> ReportFlowResult<()> {
    validate_identifier("key", key)?;
    if key.len() > MAX_SETTING_KEY_LEN {
        return Err(ReportFlowError::validation(format!(
            "'key' exceeds maximum length of {MAX_SETTING_KEY_LEN}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PutSettingRequest {
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PutSettingRequest {
    pub fn validate(&self) -> ReportFlowResult<()> {
        if self.value.len() > MAX_SETTING_VALUE_LEN {
            return Err(ReportFlowError::validation(format!(
                "'value' exceeds maximum length of {MAX_SETTING_VALUE_LEN}"
            )));
        }
        optional("description", &self.description)
    }
}
