//! Domain entities shared by storage, platform services, and the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ReportFlowError;

/// Declares a snake_case string enum with round-trip conversion to the
/// text stored in the database.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ReportFlowError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ReportFlowError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// SaaS pricing plan of an organization or subscription.
    Plan {
        Free => "free",
        Starter => "starter",
        Professional => "professional",
        Enterprise => "enterprise",
    }
);

impl Default for Plan {
    fn default() -> Self {
        Plan::Free
    }
}

text_enum!(
    /// Tenant lifecycle status.
    OrganizationStatus {
        Active => "active",
        Suspended => "suspended",
    }
);

text_enum!(
    /// User account status.
    UserStatus {
        Active => "active",
        Disabled => "disabled",
    }
);

text_enum!(
    ReportStatus {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
);

text_enum!(
    SubscriptionStatus {
        Trialing => "trialing",
        Active => "active",
        PastDue => "past_due",
        Cancelled => "cancelled",
    }
);

// ─── Tenancy ───────────────────────────────────────────────────────────────

/// A customer account grouping users and reports.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub plan: Plan,
    pub status: OrganizationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub organization_id: Option<String>,
    pub role_id: Option<String>,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

// ─── RBAC ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: String,
    /// System roles are seeded at startup and cannot be deleted.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resource + action pair, e.g. `reports:write`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: String,
    pub resource: String,
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub const WILDCARD: &'static str = "*";

    /// `resource:action` form.
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }

    /// Whether this permission grants `resource:action`, honouring `*`.
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        (self.resource == Self::WILDCARD || self.resource == resource)
            && (self.action == Self::WILDCARD || self.action == action)
    }
}

/// A role together with its assigned permissions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

// ─── Reports & billing ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub description: String,
    pub status: ReportStatus,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub id: String,
    pub organization_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub seats: i64,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Settings & audit ──────────────────────────────────────────────────────

/// Global key/value platform setting.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    pub const SITE_NAME: &'static str = "site_name";
    pub const SIGNUP_ENABLED: &'static str = "signup_enabled";
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLog {
    pub id: String,
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter for audit log queries.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub resource_type: Option<String>,
    pub action: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl AuditQuery {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            organization_id: None,
            user_id: None,
            resource_type: None,
            action: None,
            limit: Page::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

// ─── Pagination ────────────────────────────────────────────────────────────

/// Limit/offset pagination. `limit` is clamped to [`Page::MAX_LIMIT`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    Page::DEFAULT_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}
