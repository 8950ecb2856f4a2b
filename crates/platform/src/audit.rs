//! Audit trail writer. Every entry goes to the `audit_logs` table and is
//! mirrored as a tracing event.

use std::sync::Arc;

use reportflow_core::types::{AuditLog, User};
use reportflow_storage::{AuditLogRepository, NewAuditLog};
use serde_json::Value;
use tracing::{info, warn};

/// Builder for one audit record.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    inner: NewAuditLog,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: NewAuditLog {
                organization_id: None,
                user_id: None,
                action: action.into(),
                resource_type: resource_type.into(),
                resource_id: resource_id.into(),
                details: Value::Object(Default::default()),
                ip_address: None,
            },
        }
    }

    /// Attribute the entry to `user` and their organization.
    pub fn actor(mut self, user: &User) -> Self {
        self.inner.user_id = Some(user.id.clone());
        if self.inner.organization_id.is_none() {
            self.inner.organization_id = user.organization_id.clone();
        }
        self
    }

    /// Scope the entry to the organization it affects. `None` falls back
    /// to the actor's organization.
    pub fn organization(mut self, organization_id: Option<&str>) -> Self {
        if let Some(id) = organization_id {
            self.inner.organization_id = Some(id.to_string());
        }
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.inner.details = details;
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.inner.ip_address = ip_address;
        self
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    repo: Arc<dyn AuditLogRepository>,
}

impl AuditLogger {
    pub fn new(repo: Arc<dyn AuditLogRepository>) -> Self {
        Self { repo }
    }

    /// Persist an entry. A storage failure is logged and swallowed so the
    /// request that triggered it still succeeds.
    pub async fn record(&self, entry: AuditEntry) -> Option<AuditLog> {
        let entry = entry.inner;
        info!(
            target: "reportflow::audit",
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = %entry.resource_id,
            user_id = entry.user_id.as_deref().unwrap_or("-"),
            "Audit event"
        );
        match self.repo.append(entry).await {
            Ok(log) => Some(log),
            Err(err) => {
                warn!(error = %err, "Failed to persist audit event");
                None
            }
        }
    }
}
