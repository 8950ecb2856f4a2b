//! Idempotent schema migrations, rendered per provider.

use reportflow_core::ReportFlowResult;
use tracing::info;

use crate::error::DbResultExt;
use crate::provider::{Database, DatabaseProvider};

/// A table definition plus its secondary indexes (`name`, `columns`).
struct TableDef {
    name: &'static str,
    body: String,
    indexes: &'static [(&'static str, &'static str)],
}

fn tables(provider: DatabaseProvider) -> Vec<TableDef> {
    let long_text = provider.long_text_type();
    vec![
        TableDef {
            name: "organizations",
            body: "id VARCHAR(36) NOT NULL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                plan VARCHAR(32) NOT NULL,
                status VARCHAR(32) NOT NULL,
                created_at VARCHAR(40) NOT NULL,
                updated_at VARCHAR(40) NOT NULL"
                .to_string(),
            indexes: &[],
        },
        TableDef {
            name: "roles",
            body: "id VARCHAR(36) NOT NULL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                description VARCHAR(1024) NOT NULL,
                is_system BIGINT NOT NULL DEFAULT 0,
                created_at VARCHAR(40) NOT NULL,
                updated_at VARCHAR(40) NOT NULL"
                .to_string(),
            indexes: &[],
        },
        TableDef {
            name: "permissions",
            body: "id VARCHAR(36) NOT NULL PRIMARY KEY,
                resource VARCHAR(255) NOT NULL,
                action VARCHAR(255) NOT NULL,
                description VARCHAR(1024) NOT NULL,
                created_at VARCHAR(40) NOT NULL,
                UNIQUE (resource, action)"
                .to_string(),
            indexes: &[],
        },
        TableDef {
            name: "role_permissions",
            body: "role_id VARCHAR(36) NOT NULL,
                permission_id VARCHAR(36) NOT NULL,
                PRIMARY KEY (role_id, permission_id),
                FOREIGN KEY (role_id) REFERENCES roles (id) ON DELETE CASCADE,
                FOREIGN KEY (permission_id) REFERENCES permissions (id) ON DELETE CASCADE"
                .to_string(),
            indexes: &[("idx_role_permissions_permission", "permission_id")],
        },
        TableDef {
            name: "users",
            body: "id VARCHAR(36) NOT NULL PRIMARY KEY,
                organization_id VARCHAR(36) NULL,
                role_id VARCHAR(36) NULL,
                email VARCHAR(255) NOT NULL UNIQUE,
                name VARCHAR(255) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                status VARCHAR(32) NOT NULL,
                last_login_at VARCHAR(40) NULL,
                created_at VARCHAR(40) NOT NULL,
                updated_at VARCHAR(40) NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations (id) ON DELETE RESTRICT,
                FOREIGN KEY (role_id) REFERENCES roles (id) ON DELETE SET NULL"
                .to_string(),
            indexes: &[
                ("idx_users_organization", "organization_id"),
                ("idx_users_role", "role_id"),
            ],
        },
        TableDef {
            name: "reports",
            body: format!(
                "id VARCHAR(36) NOT NULL PRIMARY KEY,
                organization_id VARCHAR(36) NOT NULL,
                title VARCHAR(255) NOT NULL,
                description {long_text} NOT NULL,
                status VARCHAR(32) NOT NULL,
                content {long_text} NOT NULL,
                created_by VARCHAR(36) NULL,
                created_at VARCHAR(40) NOT NULL,
                updated_at VARCHAR(40) NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations (id) ON DELETE CASCADE,
                FOREIGN KEY (created_by) REFERENCES users (id) ON DELETE SET NULL"
            ),
            indexes: &[("idx_reports_organization", "organization_id, created_at")],
        },
        TableDef {
            name: "subscriptions",
            body: "id VARCHAR(36) NOT NULL PRIMARY KEY,
                organization_id VARCHAR(36) NOT NULL,
                plan VARCHAR(32) NOT NULL,
                status VARCHAR(32) NOT NULL,
                seats BIGINT NOT NULL,
                current_period_end VARCHAR(40) NULL,
                created_at VARCHAR(40) NOT NULL,
                updated_at VARCHAR(40) NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations (id) ON DELETE CASCADE"
                .to_string(),
            indexes: &[("idx_subscriptions_organization", "organization_id")],
        },
        TableDef {
            name: "settings",
            body: "setting_key VARCHAR(191) NOT NULL PRIMARY KEY,
                setting_value VARCHAR(4096) NOT NULL,
                description VARCHAR(1024) NOT NULL,
                updated_at VARCHAR(40) NOT NULL"
                .to_string(),
            indexes: &[],
        },
        TableDef {
            name: "audit_logs",
            body: format!(
                "id VARCHAR(36) NOT NULL PRIMARY KEY,
                organization_id VARCHAR(36) NULL,
                user_id VARCHAR(36) NULL,
                action VARCHAR(255) NOT NULL,
                resource_type VARCHAR(255) NOT NULL,
                resource_id VARCHAR(255) NOT NULL,
                details {long_text} NOT NULL,
                ip_address VARCHAR(64) NULL,
                created_at VARCHAR(40) NOT NULL"
            ),
            indexes: &[
                ("idx_audit_logs_organization", "organization_id, created_at"),
                ("idx_audit_logs_created", "created_at"),
            ],
        },
    ]
}

/// Render every DDL statement for `provider`, in dependency order.
pub fn statements(provider: DatabaseProvider) -> Vec<String> {
    let mut out = Vec::new();
    for table in tables(provider) {
        let mut body = table.body.clone();
        if provider.inline_indexes() {
            for (name, columns) in table.indexes {
                body.push_str(&format!(",\n                INDEX {name} ({columns})"));
            }
        }
        out.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n                {}\n            ){}",
            table.name,
            body,
            provider.table_options()
        ));
        if !provider.inline_indexes() {
            for (name, columns) in table.indexes {
                out.push(format!(
                    "CREATE INDEX IF NOT EXISTS {name} ON {} ({columns})",
                    table.name
                ));
            }
        }
    }
    out
}

impl Database {
    /// Create all tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> ReportFlowResult<()> {
        let stmts = statements(self.provider());
        for stmt in &stmts {
            sqlx::query(stmt).execute(self.pool()).await.db()?;
        }
        info!(provider = %self.provider(), statements = stmts.len(), "Schema migrations applied");
        Ok(())
    }
}
