use async_trait::async_trait;
use reportflow_core::requests::UpdateRoleRequest;
use reportflow_core::types::{Page, Permission, Role};
use reportflow_core::{ReportFlowError, ReportFlowResult};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::permissions::{SqlPermissionRepository, QUALIFIED_COLUMNS as PERMISSION_COLUMNS};
use super::RoleRepository;
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str = "id, name, description, is_system, created_at, updated_at";

pub struct SqlRoleRepository {
    db: Database,
}

impl SqlRoleRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<Role, sqlx::Error> {
        Ok(Role {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            is_system: rows::flag(row, "is_system")?,
            created_at: rows::ts(row, "created_at")?,
            updated_at: rows::ts(row, "updated_at")?,
        })
    }

    async fn fetch_one_where(&self, column: &str, value: &str) -> ReportFlowResult<Option<Role>> {
        let sql = self
            .db
            .sql(&format!("SELECT {COLUMNS} FROM roles WHERE {column} = ?"));
        let row = sqlx::query(&sql)
            .bind(value.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn has_pair(&self, role_id: &str, permission_id: &str) -> ReportFlowResult<bool> {
        let sql = self.db.sql(
            "SELECT COUNT(*) AS count FROM role_permissions \
             WHERE role_id = ? AND permission_id = ?",
        );
        let row = sqlx::query(&sql)
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .fetch_one(self.db.pool())
            .await
            .db()?;
        Ok(rows::count(&row).db()? > 0)
    }

    async fn require_role(&self, role_id: &str) -> ReportFlowResult<()> {
        match self.get(role_id).await? {
            Some(_) => Ok(()),
            None => Err(ReportFlowError::not_found("role", role_id)),
        }
    }
}

#[async_trait]
impl RoleRepository for SqlRoleRepository {
    async fn create(
        &self,
        name: &str,
        description: &str,
        is_system: bool,
    ) -> ReportFlowResult<Role> {
        let now = rows::now();
        let role = Role {
            id: rows::new_id(),
            name: name.trim().to_string(),
            description: description.to_string(),
            is_system,
            created_at: now,
            updated_at: now,
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO roles ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(role.id.clone())
            .bind(role.name.clone())
            .bind(role.description.clone())
            .bind(i64::from(role.is_system))
            .bind(rows::fmt_ts(&role.created_at))
            .bind(rows::fmt_ts(&role.updated_at))
            .execute(self.db.pool())
            .await
            .db()?;
        info!(role_id = %role.id, role_name = %role.name, "Role created");
        Ok(role)
    }

    async fn get(&self, id: &str) -> ReportFlowResult<Option<Role>> {
        self.fetch_one_where("id", id).await
    }

    async fn find_by_name(&self, name: &str) -> ReportFlowResult<Option<Role>> {
        self.fetch_one_where("name", name).await
    }

    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Role>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM roles ORDER BY name LIMIT ? OFFSET ?"
        ));
        let found = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn update(&self, id: &str, req: &UpdateRoleRequest) -> ReportFlowResult<Option<Role>> {
        let Some(mut role) = self.get(id).await? else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            role.name = name.trim().to_string();
        }
        if let Some(description) = &req.description {
            role.description = description.clone();
        }
        role.updated_at = rows::now();

        let sql = self
            .db
            .sql("UPDATE roles SET name = ?, description = ?, updated_at = ? WHERE id = ?");
        sqlx::query(&sql)
            .bind(role.name.clone())
            .bind(role.description.clone())
            .bind(rows::fmt_ts(&role.updated_at))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        info!(role_id = %id, "Role updated");
        Ok(Some(role))
    }

    async fn delete(&self, id: &str) -> ReportFlowResult<bool> {
        let sql = self.db.sql("DELETE FROM roles WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(role_id = %id, "Role deleted");
        }
        Ok(removed)
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM roles")
            .fetch_one(self.db.pool())
            .await
            .db()?;
        rows::count(&row).db()
    }

    async fn permissions_of(&self, role_id: &str) -> ReportFlowResult<Vec<Permission>> {
        let sql = self.db.sql(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions p \
             INNER JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = ? ORDER BY p.resource, p.action"
        ));
        let found = sqlx::query(&sql)
            .bind(role_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, SqlPermissionRepository::from_row)
    }

    async fn assign_permission(
        &self,
        role_id: &str,
        permission_id: &str,
    ) -> ReportFlowResult<bool> {
        if self.has_pair(role_id, permission_id).await? {
            return Ok(false);
        }
        let sql = self
            .db
            .sql("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)");
        sqlx::query(&sql)
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        info!(role_id = %role_id, permission_id = %permission_id, "Permission assigned");
        Ok(true)
    }

    async fn revoke_permission(
        &self,
        role_id: &str,
        permission_id: &str,
    ) -> ReportFlowResult<bool> {
        let sql = self
            .db
            .sql("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?");
        let result = sqlx::query(&sql)
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(role_id = %role_id, permission_id = %permission_id, "Permission revoked");
        }
        Ok(removed)
    }

    async fn set_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> ReportFlowResult<()> {
        self.require_role(role_id).await?;

        let mut unique: Vec<&String> = Vec::with_capacity(permission_ids.len());
        for id in permission_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        let delete_sql = self.db.sql("DELETE FROM role_permissions WHERE role_id = ?");
        let insert_sql = self
            .db
            .sql("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)");

        let mut tx = self.db.pool().begin().await.db()?;
        sqlx::query(&delete_sql)
            .bind(role_id.to_string())
            .execute(&mut *tx)
            .await
            .db()?;
        for permission_id in &unique {
            sqlx::query(&insert_sql)
                .bind(role_id.to_string())
                .bind((*permission_id).clone())
                .execute(&mut *tx)
                .await
                .db()?;
        }
        tx.commit().await.db()?;

        info!(role_id = %role_id, permissions = unique.len(), "Role permissions replaced");
        Ok(())
    }
}
