use async_trait::async_trait;
use reportflow_core::requests::CreatePermissionRequest;
use reportflow_core::types::{Page, Permission};
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::PermissionRepository;
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str = "id, resource, action, description, created_at";
pub(super) const QUALIFIED_COLUMNS: &str =
    "p.id, p.resource, p.action, p.description, p.created_at";

pub struct SqlPermissionRepository {
    db: Database,
}

impl SqlPermissionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub(super) fn from_row(row: &AnyRow) -> Result<Permission, sqlx::Error> {
        Ok(Permission {
            id: row.try_get("id")?,
            resource: row.try_get("resource")?,
            action: row.try_get("action")?,
            description: row.try_get("description")?,
            created_at: rows::ts(row, "created_at")?,
        })
    }
}

#[async_trait]
impl PermissionRepository for SqlPermissionRepository {
    async fn create(&self, req: &CreatePermissionRequest) -> ReportFlowResult<Permission> {
        let permission = Permission {
            id: rows::new_id(),
            resource: req.resource.trim().to_string(),
            action: req.action.trim().to_string(),
            description: req.description.clone(),
            created_at: rows::now(),
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO permissions ({COLUMNS}) VALUES (?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(permission.id.clone())
            .bind(permission.resource.clone())
            .bind(permission.action.clone())
            .bind(permission.description.clone())
            .bind(rows::fmt_ts(&permission.created_at))
            .execute(self.db.pool())
            .await
            .db()?;
        info!(permission = %permission.key(), "Permission created");
        Ok(permission)
    }

    async fn get(&self, id: &str) -> ReportFlowResult<Option<Permission>> {
        let sql = self
            .db
            .sql(&format!("SELECT {COLUMNS} FROM permissions WHERE id = ?"));
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn find(&self, resource: &str, action: &str) -> ReportFlowResult<Option<Permission>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM permissions WHERE resource = ? AND action = ?"
        ));
        let row = sqlx::query(&sql)
            .bind(resource.to_string())
            .bind(action.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Permission>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM permissions ORDER BY resource, action LIMIT ? OFFSET ?"
        ));
        let found = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn update_description(
        &self,
        id: &str,
        description: &str,
    ) -> ReportFlowResult<Option<Permission>> {
        let sql = self
            .db
            .sql("UPDATE permissions SET description = ? WHERE id = ?");
        sqlx::query(&sql)
            .bind(description.to_string())
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        self.get(id).await
    }

    async fn delete(&self, id: &str) -> ReportFlowResult<bool> {
        let sql = self.db.sql("DELETE FROM permissions WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(permission_id = %id, "Permission deleted");
        }
        Ok(removed)
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM permissions")
            .fetch_one(self.db.pool())
            .await
            .db()?;
        rows::count(&row).db()
    }

    async fn for_user(&self, user_id: &str) -> ReportFlowResult<Vec<Permission>> {
        let sql = self.db.sql(&format!(
            "SELECT {QUALIFIED_COLUMNS} FROM permissions p \
             INNER JOIN role_permissions rp ON rp.permission_id = p.id \
             INNER JOIN users u ON u.role_id = rp.role_id \
             WHERE u.id = ? ORDER BY p.resource, p.action"
        ));
        let found = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::{
        NewUser, RoleRepository, SqlRoleRepository, SqlUserRepository, UserRepository,
    };
    use crate::test_support::migrated_db;
    use reportflow_core::ReportFlowError;

    fn req(resource: &str, action: &str) -> CreatePermissionRequest {
        CreatePermissionRequest {
            resource: resource.into(),
            action: action.into(),
            description: format!("{action} {resource}"),
        }
    }

    #[tokio::test]
    async fn test_create_find_and_conflict() {
        let repo = SqlPermissionRepository::new(migrated_db().await);
        let created = repo.create(&req("reports", "read")).await.unwrap();
        assert_eq!(created.key(), "reports:read");

        let found = repo.find("reports", "read").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.find("reports", "write").await.unwrap().is_none());

        let err = repo.create(&req("reports", "read")).await.unwrap_err();
        assert!(matches!(err, ReportFlowError::Conflict(_)));
        // Same action on another resource is a different pair.
        repo.create(&req("users", "read")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_description_and_delete() {
        let repo = SqlPermissionRepository::new(migrated_db().await);
        let created = repo.create(&req("reports", "read")).await.unwrap();
        let updated = repo
            .update_description(&created.id, "View reports")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.description, "View reports");
        assert!(repo.update_description("missing", "x").await.unwrap().is_none());

        assert!(repo.delete(&created.id).await.unwrap());
        assert!(repo.list(Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_for_user_follows_role() {
        let db = migrated_db().await;
        let perms = SqlPermissionRepository::new(db.clone());
        let roles = SqlRoleRepository::new(db.clone());
        let users = SqlUserRepository::new(db);

        let read = perms.create(&req("reports", "read")).await.unwrap();
        perms.create(&req("reports", "write")).await.unwrap();
        let role = roles.create("viewer", "", false).await.unwrap();
        roles.assign_permission(&role.id, &read.id).await.unwrap();

        let user = users
            .create(NewUser {
                email: "v@example.com".into(),
                name: "Viewer".into(),
                password_hash: "x".into(),
                organization_id: None,
                role_id: Some(role.id.clone()),
            })
            .await
            .unwrap();
        let granted = perms.for_user(&user.id).await.unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].key(), "reports:read");

        // Deleting the role leaves the user without permissions.
        roles.delete(&role.id).await.unwrap();
        assert!(perms.for_user(&user.id).await.unwrap().is_empty());
        assert!(users.get(&user.id).await.unwrap().unwrap().role_id.is_none());
    }
}
