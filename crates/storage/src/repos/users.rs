use async_trait::async_trait;
use reportflow_core::types::{Page, User, UserStatus};
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::{NewUser, UserChanges, UserRepository};
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str = "id, organization_id, role_id, email, name, password_hash, status, \
                       last_login_at, created_at, updated_at";

pub struct SqlUserRepository {
    db: Database,
}

impl SqlUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<User, sqlx::Error> {
        Ok(User {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            role_id: row.try_get("role_id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            status: rows::text_enum(row, "status")?,
            last_login_at: rows::opt_ts(row, "last_login_at")?,
            created_at: rows::ts(row, "created_at")?,
            updated_at: rows::ts(row, "updated_at")?,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, new: NewUser) -> ReportFlowResult<User> {
        let now = rows::now();
        let user = User {
            id: rows::new_id(),
            organization_id: new.organization_id,
            role_id: new.role_id,
            email: normalize_email(&new.email),
            name: new.name.trim().to_string(),
            password_hash: new.password_hash,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO users ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(user.id.clone())
            .bind(user.organization_id.clone())
            .bind(user.role_id.clone())
            .bind(user.email.clone())
            .bind(user.name.clone())
            .bind(user.password_hash.clone())
            .bind(user.status.as_str())
            .bind(None::<String>)
            .bind(rows::fmt_ts(&user.created_at))
            .bind(rows::fmt_ts(&user.updated_at))
            .execute(self.db.pool())
            .await
            .db()?;
        info!(user_id = %user.id, email = %user.email, "User created");
        Ok(user)
    }

    async fn get(&self, id: &str) -> ReportFlowResult<Option<User>> {
        let sql = self.db.sql(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"));
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn find_by_email(&self, email: &str) -> ReportFlowResult<Option<User>> {
        let sql = self.db.sql(&format!("SELECT {COLUMNS} FROM users WHERE email = ?"));
        let row = sqlx::query(&sql)
            .bind(normalize_email(email))
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn list(&self, page: Page) -> ReportFlowResult<Vec<User>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ));
        let found = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn list_by_organization(&self, org_id: &str, page: Page) -> ReportFlowResult<Vec<User>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM users WHERE organization_id = ? \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ));
        let found = sqlx::query(&sql)
            .bind(org_id.to_string())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn count_by_organization(&self, org_id: &str) -> ReportFlowResult<i64> {
        let sql = self
            .db
            .sql("SELECT COUNT(*) AS count FROM users WHERE organization_id = ?");
        let row = sqlx::query(&sql)
            .bind(org_id.to_string())
            .fetch_one(self.db.pool())
            .await
            .db()?;
        rows::count(&row).db()
    }

    async fn update(&self, id: &str, changes: UserChanges) -> ReportFlowResult<Option<User>> {
        // Only the supplied columns are written so concurrent login
        // bookkeeping is never clobbered.
        let mut set: Vec<(&str, Option<String>)> = Vec::new();
        if let Some(email) = changes.email {
            set.push(("email", Some(normalize_email(&email))));
        }
        if let Some(name) = changes.name {
            set.push(("name", Some(name.trim().to_string())));
        }
        if let Some(hash) = changes.password_hash {
            set.push(("password_hash", Some(hash)));
        }
        if let Some(org_id) = changes.organization_id {
            set.push(("organization_id", org_id));
        }
        if let Some(role_id) = changes.role_id {
            set.push(("role_id", role_id));
        }
        if let Some(status) = changes.status {
            set.push(("status", Some(status.as_str().to_string())));
        }
        set.push(("updated_at", Some(rows::fmt_ts(&rows::now()))));

        let assignments: Vec<String> = set.iter().map(|(col, _)| format!("{col} = ?")).collect();
        let sql = self.db.sql(&format!(
            "UPDATE users SET {} WHERE id = ?",
            assignments.join(", ")
        ));
        let mut query = sqlx::query(&sql);
        for (_, value) in set {
            query = query.bind(value);
        }
        query
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let user = self.get(id).await?;
        if user.is_some() {
            info!(user_id = %id, "User updated");
        }
        Ok(user)
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> ReportFlowResult<bool> {
        let sql = self
            .db
            .sql("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(password_hash.to_string())
            .bind(rows::fmt_ts(&rows::now()))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: &str) -> ReportFlowResult<()> {
        let sql = self.db.sql("UPDATE users SET last_login_at = ? WHERE id = ?");
        sqlx::query(&sql)
            .bind(rows::fmt_ts(&rows::now()))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> ReportFlowResult<bool> {
        let sql = self.db.sql("DELETE FROM users WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(user_id = %id, "User deleted");
        }
        Ok(removed)
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(self.db.pool())
            .await
            .db()?;
        rows::count(&row).db()
    }
}
