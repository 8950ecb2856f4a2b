use async_trait::async_trait;
use reportflow_core::requests::{CreateOrganizationRequest, UpdateOrganizationRequest};
use reportflow_core::types::{Organization, OrganizationStatus, Page};
use reportflow_core::{ReportFlowError, ReportFlowResult};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::OrganizationRepository;
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str = "id, name, slug, plan, status, created_at, updated_at";

pub struct SqlOrganizationRepository {
    db: Database,
}

impl SqlOrganizationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<Organization, sqlx::Error> {
        Ok(Organization {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            plan: rows::text_enum(row, "plan")?,
            status: rows::text_enum(row, "status")?,
            created_at: rows::ts(row, "created_at")?,
            updated_at: rows::ts(row, "updated_at")?,
        })
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        value: &str,
    ) -> ReportFlowResult<Option<Organization>> {
        let sql = self
            .db
            .sql(&format!("SELECT {COLUMNS} FROM organizations WHERE {clause} = ?"));
        let row = sqlx::query(&sql)
            .bind(value.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }
}

#[async_trait]
impl OrganizationRepository for SqlOrganizationRepository {
    async fn create(&self, req: &CreateOrganizationRequest) -> ReportFlowResult<Organization> {
        let now = rows::now();
        let org = Organization {
            id: rows::new_id(),
            name: req.name.trim().to_string(),
            slug: req.resolved_slug(),
            plan: req.plan.unwrap_or_default(),
            status: OrganizationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO organizations ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(org.id.clone())
            .bind(org.name.clone())
            .bind(org.slug.clone())
            .bind(org.plan.as_str())
            .bind(org.status.as_str())
            .bind(rows::fmt_ts(&org.created_at))
            .bind(rows::fmt_ts(&org.updated_at))
            .execute(self.db.pool())
            .await
            .db()?;
        info!(organization_id = %org.id, slug = %org.slug, "Organization created");
        Ok(org)
    }

    async fn get(&self, id: &str) -> ReportFlowResult<Option<Organization>> {
        self.fetch_one_where("id", id).await
    }

    async fn find_by_slug(&self, slug: &str) -> ReportFlowResult<Option<Organization>> {
        self.fetch_one_where("slug", slug).await
    }

    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Organization>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM organizations ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ));
        let found = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn update(
        &self,
        id: &str,
        req: &UpdateOrganizationRequest,
    ) -> ReportFlowResult<Option<Organization>> {
        let Some(mut org) = self.get(id).await? else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            org.name = name.trim().to_string();
        }
        if let Some(slug) = &req.slug {
            org.slug = slug.clone();
        }
        if let Some(plan) = req.plan {
            org.plan = plan;
        }
        if let Some(status) = req.status {
            org.status = status;
        }
        org.updated_at = rows::now();

        let sql = self.db.sql(
            "UPDATE organizations SET name = ?, slug = ?, plan = ?, status = ?, updated_at = ? \
             WHERE id = ?",
        );
        sqlx::query(&sql)
            .bind(org.name.clone())
            .bind(org.slug.clone())
            .bind(org.plan.as_str())
            .bind(org.status.as_str())
            .bind(rows::fmt_ts(&org.updated_at))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        info!(organization_id = %id, "Organization updated");
        Ok(Some(org))
    }

    /// Refused with `Conflict` while users still belong to the organization.
    async fn delete(&self, id: &str) -> ReportFlowResult<bool> {
        let sql = self
            .db
            .sql("SELECT COUNT(*) AS count FROM users WHERE organization_id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_one(self.db.pool())
            .await
            .db()?;
        let members = rows::count(&row).db()?;
        if members > 0 {
            return Err(ReportFlowError::Conflict(format!(
                "organization still has {members} user(s)"
            )));
        }

        let sql = self.db.sql("DELETE FROM organizations WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(organization_id = %id, "Organization deleted");
        }
        Ok(removed)
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM organizations")
            .fetch_one(self.db.pool())
            .await
            .db()?;
        rows::count(&row).db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::migrated_db;
    use reportflow_core::types::Plan;
    use crate::repos::{NewUser, SqlUserRepository, UserRepository};

    fn create_req(name: &str) -> CreateOrganizationRequest {
        CreateOrganizationRequest {
            name: name.into(),
            slug: None,
            plan: Some(Plan::Starter),
        }
    }

    #[tokio::test]
    async fn test_create_get_and_find_by_slug() {
        let repo = SqlOrganizationRepository::new(migrated_db().await);
        let org = repo.create(&create_req("Acme Corp")).await.unwrap();
        assert_eq!(org.slug, "acme-corp");
        assert_eq!(org.plan, Plan::Starter);

        let fetched = repo.get(&org.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Acme Corp");
        assert_eq!(fetched.created_at, org.created_at);

        let by_slug = repo.find_by_slug("acme-corp").await.unwrap().unwrap();
        assert_eq!(by_slug.id, org.id);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let repo = SqlOrganizationRepository::new(migrated_db().await);
        repo.create(&create_req("Acme Corp")).await.unwrap();
        let err = repo.create(&create_req("Acme  Corp!")).await.unwrap_err();
        assert!(matches!(err, ReportFlowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = SqlOrganizationRepository::new(migrated_db().await);
        let org = repo.create(&create_req("Hobby Shop")).await.unwrap();

        let updated = repo
            .update(
                &org.id,
                &UpdateOrganizationRequest {
                    status: Some(OrganizationStatus::Suspended),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrganizationStatus::Suspended);
        assert_eq!(updated.name, "Hobby Shop");
        assert!(repo
            .update("missing", &UpdateOrganizationRequest::default())
            .await
            .unwrap()
            .is_none());

        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.delete(&org.id).await.unwrap());
        assert!(!repo.delete(&org.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_refused_while_members_remain() {
        let db = migrated_db().await;
        let repo = SqlOrganizationRepository::new(db.clone());
        let users = SqlUserRepository::new(db);
        let org = repo.create(&create_req("Occupied")).await.unwrap();
        let member = users
            .create(NewUser {
                email: "member@occupied.io".into(),
                name: "Member".into(),
                password_hash: "x".into(),
                organization_id: Some(org.id.clone()),
                role_id: None,
            })
            .await
            .unwrap();

        let err = repo.delete(&org.id).await.unwrap_err();
        assert!(matches!(err, ReportFlowError::Conflict(_)));
        assert!(repo.get(&org.id).await.unwrap().is_some());

        assert!(users.delete(&member.id).await.unwrap());
        assert!(repo.delete(&org.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = SqlOrganizationRepository::new(migrated_db().await);
        for name in ["One", "Two", "Three"] {
            repo.create(&create_req(name)).await.unwrap();
        }
        assert_eq!(repo.list(Page::default()).await.unwrap().len(), 3);
        assert_eq!(repo.list(Page::new(2, 0)).await.unwrap().len(), 2);
        assert_eq!(repo.list(Page::new(2, 2)).await.unwrap().len(), 1);
    }
}
