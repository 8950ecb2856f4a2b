use async_trait::async_trait;
use reportflow_core::requests::{CreateReportRequest, UpdateReportRequest};
use reportflow_core::types::{Page, Report, ReportStatus};
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::ReportRepository;
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str =
    "id, organization_id, title, description, status, content, created_by, created_at, updated_at";

pub struct SqlReportRepository {
    db: Database,
}

impl SqlReportRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<Report, sqlx::Error> {
        Ok(Report {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: rows::text_enum(row, "status")?,
            content: rows::json(row, "content")?,
            created_by: row.try_get("created_by")?,
            created_at: rows::ts(row, "created_at")?,
            updated_at: rows::ts(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl ReportRepository for SqlReportRepository {
    async fn create(
        &self,
        org_id: &str,
        created_by: Option<&str>,
        req: &CreateReportRequest,
    ) -> ReportFlowResult<Report> {
        let now = rows::now();
        let report = Report {
            id: rows::new_id(),
            organization_id: org_id.to_string(),
            title: req.title.trim().to_string(),
            description: req.description.clone(),
            status: req.status.unwrap_or(ReportStatus::Draft),
            content: req.content.clone(),
            created_by: created_by.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO reports ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(report.id.clone())
            .bind(report.organization_id.clone())
            .bind(report.title.clone())
            .bind(report.description.clone())
            .bind(report.status.as_str())
            .bind(serde_json::to_string(&report.content)?)
            .bind(report.created_by.clone())
            .bind(rows::fmt_ts(&report.created_at))
            .bind(rows::fmt_ts(&report.updated_at))
            .execute(self.db.pool())
            .await
            .db()?;
        info!(report_id = %report.id, organization_id = %org_id, "Report created");
        Ok(report)
    }

    async fn get_for_organization(
        &self,
        org_id: &str,
        id: &str,
    ) -> ReportFlowResult<Option<Report>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM reports WHERE organization_id = ? AND id = ?"
        ));
        let row = sqlx::query(&sql)
            .bind(org_id.to_string())
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn list_for_organization(
        &self,
        org_id: &str,
        page: Page,
    ) -> ReportFlowResult<Vec<Report>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM reports WHERE organization_id = ? \
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

    async fn update(
        &self,
        org_id: &str,
        id: &str,
        req: &UpdateReportRequest,
    ) -> ReportFlowResult<Option<Report>> {
        let Some(mut report) = self.get_for_organization(org_id, id).await? else {
            return Ok(None);
        };
        if let Some(title) = &req.title {
            report.title = title.trim().to_string();
        }
        if let Some(description) = &req.description {
            report.description = description.clone();
        }
        if let Some(status) = req.status {
            report.status = status;
        }
        if let Some(content) = &req.content {
            report.content = content.clone();
        }
        report.updated_at = rows::now();

        let sql = self.db.sql(
            "UPDATE reports SET title = ?, description = ?, status = ?, content = ?, updated_at = ? \
             WHERE organization_id = ? AND id = ?",
        );
        sqlx::query(&sql)
            .bind(report.title.clone())
            .bind(report.description.clone())
            .bind(report.status.as_str())
            .bind(serde_json::to_string(&report.content)?)
            .bind(rows::fmt_ts(&report.updated_at))
            .bind(org_id.to_string())
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        info!(report_id = %id, "Report updated");
        Ok(Some(report))
    }

    async fn delete(&self, org_id: &str, id: &str) -> ReportFlowResult<bool> {
        let sql = self
            .db
            .sql("DELETE FROM reports WHERE organization_id = ? AND id = ?");
        let result = sqlx::query(&sql)
            .bind(org_id.to_string())
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(report_id = %id, "Report deleted");
        }
        Ok(removed)
    }

    async fn count_by_status(&self, org_id: &str) -> ReportFlowResult<Vec<(ReportStatus, i64)>> {
        let sql = self.db.sql(
            "SELECT status, COUNT(*) AS count FROM reports WHERE organization_id = ? \
             GROUP BY status ORDER BY status",
        );
        let found = sqlx::query(&sql)
            .bind(org_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        found
            .iter()
            .map(|row| Ok((rows::text_enum::<ReportStatus>(row, "status")?, rows::count(row)?)))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .db()
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM reports")
            .fetch_one(self.db.pool())
            .await
            .db()?;
        rows::count(&row).db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::{OrganizationRepository, SqlOrganizationRepository};
    use crate::test_support::migrated_db;
    use reportflow_core::requests::CreateOrganizationRequest;

    async fn setup() -> (SqlReportRepository, String, String) {
        let db = migrated_db().await;
        let orgs = SqlOrganizationRepository::new(db.clone());
        let mut ids = Vec::new();
        for name in ["Acme", "Globex"] {
            let org = orgs
                .create(&CreateOrganizationRequest {
                    name: name.into(),
                    slug: None,
                    plan: None,
                })
                .await
                .unwrap();
            ids.push(org.id);
        }
        let globex = ids.pop().unwrap();
        let acme = ids.pop().unwrap();
        (SqlReportRepository::new(db), acme, globex)
    }

    fn report(title: &str) -> CreateReportRequest {
        CreateReportRequest {
            title: title.into(),
            description: String::new(),
            status: None,
            content: serde_json::json!({"widgets": [{"kind": "chart"}]}),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back_content() {
        let (repo, acme, _) = setup().await;
        let created = repo.create(&acme, None, &report("Q1 revenue")).await.unwrap();
        assert_eq!(created.status, ReportStatus::Draft);

        let fetched = repo.get_for_organization(&acme, &created.id).await.unwrap().unwrap();
        assert_eq!(fetched.content["widgets"][0]["kind"], "chart");
        assert!(fetched.created_by.is_none());
    }

    #[tokio::test]
    async fn test_reports_are_isolated_per_organization() {
        let (repo, acme, globex) = setup().await;
        let created = repo.create(&acme, None, &report("Acme only")).await.unwrap();

        assert!(repo.get_for_organization(&globex, &created.id).await.unwrap().is_none());
        assert!(repo
            .update(&globex, &created.id, &UpdateReportRequest::default())
            .await
            .unwrap()
            .is_none());
        assert!(!repo.delete(&globex, &created.id).await.unwrap());
        assert!(repo
            .list_for_organization(&globex, Page::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.list_for_organization(&acme, Page::default()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_and_count_by_status() {
        let (repo, acme, _) = setup().await;
        let a = repo.create(&acme, None, &report("A")).await.unwrap();
        repo.create(&acme, None, &report("B")).await.unwrap();

        let published = repo
            .update(
                &acme,
                &a.id,
                &UpdateReportRequest {
                    status: Some(ReportStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.status, ReportStatus::Published);
        assert_eq!(published.title, "A");

        let counts = repo.count_by_status(&acme).await.unwrap();
        assert!(counts.contains(&(ReportStatus::Draft, 1)));
        assert!(counts.contains(&(ReportStatus::Published, 1)));
        assert_eq!(repo.count().await.unwrap(), 2);

        assert!(repo.delete(&acme, &a.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
