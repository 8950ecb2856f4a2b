use async_trait::async_trait;
use reportflow_core::types::{AuditLog, AuditQuery};
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::debug;

use super::{AuditLogRepository, NewAuditLog};
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str = "id, organization_id, user_id, action, resource_type, resource_id, \
                       details, ip_address, created_at";

pub struct SqlAuditLogRepository {
    db: Database,
}

impl SqlAuditLogRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<AuditLog, sqlx::Error> {
        Ok(AuditLog {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            user_id: row.try_get("user_id")?,
            action: row.try_get("action")?,
            resource_type: row.try_get("resource_type")?,
            resource_id: row.try_get("resource_id")?,
            details: rows::json(row, "details")?,
            ip_address: row.try_get("ip_address")?,
            created_at: rows::ts(row, "created_at")?,
        })
    }
}

#[async_trait]
impl AuditLogRepository for SqlAuditLogRepository {
    async fn append(&self, entry: NewAuditLog) -> ReportFlowResult<AuditLog> {
        let log = AuditLog {
            id: rows::new_id(),
            organization_id: entry.organization_id,
            user_id: entry.user_id,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            details: entry.details,
            ip_address: entry.ip_address,
            created_at: rows::now(),
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO audit_logs ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(log.id.clone())
            .bind(log.organization_id.clone())
            .bind(log.user_id.clone())
            .bind(log.action.clone())
            .bind(log.resource_type.clone())
            .bind(log.resource_id.clone())
            .bind(serde_json::to_string(&log.details)?)
            .bind(log.ip_address.clone())
            .bind(rows::fmt_ts(&log.created_at))
            .execute(self.db.pool())
            .await
            .db()?;
        debug!(action = %log.action, resource_type = %log.resource_type, "Audit entry appended");
        Ok(log)
    }

    async fn query(&self, filter: &AuditQuery) -> ReportFlowResult<Vec<AuditLog>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        let filters = [
            ("organization_id", &filter.organization_id),
            ("user_id", &filter.user_id),
            ("resource_type", &filter.resource_type),
            ("action", &filter.action),
        ];
        for (column, value) in filters {
            if let Some(value) = value {
                clauses.push(format!("{column} = ?"));
                binds.push(value.clone());
            }
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM audit_logs{where_clause} \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ));

        let page = filter.page();
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let found = query
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM audit_logs")
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
    use serde_json::json;

    fn entry(org: Option<&str>, action: &str, resource_type: &str) -> NewAuditLog {
        NewAuditLog {
            organization_id: org.map(str::to_string),
            user_id: Some("u-1".into()),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: "r-1".into(),
            details: json!({"source": "test"}),
            ip_address: Some("127.0.0.1".into()),
        }
    }

    #[tokio::test]
    async fn test_append_and_query_newest_first() {
        let repo = SqlAuditLogRepository::new(migrated_db().await);
        repo.append(entry(Some("org-a"), "report.create", "report")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        repo.append(entry(Some("org-a"), "report.delete", "report")).await.unwrap();

        let all = repo.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].action, "report.delete");
        assert_eq!(all[1].details["source"], "test");
    }

    #[tokio::test]
    async fn test_query_filters_combine() {
        let repo = SqlAuditLogRepository::new(migrated_db().await);
        repo.append(entry(Some("org-a"), "report.create", "report")).await.unwrap();
        repo.append(entry(Some("org-b"), "report.create", "report")).await.unwrap();
        repo.append(entry(None, "auth.login", "user")).await.unwrap();

        let filter = AuditQuery {
            organization_id: Some("org-a".into()),
            resource_type: Some("report".into()),
            ..Default::default()
        };
        let found = repo.query(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].organization_id.as_deref(), Some("org-a"));

        let logins = repo
            .query(&AuditQuery {
                action: Some("auth.login".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logins.len(), 1);
        assert!(logins[0].organization_id.is_none());
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_query_paginates() {
        let repo = SqlAuditLogRepository::new(migrated_db().await);
        for _ in 0..5 {
            repo.append(entry(None, "setting.update", "setting")).await.unwrap();
        }
        let page = repo
            .query(&AuditQuery {
                limit: 2,
                offset: 4,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
