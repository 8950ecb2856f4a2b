use async_trait::async_trait;
use reportflow_core::requests::{CreateSubscriptionRequest, UpdateSubscriptionRequest};
use reportflow_core::types::{Page, Subscription, SubscriptionStatus};
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::SubscriptionRepository;
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str =
    "id, organization_id, plan, status, seats, current_period_end, created_at, updated_at";

pub struct SqlSubscriptionRepository {
    db: Database,
}

impl SqlSubscriptionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<Subscription, sqlx::Error> {
        Ok(Subscription {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            plan: rows::text_enum(row, "plan")?,
            status: rows::text_enum(row, "status")?,
            seats: row.try_get("seats")?,
            current_period_end: rows::opt_ts(row, "current_period_end")?,
            created_at: rows::ts(row, "created_at")?,
            updated_at: rows::ts(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl SubscriptionRepository for SqlSubscriptionRepository {
    async fn create(&self, req: &CreateSubscriptionRequest) -> ReportFlowResult<Subscription> {
        let now = rows::now();
        let subscription = Subscription {
            id: rows::new_id(),
            organization_id: req.organization_id.clone(),
            plan: req.plan,
            status: req.status.unwrap_or(SubscriptionStatus::Trialing),
            seats: req.seats,
            current_period_end: req.current_period_end,
            created_at: now,
            updated_at: now,
        };
        let sql = self.db.sql(&format!(
            "INSERT INTO subscriptions ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(subscription.id.clone())
            .bind(subscription.organization_id.clone())
            .bind(subscription.plan.as_str())
            .bind(subscription.status.as_str())
            .bind(subscription.seats)
            .bind(rows::fmt_opt_ts(&subscription.current_period_end))
            .bind(rows::fmt_ts(&subscription.created_at))
            .bind(rows::fmt_ts(&subscription.updated_at))
            .execute(self.db.pool())
            .await
            .db()?;
        info!(
            subscription_id = %subscription.id,
            organization_id = %subscription.organization_id,
            plan = %subscription.plan,
            "Subscription created"
        );
        Ok(subscription)
    }

    async fn get(&self, id: &str) -> ReportFlowResult<Option<Subscription>> {
        let sql = self
            .db
            .sql(&format!("SELECT {COLUMNS} FROM subscriptions WHERE id = ?"));
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn list(&self, page: Page) -> ReportFlowResult<Vec<Subscription>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM subscriptions ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ));
        let found = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn current_for_organization(
        &self,
        org_id: &str,
    ) -> ReportFlowResult<Option<Subscription>> {
        let sql = self.db.sql(&format!(
            "SELECT {COLUMNS} FROM subscriptions WHERE organization_id = ? \
             ORDER BY created_at DESC, id"
        ));
        let found = sqlx::query(&sql)
            .bind(org_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .db()?;
        let all = rows::decode_all(&found, Self::from_row)?;
        let current = all
            .iter()
            .find(|s| s.status != SubscriptionStatus::Cancelled)
            .or_else(|| all.first())
            .cloned();
        Ok(current)
    }

    async fn update(
        &self,
        id: &str,
        req: &UpdateSubscriptionRequest,
    ) -> ReportFlowResult<Option<Subscription>> {
        let Some(mut subscription) = self.get(id).await? else {
            return Ok(None);
        };
        if let Some(plan) = req.plan {
            subscription.plan = plan;
        }
        if let Some(status) = req.status {
            subscription.status = status;
        }
        if let Some(seats) = req.seats {
            subscription.seats = seats;
        }
        if let Some(end) = req.current_period_end {
            subscription.current_period_end = Some(end);
        }
        subscription.updated_at = rows::now();

        let sql = self.db.sql(
            "UPDATE subscriptions SET plan = ?, status = ?, seats = ?, current_period_end = ?, \
             updated_at = ? WHERE id = ?",
        );
        sqlx::query(&sql)
            .bind(subscription.plan.as_str())
            .bind(subscription.status.as_str())
            .bind(subscription.seats)
            .bind(rows::fmt_opt_ts(&subscription.current_period_end))
            .bind(rows::fmt_ts(&subscription.updated_at))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        info!(subscription_id = %id, status = %subscription.status, "Subscription updated");
        Ok(Some(subscription))
    }

    async fn delete(&self, id: &str) -> ReportFlowResult<bool> {
        let sql = self.db.sql("DELETE FROM subscriptions WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> ReportFlowResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM subscriptions")
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
    use reportflow_core::types::Plan;
    use reportflow_core::ReportFlowError;

    async fn setup() -> (SqlSubscriptionRepository, SqlOrganizationRepository, String) {
        let db = migrated_db().await;
        let orgs = SqlOrganizationRepository::new(db.clone());
        let org = orgs
            .create(&CreateOrganizationRequest {
                name: "Acme".into(),
                slug: None,
                plan: None,
            })
            .await
            .unwrap();
        (SqlSubscriptionRepository::new(db), orgs, org.id)
    }

    fn req(org_id: &str, plan: Plan) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            organization_id: org_id.into(),
            plan,
            status: None,
            seats: 5,
            current_period_end: None,
        }
    }

    #[tokio::test]
    async fn test_current_prefers_non_cancelled() {
        let (repo, _, org) = setup().await;
        assert!(repo.current_for_organization(&org).await.unwrap().is_none());

        let first = repo.create(&req(&org, Plan::Starter)).await.unwrap();
        assert_eq!(first.status, SubscriptionStatus::Trialing);
        let second = repo.create(&req(&org, Plan::Professional)).await.unwrap();

        repo.update(
            &second.id,
            &UpdateSubscriptionRequest {
                status: Some(SubscriptionStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let current = repo.current_for_organization(&org).await.unwrap().unwrap();
        assert_eq!(current.id, first.id);

        repo.update(
            &first.id,
            &UpdateSubscriptionRequest {
                status: Some(SubscriptionStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        // Everything cancelled: the newest record is still reported.
        let current = repo.current_for_organization(&org).await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
    }

    #[tokio::test]
    async fn test_subscription_requires_organization() {
        let (repo, _, _) = setup().await;
        let err = repo.create(&req("missing", Plan::Free)).await.unwrap_err();
        assert!(matches!(err, ReportFlowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deleting_organization_cascades() {
        let (repo, orgs, org) = setup().await;
        let sub = repo.create(&req(&org, Plan::Enterprise)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(orgs.delete(&org).await.unwrap());
        assert!(repo.get(&sub.id).await.unwrap().is_none());
    }
}
