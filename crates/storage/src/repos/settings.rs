use async_trait::async_trait;
use reportflow_core::types::Setting;
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::info;

use super::SettingRepository;
use crate::error::DbResultExt;
use crate::provider::Database;
use crate::rows;

const COLUMNS: &str = "setting_key, setting_value, description, updated_at";

pub struct SqlSettingRepository {
    db: Database,
}

impl SqlSettingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &AnyRow) -> Result<Setting, sqlx::Error> {
        Ok(Setting {
            key: row.try_get("setting_key")?,
            value: row.try_get("setting_value")?,
            description: row.try_get("description")?,
            updated_at: rows::ts(row, "updated_at")?,
        })
    }

    async fn insert(&self, setting: &Setting) -> ReportFlowResult<()> {
        let sql = self.db.sql(&format!(
            "INSERT INTO settings ({COLUMNS}) VALUES (?, ?, ?, ?)"
        ));
        sqlx::query(&sql)
            .bind(setting.key.clone())
            .bind(setting.value.clone())
            .bind(setting.description.clone())
            .bind(rows::fmt_ts(&setting.updated_at))
            .execute(self.db.pool())
            .await
            .db()?;
        Ok(())
    }
}

#[async_trait]
impl SettingRepository for SqlSettingRepository {
    async fn list(&self) -> ReportFlowResult<Vec<Setting>> {
        let sql = format!("SELECT {COLUMNS} FROM settings ORDER BY setting_key");
        let found = sqlx::query(&sql)
            .fetch_all(self.db.pool())
            .await
            .db()?;
        rows::decode_all(&found, Self::from_row)
    }

    async fn get(&self, key: &str) -> ReportFlowResult<Option<Setting>> {
        let sql = self
            .db
            .sql(&format!("SELECT {COLUMNS} FROM settings WHERE setting_key = ?"));
        let row = sqlx::query(&sql)
            .bind(key.to_string())
            .fetch_optional(self.db.pool())
            .await
            .db()?;
        rows::decode_opt(row, Self::from_row)
    }

    async fn upsert(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> ReportFlowResult<Setting> {
        let now = rows::now();
        match self.get(key).await? {
            Some(mut existing) => {
                existing.value = value.to_string();
                if let Some(description) = description {
                    existing.description = description.to_string();
                }
                existing.updated_at = now;
                let sql = self.db.sql(
                    "UPDATE settings SET setting_value = ?, description = ?, updated_at = ? \
                     WHERE setting_key = ?",
                );
                sqlx::query(&sql)
                    .bind(existing.value.clone())
                    .bind(existing.description.clone())
                    .bind(rows::fmt_ts(&existing.updated_at))
                    .bind(key.to_string())
                    .execute(self.db.pool())
                    .await
                    .db()?;
                info!(key = %key, "Setting updated");
                Ok(existing)
            }
            None => {
                let setting = Setting {
                    key: key.to_string(),
                    value: value.to_string(),
                    description: description.unwrap_or_default().to_string(),
                    updated_at: now,
                };
                self.insert(&setting).await?;
                info!(key = %key, "Setting created");
                Ok(setting)
            }
        }
    }

    async fn insert_if_missing(
        &self,
        key: &str,
        value: &str,
        description: &str,
    ) -> ReportFlowResult<bool> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.insert(&Setting {
            key: key.to_string(),
            value: value.to_string(),
            description: description.to_string(),
            updated_at: rows::now(),
        })
        .await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> ReportFlowResult<bool> {
        let sql = self.db.sql("DELETE FROM settings WHERE setting_key = ?");
        let result = sqlx::query(&sql)
            .bind(key.to_string())
            .execute(self.db.pool())
            .await
            .db()?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(key = %key, "Setting deleted");
        }
        Ok(removed)
    }
}
