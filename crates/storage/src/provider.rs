//! Database provider detection and connection factory.
//!
//! One `AnyPool` type serves SQLite, MySQL, and Postgres; the provider
//! decides the dialect details the Any driver does not paper over
//! (placeholder style, column types, index DDL).

use std::str::FromStr;
use std::time::Duration;

use reportflow_core::config::DatabaseConfig;
use reportflow_core::{ReportFlowError, ReportFlowResult};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{info, warn};

use crate::error::DbResultExt;

/// Supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProvider {
    Sqlite,
    MySql,
    Postgres,
}

impl DatabaseProvider {
    /// Detect the provider from a connection URL scheme.
    pub fn from_url(url: &str) -> ReportFlowResult<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| ReportFlowError::Config(format!("database url has no scheme: {url}")))?;
        scheme.parse()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Rewrite `?` placeholders into the provider's native style.
    /// Queries in this crate never contain literal question marks.
    pub fn rewrite_placeholders(&self, query: &str) -> String {
        match self {
            Self::Sqlite | Self::MySql => query.to_string(),
            Self::Postgres => {
                let mut out = String::with_capacity(query.len() + 8);
                let mut n = 0;
                for c in query.chars() {
                    if c == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }

    /// Column type for unbounded text (report content, audit details).
    pub fn long_text_type(&self) -> &'static str {
        match self {
            Self::MySql => "MEDIUMTEXT",
            Self::Sqlite | Self::Postgres => "TEXT",
        }
    }

    /// Whether secondary indexes are declared inline in `CREATE TABLE`
    /// (MySQL lacks `CREATE INDEX IF NOT EXISTS`).
    pub fn inline_indexes(&self) -> bool {
        matches!(self, Self::MySql)
    }

    /// Trailing table options.
    pub fn table_options(&self) -> &'static str {
        match self {
            Self::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            Self::Sqlite | Self::Postgres => "",
        }
    }
}

impl FromStr for DatabaseProvider {
    type Err = ReportFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ReportFlowError::Config(format!(
                "unsupported database provider '{other}' (expected sqlite, mysql, or postgres)"
            ))),
        }
    }
}

impl std::fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection pool plus the provider it talks to.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    provider: DatabaseProvider,
}

impl Database {
    /// Open a pool for the configured URL.
    pub async fn connect(config: &DatabaseConfig) -> ReportFlowResult<Self> {
        let provider = DatabaseProvider::from_url(&config.url)?;
        sqlx::any::install_default_drivers();

        let in_memory = provider == DatabaseProvider::Sqlite && config.url.contains(":memory:");
        let max_connections = if in_memory {
            if config.max_connections > 1 {
                warn!("In-memory SQLite is pinned to a single connection");
            }
            1
        } else {
            config.max_connections.max(1)
        };

        let mut options = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

        if in_memory {
            // Every new connection would see an empty database.
            options = options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        if provider == DatabaseProvider::Sqlite {
            options = options.after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            });
        }

        let pool = options.connect(&config.url).await.db()?;
        info!(provider = %provider, max_connections, "Database pool connected");

        Ok(Self { pool, provider })
    }

    pub fn provider(&self) -> DatabaseProvider {
        self.provider
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Prepare a `?`-placeholder query for this provider.
    pub fn sql(&self, query: &str) -> String {
        self.provider.rewrite_placeholders(query)
    }

    /// Readiness probe: `SELECT 1`.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
