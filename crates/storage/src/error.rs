//! Mapping from `sqlx` errors into the shared error taxonomy.

use reportflow_core::{ReportFlowError, ReportFlowResult};
use tracing::error;

/// Convert a driver error, classifying constraint violations.
pub fn map_sqlx(err: sqlx::Error) -> ReportFlowError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ReportFlowError::Conflict("a record with the same unique value already exists".into())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() || is_restrict(&**db) => {
            ReportFlowError::Conflict(
                "operation violates a reference to or from another record".into(),
            )
        }
        sqlx::Error::RowNotFound => ReportFlowError::not_found("row", "query"),
        _ => {
            error!(error = %err, "Database operation failed");
            ReportFlowError::Database(err.to_string())
        }
    }
}

/// `ON DELETE RESTRICT` surfaces as SQLITE_CONSTRAINT_TRIGGER (1811) on
/// SQLite and restrict_violation (23001) on Postgres, neither of which the
/// driver classifies as a foreign key error.
fn is_restrict(db: &dyn sqlx::error::DatabaseError) -> bool {
    matches!(db.code().as_deref(), Some("1811") | Some("23001"))
}

pub trait DbResultExt<T> {
    fn db(self) -> ReportFlowResult<T>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn db(self) -> ReportFlowResult<T> {
        self.map_err(map_sqlx)
    }
}
