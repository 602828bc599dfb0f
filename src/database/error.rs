use thiserror::Error;

/// Classified database failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
}

#[derive(Debug, Clone, Error)]
pub enum DatabaseErrorKind {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("database connection failure: {message}")]
    Connection { message: String },

    #[error("query failed: {message}")]
    Query { message: String },

    #[error("migration failed: {message}")]
    Migration { message: String },

    #[error("database error: {message}")]
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &DatabaseErrorKind {
        &self.kind
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::UniqueViolation { .. })
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseErrorKind::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::Connection {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Migrate(_) => DatabaseErrorKind::Migration {
                message: err.to_string(),
            },
            _ => DatabaseErrorKind::Query {
                message: err.to_string(),
            },
        };

        Self { kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_classified() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err.kind(), DatabaseErrorKind::NotFound { .. }));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn display_includes_kind_detail() {
        let err = DatabaseError::new(DatabaseErrorKind::UniqueViolation {
            constraint: "idx_payments_completed_provider_txn".to_string(),
        });
        assert!(err.to_string().contains("idx_payments_completed_provider_txn"));
        assert!(err.is_unique_violation());
    }
}
