use crate::database::error::DatabaseError;
use crate::payments::types::{Provider, SessionStatus};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const SESSION_COLUMNS: &str = "correlation_id, plan_id, user_id, provider, requested_amount, \
                               requested_currency, status, created_at, expires_at";

/// Payment session entity
///
/// The durable record of one payment attempt, keyed by the provider-issued
/// correlation identifier. Rows are never deleted, only transitioned.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentSession {
    pub correlation_id: String,
    pub plan_id: String,
    pub user_id: Uuid,
    pub provider: String,
    pub requested_amount: BigDecimal,
    pub requested_currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn session_status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.session_status()
            .map(|s| s.is_terminal())
            .unwrap_or(false)
    }
}

/// Fields for a new session row.
#[derive(Debug, Clone)]
pub struct NewPaymentSession {
    pub correlation_id: String,
    pub plan_id: String,
    pub user_id: Uuid,
    pub provider: Provider,
    pub requested_amount: BigDecimal,
    pub requested_currency: String,
    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
}

/// Repository for payment sessions
#[derive(Clone)]
pub struct PaymentSessionRepository {
    pool: PgPool,
}

impl PaymentSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new session row.
    pub async fn insert(&self, new: &NewPaymentSession) -> Result<PaymentSession, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "INSERT INTO payment_sessions \
             (correlation_id, plan_id, user_id, provider, requested_amount, \
              requested_currency, status, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(&new.correlation_id)
        .bind(&new.plan_id)
        .bind(new.user_id)
        .bind(new.provider.as_str())
        .bind(&new.requested_amount)
        .bind(&new.requested_currency)
        .bind(new.status.as_str())
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a session by correlation id.
    pub async fn find(
        &self,
        correlation_id: &str,
    ) -> Result<Option<PaymentSession>, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "SELECT {} FROM payment_sessions WHERE correlation_id = $1",
            SESSION_COLUMNS
        ))
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lock a session row for the duration of the surrounding transaction.
    ///
    /// Concurrent callbacks for the same correlation id serialize here.
    pub async fn lock_in(
        conn: &mut PgConnection,
        correlation_id: &str,
    ) -> Result<Option<PaymentSession>, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "SELECT {} FROM payment_sessions WHERE correlation_id = $1 FOR UPDATE",
            SESSION_COLUMNS
        ))
        .bind(correlation_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Transition a session out of `initiated`.
    ///
    /// Guarded in SQL: a terminal row is never rewritten. Returns whether the
    /// transition happened.
    pub async fn transition_in(
        conn: &mut PgConnection,
        correlation_id: &str,
        to: SessionStatus,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payment_sessions \
             SET status = $2 \
             WHERE correlation_id = $1 AND status = 'initiated'",
        )
        .bind(correlation_id)
        .bind(to.as_str())
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Sweep: mark overdue `initiated` sessions expired. Returns the count.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payment_sessions \
             SET status = 'expired' \
             WHERE status = 'initiated' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_detection_follows_status_column() {
        let mut session = PaymentSession {
            correlation_id: "ws_CO_1".to_string(),
            plan_id: "normal".to_string(),
            user_id: Uuid::new_v4(),
            provider: "mobile_money".to_string(),
            requested_amount: BigDecimal::from(150_000),
            requested_currency: "KES".to_string(),
            status: "initiated".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(!session.is_terminal());

        session.status = "confirmed".to_string();
        assert!(session.is_terminal());

        // Unrecognized status strings are treated as live, never terminal.
        session.status = "garbage".to_string();
        assert!(!session.is_terminal());
    }
}
