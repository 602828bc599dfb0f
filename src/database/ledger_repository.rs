use crate::database::error::DatabaseError;
use crate::payments::types::{PaymentStatus, Provider};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, user_id, plan_id, amount, currency, provider, \
                               provider_transaction_id, status, metadata, created_at";

/// Ledger entity: one row per terminal payment attempt, append-only.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub provider: String,
    pub provider_transaction_id: Option<String>,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new ledger row.
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub user_id: Uuid,
    pub plan_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub provider: Provider,
    pub provider_transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub metadata: serde_json::Value,
}

/// Repository for the payment ledger
#[derive(Clone)]
pub struct PaymentLedgerRepository {
    pool: PgPool,
}

impl PaymentLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a ledger row inside an open transaction.
    ///
    /// The partial unique index on completed provider transaction ids makes
    /// the insert a no-op for a redelivered settlement; `None` is returned in
    /// that case.
    pub async fn insert_in(
        conn: &mut PgConnection,
        new: &NewPaymentRecord,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "INSERT INTO payments \
             (user_id, plan_id, amount, currency, provider, provider_transaction_id, \
              status, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (provider_transaction_id) WHERE status = 'completed' DO NOTHING \
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(new.user_id)
        .bind(&new.plan_id)
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(new.provider.as_str())
        .bind(&new.provider_transaction_id)
        .bind(new.status.as_str())
        .bind(&new.metadata)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find the completed ledger row for a provider transaction id, if any.
    pub async fn find_completed_by_provider_transaction_id(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {} FROM payments \
             WHERE provider_transaction_id = $1 AND status = 'completed'",
            PAYMENT_COLUMNS
        ))
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// List a user's ledger rows, newest first (read-only reporting surface).
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
