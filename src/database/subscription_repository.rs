use crate::database::error::DatabaseError;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const SUBSCRIPTION_COLUMNS: &str = "user_id, plan_id, status, period_start, period_end, updated_at";

/// Subscription entity: one logical row per user, latest write wins.
#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub user_id: Uuid,
    pub plan_id: String,
    pub status: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for subscriptions
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the active subscription for a user inside an open transaction.
    ///
    /// Idempotent: replaying the same activation rewrites the same row.
    pub async fn upsert_active_in(
        conn: &mut PgConnection,
        user_id: Uuid,
        plan_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Subscription, DatabaseError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO subscriptions (user_id, plan_id, status, period_start, period_end) \
             VALUES ($1, $2, 'active', $3, $4) \
             ON CONFLICT (user_id) DO UPDATE \
             SET plan_id = EXCLUDED.plan_id, status = EXCLUDED.status, \
                 period_start = EXCLUDED.period_start, period_end = EXCLUDED.period_end, \
                 updated_at = NOW() \
             RETURNING {}",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(plan_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a user's subscription, if any.
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Subscription>, DatabaseError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
