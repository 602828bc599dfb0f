//! Subscription Activator
//!
//! The single provider-agnostic entry point that turns a confirmed payment
//! session into an active subscription. Idempotent by construction: the same
//! confirmed session always produces the same final row.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

use crate::catalog::Plan;
use crate::database::error::DatabaseError;
use crate::database::session_repository::PaymentSession;
use crate::database::subscription_repository::{Subscription, SubscriptionRepository};

pub struct SubscriptionActivator;

impl SubscriptionActivator {
    /// Upsert the active subscription for the session's user.
    ///
    /// Runs inside the reconciliation transaction so the subscription only
    /// exists once a completed ledger row does.
    pub async fn activate(
        conn: &mut PgConnection,
        session: &PaymentSession,
        plan: &Plan,
    ) -> Result<Subscription, DatabaseError> {
        let period_start = Utc::now();
        let period_end = plan.interval.period_end(period_start);

        let subscription = SubscriptionRepository::upsert_active_in(
            conn,
            session.user_id,
            &plan.id,
            period_start,
            period_end,
        )
        .await?;

        info!(
            user_id = %session.user_id,
            plan_id = %plan.id,
            period_end = %subscription.period_end,
            "subscription activated"
        );

        Ok(subscription)
    }
}
