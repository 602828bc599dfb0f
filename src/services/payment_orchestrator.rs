//! Payment Orchestrator Service
//!
//! Owns the initiation half of the payment lifecycle for both networks plus
//! the client-facing status poll. Initiation always ends with a durable
//! PaymentSession row: `initiated` keyed by the provider's correlation id on
//! success, or a locally-keyed `failed` audit row when the provider call
//! errors. An attempt is never left dangling without a recoverable record.

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::PlanCatalog;
use crate::config::PaymentConfig;
use crate::database::session_repository::{NewPaymentSession, PaymentSessionRepository};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::{CardGateway, MobileMoneyGateway};
use crate::payments::providers::mobile_money::normalize_msisdn;
use crate::payments::types::{
    CreateIntentRequest, Provider, PushRequest, SessionStatus,
};

/// Orchestrator configuration, derived from [`PaymentConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub session_ttl: Duration,
    pub msisdn_country_prefix: String,
}

impl From<&PaymentConfig> for OrchestratorConfig {
    fn from(config: &PaymentConfig) -> Self {
        Self {
            session_ttl: Duration::seconds(config.session_ttl_seconds as i64),
            msisdn_country_prefix: config.msisdn_country_prefix.clone(),
        }
    }
}

/// Result of a card intent initiation.
///
/// The client secret is handed straight back to the browser; it is never
/// persisted or logged.
#[derive(Debug, Clone)]
pub struct CardIntentOutcome {
    pub correlation_id: String,
    pub client_secret: String,
}

pub struct PaymentOrchestrator {
    catalog: Arc<PlanCatalog>,
    sessions: PaymentSessionRepository,
    card: Arc<dyn CardGateway>,
    mobile_money: Arc<dyn MobileMoneyGateway>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        sessions: PaymentSessionRepository,
        card: Arc<dyn CardGateway>,
        mobile_money: Arc<dyn MobileMoneyGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            catalog,
            sessions,
            card,
            mobile_money,
            config,
        }
    }

    // =========================================================================
    // Card Intent Initiator
    // =========================================================================

    pub async fn initiate_card_intent(
        &self,
        plan_id: &str,
        user_id: Uuid,
    ) -> PaymentResult<CardIntentOutcome> {
        let plan = self
            .catalog
            .get(plan_id)
            .ok_or_else(|| PaymentError::InvalidPlan {
                plan_id: plan_id.to_string(),
            })?;

        let amount_minor =
            plan.canonical_minor_units()
                .ok_or_else(|| PaymentError::InvalidPlan {
                    plan_id: plan.id.clone(),
                })?;

        let intent = match self
            .card
            .create_intent(CreateIntentRequest {
                amount_minor,
                currency: plan.canonical_currency.clone(),
                user_id,
                plan_id: plan.id.clone(),
            })
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                self.record_failed_initiation(
                    plan_id,
                    user_id,
                    Provider::Card,
                    &plan.canonical_price,
                    &plan.canonical_currency,
                )
                .await;
                return Err(e);
            }
        };

        let session = self
            .sessions
            .insert(&NewPaymentSession {
                correlation_id: intent.intent_id.clone(),
                plan_id: plan.id.clone(),
                user_id,
                provider: Provider::Card,
                requested_amount: plan.canonical_price.clone(),
                requested_currency: plan.canonical_currency.clone(),
                status: SessionStatus::Initiated,
                expires_at: Utc::now() + self.config.session_ttl,
            })
            .await?;

        info!(
            correlation_id = %session.correlation_id,
            plan_id = %plan.id,
            user_id = %user_id,
            amount = %plan.canonical_price,
            currency = %plan.canonical_currency,
            "card payment session initiated"
        );

        Ok(CardIntentOutcome {
            correlation_id: intent.intent_id,
            client_secret: intent.client_secret,
        })
    }

    // =========================================================================
    // Mobile-Money Push Initiator
    // =========================================================================

    pub async fn initiate_mobile_money_push(
        &self,
        plan_id: &str,
        user_id: Uuid,
        phone_number: &str,
    ) -> PaymentResult<String> {
        let plan = self
            .catalog
            .get(plan_id)
            .ok_or_else(|| PaymentError::InvalidPlan {
                plan_id: plan_id.to_string(),
            })?;

        let msisdn = normalize_msisdn(phone_number, &self.config.msisdn_country_prefix)?;

        let receipt = match self
            .mobile_money
            .initiate_push(PushRequest {
                amount: plan.localized_price.clone(),
                currency: plan.localized_currency.clone(),
                msisdn,
                account_reference: plan.id.clone(),
                description: format!("{} subscription", plan.display_name),
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                self.record_failed_initiation(
                    plan_id,
                    user_id,
                    Provider::MobileMoney,
                    &plan.localized_price,
                    &plan.localized_currency,
                )
                .await;
                return Err(e);
            }
        };

        // The (correlation_id, plan_id, user_id) mapping is the join key the
        // callback depends on; it must be durable before the caller sees the
        // checkout id.
        let session = self
            .sessions
            .insert(&NewPaymentSession {
                correlation_id: receipt.checkout_request_id.clone(),
                plan_id: plan.id.clone(),
                user_id,
                provider: Provider::MobileMoney,
                requested_amount: plan.localized_price.clone(),
                requested_currency: plan.localized_currency.clone(),
                status: SessionStatus::Initiated,
                expires_at: Utc::now() + self.config.session_ttl,
            })
            .await?;

        info!(
            correlation_id = %session.correlation_id,
            plan_id = %plan.id,
            user_id = %user_id,
            amount = %plan.localized_price,
            currency = %plan.localized_currency,
            "mobile money payment session initiated"
        );

        Ok(receipt.checkout_request_id)
    }

    // =========================================================================
    // Status Poller
    // =========================================================================

    /// Report the effective status of a session. Purely a read: an overdue
    /// `initiated` session is reported as expired but left untouched so a
    /// late real callback still wins over the poll.
    pub async fn poll_status(&self, correlation_id: &str) -> PaymentResult<SessionStatus> {
        let session = self
            .sessions
            .find(correlation_id)
            .await?
            .ok_or_else(|| PaymentError::UnknownSession {
                correlation_id: correlation_id.to_string(),
            })?;

        let status = session.session_status().unwrap_or_else(|| {
            warn!(
                correlation_id = %session.correlation_id,
                status = %session.status,
                "session carries unrecognized status, reporting initiated"
            );
            SessionStatus::Initiated
        });

        if status == SessionStatus::Initiated && Utc::now() > session.expires_at {
            return Ok(SessionStatus::Expired);
        }

        Ok(status)
    }

    // =========================================================================
    // Failure audit
    // =========================================================================

    /// Record a failed initiation attempt.
    ///
    /// The provider issued no correlation id, so the audit row gets a local
    /// one; it is terminal from birth and never matched by any callback.
    async fn record_failed_initiation(
        &self,
        plan_id: &str,
        user_id: Uuid,
        provider: Provider,
        amount: &BigDecimal,
        currency: &str,
    ) {
        let new = NewPaymentSession {
            correlation_id: format!("local-{}", Uuid::new_v4()),
            plan_id: plan_id.to_string(),
            user_id,
            provider,
            requested_amount: amount.clone(),
            requested_currency: currency.to_string(),
            status: SessionStatus::Failed,
            expires_at: Utc::now(),
        };

        if let Err(store_err) = self.sessions.insert(&new).await {
            error!(
                plan_id = %plan_id,
                user_id = %user_id,
                provider = %provider,
                error = %store_err,
                "failed to record failed initiation session"
            );
        } else {
            warn!(
                correlation_id = %new.correlation_id,
                plan_id = %plan_id,
                provider = %provider,
                "provider initiation failed, session recorded as failed"
            );
        }
    }
}
