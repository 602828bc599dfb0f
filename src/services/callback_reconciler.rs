//! Callback Reconciler
//!
//! Receives each provider's asynchronous completion signal, matches it to the
//! PaymentSession created at initiation, and settles the attempt exactly once:
//! one ledger row, one guarded session transition, and (on success) one
//! subscription activation, all inside a single transaction locked on the
//! session's correlation id. Redelivered callbacks find a terminal session
//! under the lock and become no-ops.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::PlanCatalog;
use crate::currency::CurrencyConverter;
use crate::database::ledger_repository::{NewPaymentRecord, PaymentLedgerRepository};
use crate::database::session_repository::{PaymentSession, PaymentSessionRepository};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::providers::mobile_money::CallbackDocument;
use crate::payments::types::{CardEvent, CardEventKind, PaymentStatus, Provider, SessionStatus};
use crate::services::subscription::SubscriptionActivator;

/// How one delivery was absorbed. Every variant is acknowledged to the
/// sender; only store failures (the `Err` path) are surfaced for redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payment recorded, session confirmed, subscription activated.
    Completed { correlation_id: String },
    /// Failure recorded, session failed, subscription untouched.
    RecordedFailure { correlation_id: String },
    /// Session already terminal; nothing written.
    Duplicate { correlation_id: String },
    /// No session for this correlation id; nothing written.
    Unknown { correlation_id: String },
    /// Payload unusable or session context unresolvable; nothing written.
    Rejected { reason: String },
    /// An event kind this service does not settle.
    Ignored,
}

/// What a provider reported for a settled attempt.
#[derive(Debug, Clone)]
struct ChargeReport {
    provider_transaction_id: String,
    amount: BigDecimal,
    currency: String,
    metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
enum Disposition {
    Confirm(ChargeReport),
    Fail {
        provider_transaction_id: Option<String>,
        code: String,
        reason: String,
    },
}

pub struct CallbackReconciler {
    pool: PgPool,
    catalog: Arc<PlanCatalog>,
    converter: CurrencyConverter,
}

impl CallbackReconciler {
    pub fn new(pool: PgPool, catalog: Arc<PlanCatalog>, converter: CurrencyConverter) -> Self {
        Self {
            pool,
            catalog,
            converter,
        }
    }

    // =========================================================================
    // Mobile-money callback path
    // =========================================================================

    pub async fn process_mobile_money_callback(
        &self,
        payload: &[u8],
    ) -> PaymentResult<ReconcileOutcome> {
        let document: CallbackDocument = match serde_json::from_slice(payload) {
            Ok(doc) => doc,
            Err(e) => {
                // Operational alert: the network will not resend a payload we
                // acknowledge, so a malformed body is only visible here.
                error!(error = %e, "malformed mobile money callback payload");
                return Ok(ReconcileOutcome::Rejected {
                    reason: format!("malformed callback payload: {}", e),
                });
            }
        };

        let callback = document.body.stk_callback;
        let correlation_id = callback.checkout_request_id.clone();

        if callback.is_success() {
            let charge = match callback.extract_charge() {
                Ok(charge) => charge,
                Err(e) => {
                    error!(
                        correlation_id = %correlation_id,
                        error = %e,
                        "success callback missing transaction metadata"
                    );
                    return Ok(ReconcileOutcome::Rejected {
                        reason: e.to_string(),
                    });
                }
            };

            let currency = charge
                .currency
                .clone()
                .unwrap_or_else(|| self.converter.localized_currency().to_string());
            let metadata = serde_json::json!({
                "merchant_request_id": callback.merchant_request_id,
                "checkout_request_id": callback.checkout_request_id,
                "result_desc": callback.result_desc,
                "receipt_number": charge.transaction_id.clone(),
                "phone_number": charge.msisdn,
                "reported_amount": charge.amount.to_string(),
                "reported_currency": currency.clone(),
                "transaction_date": charge.paid_at.map(|t| t.to_rfc3339()),
            });

            self.settle(
                &correlation_id,
                Disposition::Confirm(ChargeReport {
                    provider_transaction_id: charge.transaction_id,
                    amount: charge.amount,
                    currency,
                    metadata,
                }),
            )
            .await
        } else {
            let metadata_id = callback
                .extract_charge()
                .ok()
                .map(|charge| charge.transaction_id);
            self.settle(
                &correlation_id,
                Disposition::Fail {
                    provider_transaction_id: metadata_id,
                    code: callback.result_code.to_string(),
                    reason: callback.result_desc.clone(),
                },
            )
            .await
        }
    }

    // =========================================================================
    // Card webhook path
    // =========================================================================

    pub async fn process_card_event(&self, event: CardEvent) -> PaymentResult<ReconcileOutcome> {
        match event.kind {
            CardEventKind::IntentSucceeded => {
                let currency = event
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.converter.canonical_currency().to_string());
                let amount = match event.amount_minor {
                    Some(minor) => BigDecimal::from(minor) / BigDecimal::from(100),
                    None => {
                        error!(
                            intent_id = %event.intent_id,
                            "card success event carries no amount"
                        );
                        return Ok(ReconcileOutcome::Rejected {
                            reason: "card success event carries no amount".to_string(),
                        });
                    }
                };

                let metadata = serde_json::json!({
                    "event_id": event.event_id,
                    "intent_id": event.intent_id.clone(),
                    "reported_amount": amount.to_string(),
                    "reported_currency": currency.clone(),
                });

                let intent_id = event.intent_id.clone();
                self.settle(
                    &intent_id,
                    Disposition::Confirm(ChargeReport {
                        provider_transaction_id: event.intent_id,
                        amount,
                        currency,
                        metadata,
                    }),
                )
                .await
            }
            CardEventKind::IntentFailed => {
                let intent_id = event.intent_id.clone();
                self.settle(
                    &intent_id,
                    Disposition::Fail {
                        provider_transaction_id: Some(event.intent_id),
                        code: "payment_intent.payment_failed".to_string(),
                        reason: event
                            .failure_message
                            .unwrap_or_else(|| "payment failed".to_string()),
                    },
                )
                .await
            }
            CardEventKind::Other(kind) => {
                info!(kind = %kind, "ignoring card webhook event");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    // =========================================================================
    // Settlement core
    // =========================================================================

    /// Settle one delivery against its session, exactly once.
    ///
    /// All writes happen in one transaction holding the session's row lock, so
    /// a duplicate delivery racing this one blocks on the lock, then sees the
    /// terminal state and becomes a no-op.
    async fn settle(
        &self,
        correlation_id: &str,
        disposition: Disposition,
    ) -> PaymentResult<ReconcileOutcome> {
        let mut tx = self.pool.begin().await.map_err(store_unavailable)?;

        let session =
            PaymentSessionRepository::lock_in(&mut *tx, correlation_id).await?;
        let session = match session {
            Some(session) => session,
            None => {
                tx.rollback().await.map_err(store_unavailable)?;
                warn!(
                    correlation_id = %correlation_id,
                    "callback for unknown payment session"
                );
                return Ok(ReconcileOutcome::Unknown {
                    correlation_id: correlation_id.to_string(),
                });
            }
        };

        if session.is_terminal() {
            tx.rollback().await.map_err(store_unavailable)?;
            info!(
                correlation_id = %correlation_id,
                status = %session.status,
                "duplicate callback for settled session"
            );
            return Ok(ReconcileOutcome::Duplicate {
                correlation_id: correlation_id.to_string(),
            });
        }

        match disposition {
            Disposition::Confirm(report) => {
                let outcome = self.confirm(&mut tx, &session, report).await?;
                match &outcome {
                    ReconcileOutcome::Completed { .. } => {
                        tx.commit().await.map_err(store_unavailable)?;
                    }
                    _ => {
                        tx.rollback().await.map_err(store_unavailable)?;
                    }
                }
                Ok(outcome)
            }
            Disposition::Fail {
                provider_transaction_id,
                code,
                reason,
            } => {
                let provider = self.session_provider(&session);
                PaymentLedgerRepository::insert_in(
                    &mut *tx,
                    &NewPaymentRecord {
                        user_id: session.user_id,
                        plan_id: session.plan_id.clone(),
                        amount: session.requested_amount.clone(),
                        currency: session.requested_currency.clone(),
                        provider,
                        provider_transaction_id,
                        status: PaymentStatus::Failed,
                        metadata: serde_json::json!({
                            "correlation_id": session.correlation_id.clone(),
                            "failure_code": code.as_str(),
                            "failure_reason": reason,
                        }),
                    },
                )
                .await?;
                PaymentSessionRepository::transition_in(
                    &mut *tx,
                    correlation_id,
                    SessionStatus::Failed,
                )
                .await?;
                tx.commit().await.map_err(store_unavailable)?;

                info!(
                    correlation_id = %correlation_id,
                    failure_code = %code,
                    "payment failure recorded"
                );
                Ok(ReconcileOutcome::RecordedFailure {
                    correlation_id: correlation_id.to_string(),
                })
            }
        }
    }

    async fn confirm(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session: &PaymentSession,
        report: ChargeReport,
    ) -> PaymentResult<ReconcileOutcome> {
        // The plan comes from the session, never re-derived from the amount:
        // two plans may share a price.
        let plan = match self.catalog.get(&session.plan_id) {
            Some(plan) => plan,
            None => {
                error!(
                    correlation_id = %session.correlation_id,
                    plan_id = %session.plan_id,
                    "session references a plan missing from the catalog"
                );
                return Ok(ReconcileOutcome::Rejected {
                    reason: format!("plan {} missing from catalog", session.plan_id),
                });
            }
        };

        let canonical_amount = match self
            .converter
            .to_canonical(&report.amount, &report.currency)
        {
            Ok(amount) => amount,
            Err(e) => {
                error!(
                    correlation_id = %session.correlation_id,
                    currency = %report.currency,
                    error = %e,
                    "callback reported an unconvertible currency"
                );
                return Ok(ReconcileOutcome::Rejected {
                    reason: e.to_string(),
                });
            }
        };

        let one_minor_unit = BigDecimal::from_str("0.01").expect("static decimal");
        if (&canonical_amount - &plan.canonical_price).abs() > one_minor_unit {
            // Alert only: the provider's report is authoritative for the
            // ledger, and the plan is already fixed by the session.
            warn!(
                correlation_id = %session.correlation_id,
                reported = %canonical_amount,
                expected = %plan.canonical_price,
                "reported amount does not match plan price"
            );
        }

        let provider = self.session_provider(session);
        let inserted = PaymentLedgerRepository::insert_in(
            &mut **tx,
            &NewPaymentRecord {
                user_id: session.user_id,
                plan_id: plan.id.clone(),
                amount: canonical_amount.clone(),
                currency: self.converter.canonical_currency().to_string(),
                provider,
                provider_transaction_id: Some(report.provider_transaction_id.clone()),
                status: PaymentStatus::Completed,
                metadata: report.metadata,
            },
        )
        .await?;

        if inserted.is_none() {
            // The idempotency index absorbed a transaction id settled under a
            // different session. Leave this session alone and acknowledge.
            warn!(
                correlation_id = %session.correlation_id,
                provider_transaction_id = %report.provider_transaction_id,
                "provider transaction already settled elsewhere"
            );
            return Ok(ReconcileOutcome::Duplicate {
                correlation_id: session.correlation_id.clone(),
            });
        }

        PaymentSessionRepository::transition_in(
            &mut **tx,
            &session.correlation_id,
            SessionStatus::Confirmed,
        )
        .await?;

        SubscriptionActivator::activate(&mut **tx, session, plan).await?;

        info!(
            correlation_id = %session.correlation_id,
            provider_transaction_id = %report.provider_transaction_id,
            amount = %canonical_amount,
            plan_id = %plan.id,
            user_id = %session.user_id,
            "payment confirmed and subscription activated"
        );

        Ok(ReconcileOutcome::Completed {
            correlation_id: session.correlation_id.clone(),
        })
    }

    fn session_provider(&self, session: &PaymentSession) -> Provider {
        Provider::from_str(&session.provider).unwrap_or(Provider::MobileMoney)
    }
}

fn store_unavailable(err: sqlx::Error) -> PaymentError {
    PaymentError::StoreUnavailable {
        message: err.to_string(),
    }
}
