//! End-to-end reconciliation tests against a real Postgres.
//!
//! Run with a database available:
//!   DATABASE_URL=postgres://... cargo test -- --ignored

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use async_trait::async_trait;
use subpay_backend::catalog::PlanCatalog;
use subpay_backend::currency::CurrencyConverter;
use subpay_backend::database::ledger_repository::PaymentLedgerRepository;
use subpay_backend::database::session_repository::{NewPaymentSession, PaymentSessionRepository};
use subpay_backend::database::subscription_repository::SubscriptionRepository;
use subpay_backend::payments::error::PaymentResult;
use subpay_backend::payments::provider::{CardGateway, MobileMoneyGateway};
use subpay_backend::payments::types::{
    CardEvent, CreateIntentRequest, CreatedIntent, Provider, PushReceipt, PushRequest,
    SessionStatus,
};
use subpay_backend::services::callback_reconciler::{CallbackReconciler, ReconcileOutcome};
use subpay_backend::services::payment_orchestrator::{OrchestratorConfig, PaymentOrchestrator};

async fn test_pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
    let pool = subpay_backend::database::init_pool(&url, None)
        .await
        .expect("pool should initialize");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations should apply");
    pool
}

fn reconciler(pool: sqlx::PgPool) -> CallbackReconciler {
    let converter =
        CurrencyConverter::new("USD", "KES", BigDecimal::from(150)).expect("converter");
    let catalog = Arc::new(PlanCatalog::builtin(&converter).expect("catalog"));
    CallbackReconciler::new(pool, catalog, converter)
}

fn success_callback(checkout_request_id: &str, receipt: &str) -> Vec<u8> {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": 300000},
                        {"Name": "MpesaReceiptNumber", "Value": receipt},
                        {"Name": "TransactionDate", "Value": 20260807143000u64},
                        {"Name": "PhoneNumber", "Value": 254712345678u64}
                    ]
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

async fn initiated_session(
    pool: &sqlx::PgPool,
    correlation_id: &str,
    user_id: Uuid,
) -> NewPaymentSession {
    let new = NewPaymentSession {
        correlation_id: correlation_id.to_string(),
        plan_id: "premium".to_string(),
        user_id,
        provider: Provider::MobileMoney,
        requested_amount: BigDecimal::from(300_000),
        requested_currency: "KES".to_string(),
        status: SessionStatus::Initiated,
        expires_at: Utc::now() + Duration::minutes(10),
    };
    PaymentSessionRepository::new(pool.clone())
        .insert(&new)
        .await
        .expect("session should insert");
    new
}

struct StubCardGateway {
    intent_id: String,
}

#[async_trait]
impl CardGateway for StubCardGateway {
    async fn create_intent(&self, _request: CreateIntentRequest) -> PaymentResult<CreatedIntent> {
        Ok(CreatedIntent {
            intent_id: self.intent_id.clone(),
            client_secret: format!("{}_secret_test", self.intent_id),
        })
    }

    fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> bool {
        true
    }

    fn parse_webhook_event(&self, _payload: &[u8]) -> PaymentResult<CardEvent> {
        unimplemented!("not exercised by these tests")
    }
}

struct StubMobileMoneyGateway {
    checkout_request_id: String,
}

#[async_trait]
impl MobileMoneyGateway for StubMobileMoneyGateway {
    async fn initiate_push(&self, _request: PushRequest) -> PaymentResult<PushReceipt> {
        Ok(PushReceipt {
            checkout_request_id: self.checkout_request_id.clone(),
            merchant_request_id: "mr_test".to_string(),
            customer_message: None,
        })
    }
}

fn orchestrator(
    pool: &sqlx::PgPool,
    card_intent_id: &str,
    checkout_request_id: &str,
) -> PaymentOrchestrator {
    let converter =
        CurrencyConverter::new("USD", "KES", BigDecimal::from(150)).expect("converter");
    let catalog = Arc::new(PlanCatalog::builtin(&converter).expect("catalog"));
    PaymentOrchestrator::new(
        catalog,
        PaymentSessionRepository::new(pool.clone()),
        Arc::new(StubCardGateway {
            intent_id: card_intent_id.to_string(),
        }),
        Arc::new(StubMobileMoneyGateway {
            checkout_request_id: checkout_request_id.to_string(),
        }),
        OrchestratorConfig {
            session_ttl: Duration::minutes(10),
            msisdn_country_prefix: "254".to_string(),
        },
    )
}

#[tokio::test]
#[ignore] // Requires database running
async fn card_intent_initiation_stores_canonical_amount() {
    let pool = test_pool().await;
    let intent_id = format!("pi_{}", Uuid::new_v4().simple());
    let orchestrator = orchestrator(&pool, &intent_id, "unused");

    let outcome = orchestrator
        .initiate_card_intent("normal", Uuid::new_v4())
        .await
        .expect("initiation should succeed");
    assert_eq!(outcome.correlation_id, intent_id);
    assert!(!outcome.client_secret.is_empty());

    let session = PaymentSessionRepository::new(pool)
        .find(&intent_id)
        .await
        .expect("session query should succeed")
        .expect("session should exist");
    assert_eq!(session.status, "initiated");
    assert_eq!(session.provider, "card");
    assert_eq!(session.requested_amount, BigDecimal::from(1000));
    assert_eq!(session.requested_currency, "USD");
}

#[tokio::test]
#[ignore] // Requires database running
async fn mobile_money_push_stores_localized_amount() {
    let pool = test_pool().await;
    let checkout_id = format!("ws_CO_{}", Uuid::new_v4().simple());
    let orchestrator = orchestrator(&pool, "unused", &checkout_id);

    let correlation_id = orchestrator
        .initiate_mobile_money_push("premium", Uuid::new_v4(), "0712345678")
        .await
        .expect("push should succeed");
    assert_eq!(correlation_id, checkout_id);

    let session = PaymentSessionRepository::new(pool)
        .find(&checkout_id)
        .await
        .expect("session query should succeed")
        .expect("session should exist");
    assert_eq!(session.status, "initiated");
    assert_eq!(session.provider, "mobile_money");
    assert_eq!(session.requested_currency, "KES");
    assert_eq!(
        session.requested_amount,
        BigDecimal::from_str("300000.00").unwrap()
    );
}

#[tokio::test]
#[ignore] // Requires database running
async fn successful_callback_settles_payment_and_activates_subscription() {
    let pool = test_pool().await;
    let user_id = Uuid::new_v4();
    let correlation_id = format!("ws_CO_{}", Uuid::new_v4().simple());
    let receipt = format!("RC{}", Uuid::new_v4().simple());
    initiated_session(&pool, &correlation_id, user_id).await;

    let reconciler = reconciler(pool.clone());
    let outcome = reconciler
        .process_mobile_money_callback(&success_callback(&correlation_id, &receipt))
        .await
        .expect("processing should succeed");
    assert!(matches!(outcome, ReconcileOutcome::Completed { .. }));

    // Ledger: exactly one completed row, converted to canonical currency.
    let payment = PaymentLedgerRepository::new(pool.clone())
        .find_completed_by_provider_transaction_id(&receipt)
        .await
        .expect("ledger query should succeed")
        .expect("payment row should exist");
    assert_eq!(payment.amount, BigDecimal::from_str("2000.00").unwrap());
    assert_eq!(payment.currency, "USD");
    assert_eq!(payment.plan_id, "premium");

    // Subscription: active for the session's user and plan.
    let subscription = SubscriptionRepository::new(pool.clone())
        .find_by_user(user_id)
        .await
        .expect("subscription query should succeed")
        .expect("subscription should exist");
    assert_eq!(subscription.status, "active");
    assert_eq!(subscription.plan_id, "premium");

    // Session: terminal.
    let session = PaymentSessionRepository::new(pool)
        .find(&correlation_id)
        .await
        .expect("session query should succeed")
        .expect("session should exist");
    assert_eq!(session.status, "confirmed");
}

#[tokio::test]
#[ignore] // Requires database running
async fn redelivered_callback_is_a_no_op() {
    let pool = test_pool().await;
    let user_id = Uuid::new_v4();
    let correlation_id = format!("ws_CO_{}", Uuid::new_v4().simple());
    let receipt = format!("RC{}", Uuid::new_v4().simple());
    initiated_session(&pool, &correlation_id, user_id).await;

    let reconciler = reconciler(pool.clone());
    let payload = success_callback(&correlation_id, &receipt);

    let first = reconciler
        .process_mobile_money_callback(&payload)
        .await
        .expect("processing should succeed");
    assert!(matches!(first, ReconcileOutcome::Completed { .. }));

    let second = reconciler
        .process_mobile_money_callback(&payload)
        .await
        .expect("processing should succeed");
    assert!(matches!(second, ReconcileOutcome::Duplicate { .. }));
}

#[tokio::test]
#[ignore] // Requires database running
async fn unknown_correlation_id_is_absorbed() {
    let pool = test_pool().await;
    let reconciler = reconciler(pool);

    let outcome = reconciler
        .process_mobile_money_callback(&success_callback("ws_CO_never_initiated", "RCNONE"))
        .await
        .expect("processing should succeed");
    assert!(matches!(outcome, ReconcileOutcome::Unknown { .. }));
}

#[tokio::test]
#[ignore] // Requires database running
async fn failure_callback_fails_session_without_subscription() {
    let pool = test_pool().await;
    let user_id = Uuid::new_v4();
    let correlation_id = format!("ws_CO_{}", Uuid::new_v4().simple());
    initiated_session(&pool, &correlation_id, user_id).await;

    let payload = json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "m-1",
                "CheckoutRequestID": correlation_id,
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    })
    .to_string()
    .into_bytes();

    let reconciler = reconciler(pool.clone());
    let outcome = reconciler
        .process_mobile_money_callback(&payload)
        .await
        .expect("processing should succeed");
    assert!(matches!(outcome, ReconcileOutcome::RecordedFailure { .. }));

    let session = PaymentSessionRepository::new(pool.clone())
        .find(&correlation_id)
        .await
        .expect("session query should succeed")
        .expect("session should exist");
    assert_eq!(session.status, "failed");

    let subscription = SubscriptionRepository::new(pool)
        .find_by_user(user_id)
        .await
        .expect("subscription query should succeed");
    assert!(subscription.is_none());
}
