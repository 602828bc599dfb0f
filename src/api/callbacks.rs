use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::services::callback_reconciler::ReconcileOutcome;

/// The fixed acknowledgement the mobile-money network expects. Anything but
/// a 2xx makes the network redeliver, so only a store failure withholds it.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub ack_code: u8,
    pub ack_message: &'static str,
}

impl CallbackAck {
    fn received() -> Self {
        Self {
            ack_code: 0,
            ack_message: "received",
        }
    }
}

/// POST /payments/mobile-money/callback
///
/// Unauthenticated public endpoint; delivery is at-least-once. Every internal
/// outcome short of a store failure is absorbed and acknowledged.
pub async fn mobile_money_callback(
    State(state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    match state
        .reconciler
        .process_mobile_money_callback(body.as_bytes())
        .await
    {
        Ok(outcome) => {
            log_outcome("mobile_money", &outcome);
            (StatusCode::OK, Json(CallbackAck::received())).into_response()
        }
        Err(e) => {
            // Not acknowledged: the network retries until the store is back.
            error!(error = %e, "mobile money callback processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck {
                    ack_code: 1,
                    ack_message: "retry",
                }),
            )
                .into_response()
        }
    }
}

/// POST /payments/card/webhook
///
/// The card network signs its events; an unverifiable signature is rejected
/// before anything is parsed or persisted.
pub async fn card_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let signature = headers
        .get("x-gateway-signature")
        .and_then(|v| v.to_str().ok());

    let signature = match signature {
        Some(signature) => signature,
        None => {
            warn!("card webhook without signature header");
            return (StatusCode::UNAUTHORIZED, "Missing signature").into_response();
        }
    };

    if !state
        .card_gateway
        .verify_webhook(body.as_bytes(), signature)
    {
        warn!("card webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    let event = match state.card_gateway.parse_webhook_event(body.as_bytes()) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "malformed card webhook event");
            return (StatusCode::BAD_REQUEST, "Invalid payload").into_response();
        }
    };

    match state.reconciler.process_card_event(event).await {
        Ok(outcome) => {
            log_outcome("card", &outcome);
            (
                StatusCode::OK,
                Json(serde_json::json!({"received": true})),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "card webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Retry").into_response()
        }
    }
}

fn log_outcome(channel: &str, outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Completed { correlation_id } => {
            info!(channel, correlation_id = %correlation_id, "callback settled payment");
        }
        ReconcileOutcome::RecordedFailure { correlation_id } => {
            info!(channel, correlation_id = %correlation_id, "callback recorded failure");
        }
        ReconcileOutcome::Duplicate { correlation_id } => {
            info!(channel, correlation_id = %correlation_id, "duplicate callback absorbed");
        }
        ReconcileOutcome::Unknown { correlation_id } => {
            warn!(channel, correlation_id = %correlation_id, "callback for unknown session");
        }
        ReconcileOutcome::Rejected { reason } => {
            error!(channel, reason = %reason, "callback rejected");
        }
        ReconcileOutcome::Ignored => {
            info!(channel, "callback event ignored");
        }
    }
}
