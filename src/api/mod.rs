pub mod callbacks;
pub mod payments;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::payments::error::PaymentError;
use crate::payments::provider::CardGateway;
use crate::services::callback_reconciler::CallbackReconciler;
use crate::services::payment_orchestrator::PaymentOrchestrator;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub reconciler: Arc<CallbackReconciler>,
    pub card_gateway: Arc<dyn CardGateway>,
    pub pool: PgPool,
}

/// Error envelope returned to API callers.
///
/// Carries a stable machine-readable code and a user-safe message; internal
/// detail stays in the logs.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&PaymentError> for ErrorResponse {
    fn from(err: &PaymentError) -> Self {
        Self {
            error: err.error_code(),
            message: err.user_message(),
            retryable: err.is_retryable(),
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_exposes_code_not_internals() {
        let err = PaymentError::ProviderUnavailable {
            provider: "card".to_string(),
            message: "connect timeout to 10.1.2.3".to_string(),
        };
        let envelope = ErrorResponse::from(&err);
        assert_eq!(envelope.error, "PROVIDER_UNAVAILABLE");
        assert!(envelope.retryable);
        assert!(!envelope.message.contains("10.1.2.3"));
    }
}
