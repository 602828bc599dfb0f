use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::payments::error::PaymentError;
use crate::payments::types::SessionStatus;

#[derive(Debug, Deserialize)]
pub struct CardIntentRequest {
    pub plan_id: String,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CardIntentResponse {
    pub client_secret: String,
    pub correlation_id: String,
}

/// POST /payments/card/intent
pub async fn create_card_intent(
    State(state): State<AppState>,
    Json(request): Json<CardIntentRequest>,
) -> Result<Json<CardIntentResponse>, PaymentError> {
    let outcome = state
        .orchestrator
        .initiate_card_intent(&request.plan_id, request.user_id)
        .await?;

    Ok(Json(CardIntentResponse {
        client_secret: outcome.client_secret,
        correlation_id: outcome.correlation_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MobileMoneyPushRequest {
    pub plan_id: String,
    pub user_id: Uuid,
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct MobileMoneyPushResponse {
    pub correlation_id: String,
}

/// POST /payments/mobile-money/push
pub async fn create_mobile_money_push(
    State(state): State<AppState>,
    Json(request): Json<MobileMoneyPushRequest>,
) -> Result<Json<MobileMoneyPushResponse>, PaymentError> {
    let correlation_id = state
        .orchestrator
        .initiate_mobile_money_push(&request.plan_id, request.user_id, &request.phone_number)
        .await?;

    Ok(Json(MobileMoneyPushResponse { correlation_id }))
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: SessionStatus,
}

/// GET /payments/status?correlation_id=...
pub async fn get_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<StatusResponse>, PaymentError> {
    let status = state.orchestrator.poll_status(&params.correlation_id).await?;

    Ok(Json(StatusResponse { status }))
}
