use crate::payments::error::PaymentResult;
use crate::payments::types::{
    CardEvent, CreateIntentRequest, CreatedIntent, PushReceipt, PushRequest,
};
use async_trait::async_trait;

/// Card-network processor seam.
///
/// Initiation only: the processor confirms intents on the client side and
/// reports completion through its signed webhook, which is handled by the
/// reconciliation pipeline, not here.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn create_intent(&self, request: CreateIntentRequest) -> PaymentResult<CreatedIntent>;

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool;

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<CardEvent>;
}

/// Mobile-money processor seam.
///
/// Initiation only: completion arrives asynchronously on the public callback
/// endpoint and is matched back to the session by checkout id.
#[async_trait]
pub trait MobileMoneyGateway: Send + Sync {
    async fn initiate_push(&self, request: PushRequest) -> PaymentResult<PushReceipt>;
}
