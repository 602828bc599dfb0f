use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::CardGateway;
use crate::payments::types::{CardEvent, CardEventKind, CreateIntentRequest, CreatedIntent};
use crate::payments::utils::{verify_hmac_sha256_hex, GatewayHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CardNetworkConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl CardNetworkConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key = std::env::var("CARD_GATEWAY_SECRET_KEY").map_err(|_| {
            PaymentError::ProviderUnavailable {
                provider: "card".to_string(),
                message: "CARD_GATEWAY_SECRET_KEY environment variable is required".to_string(),
            }
        })?;
        let base_url = std::env::var("CARD_GATEWAY_BASE_URL").map_err(|_| {
            PaymentError::ProviderUnavailable {
                provider: "card".to_string(),
                message: "CARD_GATEWAY_BASE_URL environment variable is required".to_string(),
            }
        })?;

        Ok(Self {
            secret_key,
            webhook_secret: std::env::var("CARD_GATEWAY_WEBHOOK_SECRET").ok(),
            base_url,
            timeout_secs: std::env::var("CARD_GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        })
    }
}

/// Client for the card-network processor's payment-intent API.
pub struct CardNetworkProvider {
    config: CardNetworkConfig,
    http: GatewayHttpClient,
}

impl CardNetworkProvider {
    pub fn new(config: CardNetworkConfig) -> PaymentResult<Self> {
        let http = GatewayHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(CardNetworkConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl CardGateway for CardNetworkProvider {
    async fn create_intent(&self, request: CreateIntentRequest) -> PaymentResult<CreatedIntent> {
        if request.amount_minor <= 0 {
            return Err(PaymentError::ProviderUnavailable {
                provider: "card".to_string(),
                message: "intent amount must be positive".to_string(),
            });
        }

        let payload = serde_json::json!({
            "amount": request.amount_minor,
            "currency": request.currency.to_lowercase(),
            "capture_method": "automatic",
            "metadata": {
                "user_id": request.user_id,
                "plan_id": request.plan_id,
            },
        });

        let data: IntentData = self
            .http
            .post_json(
                &self.endpoint("/v1/payment_intents"),
                &self.config.secret_key,
                &payload,
            )
            .await
            .map_err(|e| match e {
                PaymentError::ProviderUnavailable { message, .. } => {
                    PaymentError::ProviderUnavailable {
                        provider: "card".to_string(),
                        message,
                    }
                }
                other => other,
            })?;

        // The client secret is single-use; only the intent id may be logged.
        info!(intent_id = %data.id, "card payment intent created");

        Ok(CreatedIntent {
            intent_id: data.id,
            client_secret: data.client_secret,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> bool {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key);
        verify_hmac_sha256_hex(payload, secret, signature)
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<CardEvent> {
        let parsed: JsonValue =
            serde_json::from_slice(payload).map_err(|e| PaymentError::MalformedCallback {
                message: format!("invalid webhook JSON payload: {}", e),
            })?;

        let event_id = parsed
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let event_type = parsed
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let object = parsed
            .get("data")
            .and_then(|v| v.get("object"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let intent_id = object
            .get("id")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| PaymentError::MalformedCallback {
                message: "webhook event carries no payment intent id".to_string(),
            })?;

        let kind = match event_type.as_str() {
            "payment_intent.succeeded" => CardEventKind::IntentSucceeded,
            "payment_intent.payment_failed" => CardEventKind::IntentFailed,
            other => CardEventKind::Other(other.to_string()),
        };

        Ok(CardEvent {
            event_id,
            kind,
            intent_id,
            amount_minor: object.get("amount").and_then(|v| v.as_i64()),
            currency: object
                .get("currency")
                .and_then(|v| v.as_str())
                .map(|v| v.to_uppercase()),
            failure_message: object
                .get("last_payment_error")
                .and_then(|v| v.get("message"))
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
            payload: parsed,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IntentData {
    id: String,
    client_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> CardNetworkProvider {
        CardNetworkProvider::new(CardNetworkConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: Some("whsec_test".to_string()),
            base_url: "https://cards.test.local".to_string(),
            timeout_secs: 5,
        })
        .expect("provider init should succeed")
    }

    #[test]
    fn webhook_signature_validation_invalid() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        assert!(!provider().verify_webhook(payload, "invalid_signature"));
    }

    #[test]
    fn parses_succeeded_event() {
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_123",
                    "amount": 100000,
                    "currency": "usd",
                    "status": "succeeded"
                }
            }
        });
        let event = provider()
            .parse_webhook_event(payload.to_string().as_bytes())
            .expect("event should parse");
        assert_eq!(event.kind, CardEventKind::IntentSucceeded);
        assert_eq!(event.intent_id, "pi_123");
        assert_eq!(event.amount_minor, Some(100_000));
        assert_eq!(event.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn parses_failed_event_with_reason() {
        let payload = serde_json::json!({
            "id": "evt_2",
            "type": "payment_intent.payment_failed",
            "data": {
                "object": {
                    "id": "pi_456",
                    "amount": 200000,
                    "currency": "usd",
                    "last_payment_error": {"message": "card_declined"}
                }
            }
        });
        let event = provider()
            .parse_webhook_event(payload.to_string().as_bytes())
            .expect("event should parse");
        assert_eq!(event.kind, CardEventKind::IntentFailed);
        assert_eq!(event.failure_message.as_deref(), Some("card_declined"));
    }

    #[test]
    fn event_without_intent_id_is_malformed() {
        let payload = br#"{"id":"evt_3","type":"payment_intent.succeeded","data":{"object":{}}}"#;
        assert!(matches!(
            provider().parse_webhook_event(payload),
            Err(PaymentError::MalformedCallback { .. })
        ));
    }
}
