use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Thin JSON client for provider APIs.
///
/// Calls are bounded by a single timeout and never retried here: the
/// initiation path must fail fast so the session can be marked failed instead
/// of lingering, and the callback networks carry their own redelivery policy.
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PaymentError::ProviderUnavailable {
                provider: "http".to_string(),
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;

        Ok(Self { client, timeout })
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: &str,
        body: &JsonValue,
    ) -> PaymentResult<T> {
        let request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .bearer_auth(bearer_token)
            .header("Content-Type", "application/json")
            .json(body);

        Self::execute(request).await
    }

    pub async fn get_basic<T: DeserializeOwned>(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> PaymentResult<T> {
        let request = self
            .client
            .get(url)
            .timeout(self.timeout)
            .basic_auth(username, Some(password));

        Self::execute(request).await
    }

    async fn execute<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> PaymentResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::ProviderUnavailable {
                provider: "http".to_string(),
                message: format!("provider request failed: {}", e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(PaymentError::ProviderUnavailable {
                provider: "http".to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderUnavailable {
            provider: "http".to_string(),
            message: format!("invalid provider JSON response: {}", e),
        })
    }
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(computed.as_bytes(), signature.trim().as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
