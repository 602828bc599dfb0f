use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::MobileMoneyGateway;
use crate::payments::types::{PushReceipt, PushRequest};
use crate::payments::utils::GatewayHttpClient;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bigdecimal::ToPrimitive;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MobileMoneyConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl MobileMoneyConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let consumer_key = std::env::var("MOBILE_MONEY_CONSUMER_KEY").unwrap_or_default();
        let consumer_secret = std::env::var("MOBILE_MONEY_CONSUMER_SECRET").unwrap_or_default();
        let shortcode = std::env::var("MOBILE_MONEY_SHORTCODE").unwrap_or_default();
        let passkey = std::env::var("MOBILE_MONEY_PASSKEY").unwrap_or_default();
        let callback_url = std::env::var("MOBILE_MONEY_CALLBACK_URL").unwrap_or_default();

        if consumer_key.is_empty()
            || consumer_secret.is_empty()
            || shortcode.is_empty()
            || passkey.is_empty()
            || callback_url.is_empty()
        {
            return Err(PaymentError::ProviderUnavailable {
                provider: "mobile_money".to_string(),
                message: "MOBILE_MONEY_CONSUMER_KEY, MOBILE_MONEY_CONSUMER_SECRET, \
                          MOBILE_MONEY_SHORTCODE, MOBILE_MONEY_PASSKEY and \
                          MOBILE_MONEY_CALLBACK_URL are required"
                    .to_string(),
            });
        }

        Ok(Self {
            consumer_key,
            consumer_secret,
            shortcode,
            passkey,
            callback_url,
            base_url: std::env::var("MOBILE_MONEY_BASE_URL")
                .unwrap_or_else(|_| "https://api.safaricom.co.ke".to_string()),
            timeout_secs: std::env::var("MOBILE_MONEY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        })
    }
}

/// Client for the mobile-money network's push-prompt API.
pub struct MobileMoneyProvider {
    config: MobileMoneyConfig,
    http: GatewayHttpClient,
}

impl MobileMoneyProvider {
    pub fn new(config: MobileMoneyConfig) -> PaymentResult<Self> {
        let http = GatewayHttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(MobileMoneyConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn access_token(&self) -> PaymentResult<String> {
        let data: TokenData = self
            .http
            .get_basic(
                &self.endpoint("/oauth/v1/generate?grant_type=client_credentials"),
                &self.config.consumer_key,
                &self.config.consumer_secret,
            )
            .await
            .map_err(|e| provider_error(e, "token request failed"))?;

        Ok(data.access_token)
    }
}

#[async_trait]
impl MobileMoneyGateway for MobileMoneyProvider {
    async fn initiate_push(&self, request: PushRequest) -> PaymentResult<PushReceipt> {
        // The push API takes whole currency units.
        let amount = request
            .amount
            .with_scale(0)
            .to_u64()
            .filter(|v| *v > 0)
            .ok_or_else(|| PaymentError::ProviderUnavailable {
                provider: "mobile_money".to_string(),
                message: format!("push amount out of range: {}", request.amount),
            })?;

        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);

        let payload = serde_json::json!({
            "BusinessShortCode": self.config.shortcode.as_str(),
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount,
            "PartyA": request.msisdn.as_str(),
            "PartyB": self.config.shortcode.as_str(),
            "PhoneNumber": request.msisdn.as_str(),
            "CallBackURL": self.config.callback_url.as_str(),
            "AccountReference": request.account_reference,
            "TransactionDesc": request.description,
        });

        let data: PushData = self
            .http
            .post_json(
                &self.endpoint("/mpesa/stkpush/v1/processrequest"),
                &token,
                &payload,
            )
            .await
            .map_err(|e| provider_error(e, "push request failed"))?;

        if data.response_code != "0" {
            return Err(PaymentError::ProviderUnavailable {
                provider: "mobile_money".to_string(),
                message: data.response_description,
            });
        }

        info!(
            checkout_request_id = %data.checkout_request_id,
            "mobile money push accepted"
        );

        Ok(PushReceipt {
            checkout_request_id: data.checkout_request_id,
            merchant_request_id: data.merchant_request_id,
            customer_message: data.customer_message,
        })
    }
}

fn provider_error(err: PaymentError, context: &str) -> PaymentError {
    match err {
        PaymentError::ProviderUnavailable { message, .. } => PaymentError::ProviderUnavailable {
            provider: "mobile_money".to_string(),
            message: format!("{}: {}", context, message),
        },
        other => other,
    }
}

/// Push password: base64 of shortcode + passkey + timestamp.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// Normalize a subscriber number to international digits-only form.
///
/// Accepts `+<prefix>7XXXXXXXX`, `<prefix>7XXXXXXXX`, `07XXXXXXXX` and bare
/// `7XXXXXXXX` inputs. Anything non-numeric or of implausible length is
/// rejected.
pub fn normalize_msisdn(raw: &str, country_prefix: &str) -> PaymentResult<String> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"^[0-9]+$").expect("static pattern"));

    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if stripped.is_empty() {
        return Err(PaymentError::InvalidPhoneNumber {
            reason: "phone number is empty".to_string(),
        });
    }
    if !digits.is_match(stripped) {
        return Err(PaymentError::InvalidPhoneNumber {
            reason: "phone number must contain digits only".to_string(),
        });
    }

    let normalized = if let Some(rest) = stripped.strip_prefix('0') {
        format!("{}{}", country_prefix, rest)
    } else if stripped.starts_with(country_prefix) {
        stripped.to_string()
    } else {
        format!("{}{}", country_prefix, stripped)
    };

    let subscriber_len = normalized.len() - country_prefix.len();
    if !(8..=10).contains(&subscriber_len) {
        return Err(PaymentError::InvalidPhoneNumber {
            reason: format!("implausible subscriber number length: {}", normalized.len()),
        });
    }

    Ok(normalized)
}

#[derive(Debug, Deserialize)]
struct TokenData {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PushData {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription")]
    response_description: String,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Callback document
// ---------------------------------------------------------------------------

/// The asynchronous result the network posts back after a push prompt.
#[derive(Debug, Deserialize)]
pub struct CallbackDocument {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: JsonValue,
}

/// The transaction facts extracted from a successful callback's metadata.
#[derive(Debug, Clone)]
pub struct CallbackCharge {
    pub transaction_id: String,
    pub amount: bigdecimal::BigDecimal,
    pub currency: Option<String>,
    pub msisdn: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn metadata_value(&self, name: &str) -> Option<&JsonValue> {
        self.callback_metadata
            .as_ref()?
            .item
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.value)
    }

    /// Extract the transaction facts a successful callback must carry.
    pub fn extract_charge(&self) -> PaymentResult<CallbackCharge> {
        let transaction_id = self
            .metadata_value("MpesaReceiptNumber")
            .or_else(|| self.metadata_value("ReceiptNumber"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| PaymentError::MalformedCallback {
                message: "success callback carries no receipt number".to_string(),
            })?;

        let amount = self
            .metadata_value("Amount")
            .and_then(json_number_to_decimal)
            .ok_or_else(|| PaymentError::MalformedCallback {
                message: "success callback carries no amount".to_string(),
            })?;

        let currency = self
            .metadata_value("Currency")
            .and_then(|v| v.as_str())
            .map(|v| v.to_uppercase());

        let msisdn = self.metadata_value("PhoneNumber").map(|v| match v {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        });

        let paid_at = self
            .metadata_value("TransactionDate")
            .map(|v| match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .and_then(|raw| NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M%S").ok())
            .map(|naive| naive.and_utc());

        Ok(CallbackCharge {
            transaction_id,
            amount,
            currency,
            msisdn,
            paid_at,
        })
    }
}

fn json_number_to_decimal(value: &JsonValue) -> Option<bigdecimal::BigDecimal> {
    use std::str::FromStr;

    match value {
        JsonValue::Number(n) => bigdecimal::BigDecimal::from_str(&n.to_string()).ok(),
        JsonValue::String(s) => bigdecimal::BigDecimal::from_str(s).ok(),
        _ => None,
    }
}
