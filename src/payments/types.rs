use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

use crate::payments::error::PaymentError;

/// The two payment networks a session can run through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Card,
    MobileMoney,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Card => "card",
            Provider::MobileMoney => "mobile_money",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" => Ok(Provider::Card),
            "mobile_money" | "mobile-money" => Ok(Provider::MobileMoney),
            _ => Err(PaymentError::MalformedCallback {
                message: format!("unsupported provider: {}", value),
            }),
        }
    }
}

/// Payment session lifecycle state.
///
/// `initiated` is the only live state; the three terminal states are final.
/// A terminal session never transitions again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initiated,
    Confirmed,
    Failed,
    Expired,
}

impl SessionStatus {
    /// Get all valid transitions from this state
    pub fn valid_transitions(&self) -> Vec<SessionStatus> {
        match self {
            SessionStatus::Initiated => vec![
                SessionStatus::Confirmed,
                SessionStatus::Failed,
                SessionStatus::Expired,
            ],
            // Terminal states - no valid transitions
            SessionStatus::Confirmed => vec![],
            SessionStatus::Failed => vec![],
            SessionStatus::Expired => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Initiated)
    }

    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Initiated => "initiated",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Failed => "failed",
            SessionStatus::Expired => "expired",
        }
    }

    /// Parse a database status string.
    pub fn parse(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "initiated" => Some(SessionStatus::Initiated),
            "confirmed" => Some(SessionStatus::Confirmed),
            "failed" => Some(SessionStatus::Failed),
            "expired" => Some(SessionStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger row state. The ledger is append-only; rows never change state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Subscription row state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

/// Billing interval of a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    Month,
    Year,
}

impl PlanInterval {
    /// Compute the end of a billing period starting at `start`.
    pub fn period_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            PlanInterval::Month => 1,
            PlanInterval::Year => 12,
        };
        start
            .checked_add_months(chrono::Months::new(months))
            .unwrap_or_else(|| start + chrono::Duration::days(30 * i64::from(months)))
    }
}

/// Request to create a card-network payment intent.
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub user_id: Uuid,
    pub plan_id: String,
}

/// A created card-network payment intent.
///
/// `client_secret` is single-use and must never be logged.
#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Request to trigger a mobile-money push prompt on the payer's device.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub msisdn: String,
    pub account_reference: String,
    pub description: String,
}

/// The mobile-money network's acknowledgement of a push request.
#[derive(Debug, Clone)]
pub struct PushReceipt {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: Option<String>,
}

/// Card-network webhook event kinds this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEventKind {
    IntentSucceeded,
    IntentFailed,
    Other(String),
}

/// A parsed card-network webhook event.
#[derive(Debug, Clone)]
pub struct CardEvent {
    pub event_id: String,
    pub kind: CardEventKind,
    pub intent_id: String,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub failure_message: Option<String>,
    pub payload: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_status_transitions_valid() {
        assert!(SessionStatus::Initiated.can_transition_to(SessionStatus::Confirmed));
        assert!(SessionStatus::Initiated.can_transition_to(SessionStatus::Failed));
        assert!(SessionStatus::Initiated.can_transition_to(SessionStatus::Expired));
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(SessionStatus::Confirmed.valid_transitions().is_empty());
        assert!(SessionStatus::Failed.valid_transitions().is_empty());
        assert!(SessionStatus::Expired.valid_transitions().is_empty());
    }

    #[test]
    fn terminal_flags() {
        assert!(!SessionStatus::Initiated.is_terminal());
        assert!(SessionStatus::Confirmed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            SessionStatus::Initiated,
            SessionStatus::Confirmed,
            SessionStatus::Failed,
            SessionStatus::Expired,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("pending"), None);
    }

    #[test]
    fn provider_parsing() {
        assert_eq!(Provider::from_str("card").ok(), Some(Provider::Card));
        assert_eq!(
            Provider::from_str("mobile_money").ok(),
            Some(Provider::MobileMoney)
        );
        assert!(Provider::from_str("cash").is_err());
    }

    #[test]
    fn monthly_period_end_advances_one_calendar_month() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let end = PlanInterval::Month.period_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn yearly_period_end_advances_one_year() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let end = PlanInterval::Year.period_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap());
    }
}
