use thiserror::Error;

use crate::database::error::DatabaseError;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Unknown plan: {plan_id}")]
    InvalidPlan { plan_id: String },

    #[error("Invalid phone number: {reason}")]
    InvalidPhoneNumber { reason: String },

    #[error("Payment provider unavailable: provider={provider}, message={message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("Malformed callback payload: {message}")]
    MalformedCallback { message: String },

    #[error("No payment session for correlation id: {correlation_id}")]
    UnknownSession { correlation_id: String },

    #[error("Callback already settled for correlation id: {correlation_id}")]
    DuplicateCallback { correlation_id: String },

    #[error("Durable store unavailable: {message}")]
    StoreUnavailable { message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::InvalidPlan { .. } => false,
            PaymentError::InvalidPhoneNumber { .. } => false,
            PaymentError::ProviderUnavailable { .. } => true,
            PaymentError::MalformedCallback { .. } => false,
            PaymentError::UnknownSession { .. } => false,
            PaymentError::DuplicateCallback { .. } => false,
            PaymentError::StoreUnavailable { .. } => true,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::InvalidPlan { .. } => 400,
            PaymentError::InvalidPhoneNumber { .. } => 400,
            PaymentError::ProviderUnavailable { .. } => 502,
            PaymentError::MalformedCallback { .. } => 400,
            PaymentError::UnknownSession { .. } => 404,
            PaymentError::DuplicateCallback { .. } => 409,
            PaymentError::StoreUnavailable { .. } => 500,
        }
    }

    /// Stable machine-readable code for the API error envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            PaymentError::InvalidPlan { .. } => "INVALID_PLAN",
            PaymentError::InvalidPhoneNumber { .. } => "INVALID_PHONE_NUMBER",
            PaymentError::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            PaymentError::MalformedCallback { .. } => "MALFORMED_CALLBACK",
            PaymentError::UnknownSession { .. } => "UNKNOWN_SESSION",
            PaymentError::DuplicateCallback { .. } => "DUPLICATE_CALLBACK",
            PaymentError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
        }
    }

    /// Caller-facing message. Never carries provider or store internals.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::InvalidPlan { .. } => "Unknown subscription plan".to_string(),
            PaymentError::InvalidPhoneNumber { .. } => {
                "Phone number is not a valid subscriber number".to_string()
            }
            PaymentError::ProviderUnavailable { .. } => {
                "Payment provider is temporarily unavailable. Please retry".to_string()
            }
            PaymentError::MalformedCallback { .. } => "Invalid callback payload".to_string(),
            PaymentError::UnknownSession { .. } => "Payment session not found".to_string(),
            PaymentError::DuplicateCallback { .. } => "Payment already processed".to_string(),
            PaymentError::StoreUnavailable { .. } => {
                "Service temporarily unavailable. Please retry".to_string()
            }
        }
    }
}

impl From<DatabaseError> for PaymentError {
    fn from(err: DatabaseError) -> Self {
        PaymentError::StoreUnavailable {
            message: err.to_string(),
        }
    }
}
