//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use bigdecimal::BigDecimal;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub payment: PaymentConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Payment lifecycle configuration
///
/// The conversion rate is fixed per deployment: `mobile_money_rate` is the
/// number of localized currency units per one canonical unit.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub session_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub canonical_currency: String,
    pub localized_currency: String,
    pub mobile_money_rate: BigDecimal,
    pub msisdn_country_prefix: String,
    pub plan_catalog_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.payment.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let rate_raw = env::var("MOBILE_MONEY_RATE").unwrap_or_else(|_| "150".to_string());
        let mobile_money_rate = BigDecimal::from_str(&rate_raw)
            .map_err(|_| ConfigError::InvalidValue("MOBILE_MONEY_RATE".to_string()))?;

        Ok(PaymentConfig {
            session_ttl_seconds: env::var("SESSION_TTL_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SESSION_TTL_SECONDS".to_string()))?,
            sweep_interval_seconds: env::var("SESSION_SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("SESSION_SWEEP_INTERVAL_SECONDS".to_string())
                })?,
            canonical_currency: env::var("CANONICAL_CURRENCY")
                .unwrap_or_else(|_| "USD".to_string()),
            localized_currency: env::var("MOBILE_MONEY_CURRENCY")
                .unwrap_or_else(|_| "KES".to_string()),
            mobile_money_rate,
            msisdn_country_prefix: env::var("MSISDN_COUNTRY_PREFIX")
                .unwrap_or_else(|_| "254".to_string()),
            plan_catalog_path: env::var("PLAN_CATALOG_PATH").ok(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_SECONDS cannot be 0".to_string(),
            ));
        }

        if self.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_SWEEP_INTERVAL_SECONDS cannot be 0".to_string(),
            ));
        }

        if self.mobile_money_rate <= BigDecimal::from(0) {
            return Err(ConfigError::InvalidValue(
                "MOBILE_MONEY_RATE must be positive".to_string(),
            ));
        }

        if self.canonical_currency.trim().is_empty() || self.localized_currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "currency codes cannot be empty".to_string(),
            ));
        }

        if self.canonical_currency == self.localized_currency {
            return Err(ConfigError::InvalidValue(
                "CANONICAL_CURRENCY and MOBILE_MONEY_CURRENCY must differ".to_string(),
            ));
        }

        if !self
            .msisdn_country_prefix
            .chars()
            .all(|c| c.is_ascii_digit())
            || self.msisdn_country_prefix.is_empty()
        {
            return Err(ConfigError::InvalidValue(
                "MSISDN_COUNTRY_PREFIX must be numeric".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_config() -> PaymentConfig {
        PaymentConfig {
            session_ttl_seconds: 600,
            sweep_interval_seconds: 60,
            canonical_currency: "USD".to_string(),
            localized_currency: "KES".to_string(),
            mobile_money_rate: BigDecimal::from(150),
            msisdn_country_prefix: "254".to_string(),
            plan_catalog_path: None,
        }
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_payment_config_validation() {
        assert!(payment_config().validate().is_ok());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut config = payment_config();
        config.mobile_money_rate = BigDecimal::from(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_currency_pair_rejected() {
        let mut config = payment_config();
        config.localized_currency = "USD".to_string();
        assert!(config.validate().is_err());
    }
}
