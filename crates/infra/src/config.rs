//! Runtime configuration loaded from the environment.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PAYMENT_API_BASE: &str = "https://api.razorpay.com";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Links into the company-facing frontend, used in notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendLinks {
    base: String,
}

impl FrontendLinks {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/company/login", self.base)
    }

    pub fn messages_url(&self) -> String {
        format!("{}/company/messages", self.base)
    }

    pub fn renew_url(&self) -> String {
        format!("{}/company/subscription", self.base)
    }
}

impl Default for FrontendLinks {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_URL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    pub key_id: String,
    /// Signs the client callback.
    pub key_secret: String,
    /// Signs webhook bodies. `None` disables the webhook.
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            key_secret: String::new(),
            webhook_secret: None,
            api_base: DEFAULT_PAYMENT_API_BASE.to_string(),
        }
    }
}

impl PaymentConfig {
    /// Whether real orders can be created with the provider.
    pub fn has_credentials(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// In-memory stores are used when absent.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub frontend: FrontendLinks,
    pub payments: PaymentConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                message: e.to_string(),
            })?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let frontend = get("FRONTEND_URL")
            .map(FrontendLinks::new)
            .unwrap_or_default();

        let payments = PaymentConfig {
            key_id: get("PAYMENT_KEY_ID").unwrap_or_default(),
            key_secret: get("PAYMENT_KEY_SECRET").unwrap_or_default(),
            webhook_secret: get("PAYMENT_WEBHOOK_SECRET"),
            api_base: get("PAYMENT_API_BASE")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_BASE.to_string()),
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            frontend,
            payments,
        })
    }
}
