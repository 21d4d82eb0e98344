//! Payment provider client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use jobboard_payments::{OrderHandle, OrderRequest};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("payment provider is not configured")]
    NotConfigured,

    #[error("payment provider request failed: {0}")]
    Http(String),

    #[error("payment provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> &str;

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: u64,
    currency: String,
}

/// Razorpay orders API over HTTPS with basic auth.
pub struct RazorpayClient {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(
        api_base: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }
}

#[async_trait]
impl PaymentProvider for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle, ProviderError> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(ProviderError::NotConfigured);
        }

        let url = format!("{}/v1/orders", self.api_base);
        debug!(%url, receipt = %request.receipt, amount = request.amount, "creating order");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "order creation rejected");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Http(format!("unreadable order response: {e}")))?;
        Ok(OrderHandle {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }
}

/// Issues local order ids without calling out. For development and tests.
#[derive(Debug, Clone)]
pub struct OfflinePaymentProvider {
    key_id: String,
}

impl OfflinePaymentProvider {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for OfflinePaymentProvider {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle, ProviderError> {
        Ok(OrderHandle {
            order_id: format!("order_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
        })
    }
}
