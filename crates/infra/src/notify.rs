//! Outbound company notifications.
//!
//! Delivery is best-effort. Lifecycle and payment flows dispatch and move on;
//! only the expiry sweeper waits for the outcome, because it must not mark a
//! reminder as sent when delivery failed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use jobboard_payments::PaymentOrigin;

/// Message templates sent to companies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "template", rename_all = "camelCase")]
pub enum Notification {
    CompanyApproved {
        company_name: String,
        contact_name: Option<String>,
        login_url: String,
    },
    CompanyDenied {
        company_name: String,
        reason: String,
    },
    CompanyOnHold {
        company_name: String,
        reason: String,
        messages_url: String,
    },
    NewAdminMessage {
        company_name: String,
        message: String,
        messages_url: String,
    },
    RenewalReminder {
        company_name: String,
        plan_label: String,
        ends_at: DateTime<Utc>,
        days_remaining: i64,
        renew_url: String,
    },
    ExpiresToday {
        company_name: String,
        plan_label: String,
        ends_at: DateTime<Utc>,
        renew_url: String,
    },
    DowngradedToFree {
        company_name: String,
        previous_plan_label: String,
        job_limit: u32,
        jobs_deactivated: u64,
        upgrade_url: String,
    },
    SubscriptionActivated {
        company_name: String,
        plan_label: String,
        ends_at: Option<DateTime<Utc>>,
        job_limit: u32,
        origin: PaymentOrigin,
        payment_id: Option<String>,
    },
}

impl Notification {
    pub fn template_kind(&self) -> &'static str {
        match self {
            Notification::CompanyApproved { .. } => "companyApproved",
            Notification::CompanyDenied { .. } => "companyDenied",
            Notification::CompanyOnHold { .. } => "companyOnHold",
            Notification::NewAdminMessage { .. } => "newAdminMessage",
            Notification::RenewalReminder { .. } => "renewalReminder",
            Notification::ExpiresToday { .. } => "expiresToday",
            Notification::DowngradedToFree { .. } => "downgradedToFree",
            Notification::SubscriptionActivated { .. } => "subscriptionActivated",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        info!(
            %recipient,
            template = notification.template_kind(),
            %payload,
            "notification sent"
        );
        Ok(())
    }
}

/// Keeps every notification in memory. Used by tests and local runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent()
            .iter()
            .map(|(_, n)| n.template_kind())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let failing = self.failing.lock().map(|f| *f).unwrap_or(false);
        if failing {
            return Err(NotifyError::Delivery("mail relay unavailable".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Delivery("recorder poisoned".to_string()))?;
        sent.push((recipient.to_string(), notification.clone()));
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Fire and forget. Must be called from within a tokio runtime.
    pub fn dispatch(&self, recipient: &str, notification: Notification) {
        let notifier = Arc::clone(&self.notifier);
        let recipient = recipient.to_string();
        tokio::spawn(async move {
            deliver_with(notifier.as_ref(), &recipient, &notification).await;
        });
    }

    /// Deliver and report whether it went through.
    pub async fn deliver(&self, recipient: &str, notification: &Notification) -> bool {
        deliver_with(self.notifier.as_ref(), recipient, notification).await
    }
}

async fn deliver_with(
    notifier: &dyn Notifier,
    recipient: &str,
    notification: &Notification,
) -> bool {
    match notifier.send(recipient, notification).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                %recipient,
                template = notification.template_kind(),
                error = %e,
                "notification delivery failed"
            );
            false
        }
    }
}
