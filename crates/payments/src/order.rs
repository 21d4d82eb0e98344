use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobboard_plans::Plan;

/// Opaque metadata attached to a provider order and echoed back in webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotes {
    pub email: String,
    pub plan: String,
}

/// Order creation request sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

impl OrderRequest {
    pub fn for_plan(email: &str, plan: &Plan, now: DateTime<Utc>) -> Self {
        Self {
            amount: plan.price_minor,
            currency: plan.currency.to_string(),
            receipt: receipt_for(now),
            notes: OrderNotes {
                email: email.to_string(),
                plan: plan.id.as_str().to_string(),
            },
        }
    }
}

/// What the provider hands back for a created order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub order_id: String,
    pub amount: u64,
    pub currency: String,
}

/// Which channel confirmed a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentOrigin {
    ClientVerify,
    Webhook,
    FreePlan,
}

impl PaymentOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOrigin::ClientVerify => "client-verify",
            PaymentOrigin::Webhook => "webhook",
            PaymentOrigin::FreePlan => "free-plan",
        }
    }
}

impl core::fmt::Display for PaymentOrigin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt reference for a new order.
pub fn receipt_for(now: DateTime<Utc>) -> String {
    format!("rcpt_{}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jobboard_plans::PlanId;

    #[test]
    fn order_request_carries_plan_price_and_notes() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let req = OrderRequest::for_plan("hr@acme.io", PlanId::Paid6m.plan(), now);
        assert_eq!(req.amount, PlanId::Paid6m.plan().price_minor);
        assert_eq!(req.currency, "INR");
        assert_eq!(req.receipt, format!("rcpt_{}", now.timestamp_millis()));
        assert_eq!(req.notes.plan, "paid6m");
        assert_eq!(req.notes.email, "hr@acme.io");
    }

    #[test]
    fn origin_serializes_kebab_case() {
        assert_eq!(PaymentOrigin::ClientVerify.as_str(), "client-verify");
        assert_eq!(PaymentOrigin::Webhook.to_string(), "webhook");
    }
}
