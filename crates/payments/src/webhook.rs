//! Provider webhook payloads.
//!
//! Only `payment.captured` and `order.paid` carry anything actionable. The
//! plan and company email travel in the order notes set at checkout, found
//! on the payment entity or, failing that, on the order entity.

use serde::Deserialize;

use jobboard_core::{DomainError, DomainResult};

use crate::order::OrderNotes;

/// Parsed webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentWebhookEvent {
    PaymentCaptured {
        payment_id: Option<String>,
        order_id: Option<String>,
        notes: Option<OrderNotes>,
    },
    OrderPaid {
        payment_id: Option<String>,
        order_id: Option<String>,
        notes: Option<OrderNotes>,
    },
    /// Anything else; acknowledged and ignored.
    Unknown { event_type: String },
}

impl PaymentWebhookEvent {
    pub fn event_type(&self) -> &str {
        match self {
            PaymentWebhookEvent::PaymentCaptured { .. } => "payment.captured",
            PaymentWebhookEvent::OrderPaid { .. } => "order.paid",
            PaymentWebhookEvent::Unknown { event_type } => event_type,
        }
    }

    /// Notes to activate from, for the events that confirm a payment.
    pub fn activation_notes(&self) -> Option<&OrderNotes> {
        match self {
            PaymentWebhookEvent::PaymentCaptured { notes, .. }
            | PaymentWebhookEvent::OrderPaid { notes, .. } => notes.as_ref(),
            PaymentWebhookEvent::Unknown { .. } => None,
        }
    }

    pub fn payment_id(&self) -> Option<&str> {
        match self {
            PaymentWebhookEvent::PaymentCaptured { payment_id, .. }
            | PaymentWebhookEvent::OrderPaid { payment_id, .. } => payment_id.as_deref(),
            PaymentWebhookEvent::Unknown { .. } => None,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            PaymentWebhookEvent::PaymentCaptured { order_id, .. }
            | PaymentWebhookEvent::OrderPaid { order_id, .. } => order_id.as_deref(),
            PaymentWebhookEvent::Unknown { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    payment: Option<Wrapped>,
    order: Option<Wrapped>,
}

#[derive(Debug, Deserialize)]
struct Wrapped {
    entity: Entity,
}

#[derive(Debug, Deserialize)]
struct Entity {
    id: Option<String>,
    order_id: Option<String>,
    #[serde(default)]
    notes: Option<serde_json::Value>,
}

/// Parse a raw (already signature-checked) webhook body.
pub fn parse_webhook(body: &[u8]) -> DomainResult<PaymentWebhookEvent> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|err| DomainError::validation(format!("malformed webhook body: {err}")))?;

    let payment = envelope.payload.payment.map(|w| w.entity);
    let order = envelope.payload.order.map(|w| w.entity);

    let notes = payment
        .as_ref()
        .and_then(|p| notes_from(p.notes.as_ref()))
        .or_else(|| order.as_ref().and_then(|o| notes_from(o.notes.as_ref())));
    let payment_id = payment.as_ref().and_then(|p| p.id.clone());
    let order_id = order
        .as_ref()
        .and_then(|o| o.id.clone())
        .or_else(|| payment.as_ref().and_then(|p| p.order_id.clone()));

    Ok(match envelope.event.as_str() {
        "payment.captured" => PaymentWebhookEvent::PaymentCaptured {
            payment_id,
            order_id,
            notes,
        },
        "order.paid" => PaymentWebhookEvent::OrderPaid {
            payment_id,
            order_id,
            notes,
        },
        _ => PaymentWebhookEvent::Unknown {
            event_type: envelope.event,
        },
    })
}

// The provider sends `[]` instead of `{}` for empty notes.
fn notes_from(value: Option<&serde_json::Value>) -> Option<OrderNotes> {
    let value = value?;
    let email = value.get("email")?.as_str()?.trim();
    let plan = value.get("plan")?.as_str()?.trim();
    if email.is_empty() || plan.is_empty() {
        return None;
    }
    Some(OrderNotes {
        email: email.to_string(),
        plan: plan.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_captured_reads_notes_from_payment() {
        let body = br#"{
            "event": "payment.captured",
            "payload": {
                "payment": {"entity": {"id": "pay_1", "order_id": "order_1",
                    "notes": {"email": "hr@acme.io", "plan": "paid3m"}}}
            }
        }"#;
        let event = parse_webhook(body).unwrap();
        assert_eq!(event.event_type(), "payment.captured");
        assert_eq!(event.payment_id(), Some("pay_1"));
        assert_eq!(event.order_id(), Some("order_1"));
        let notes = event.activation_notes().unwrap();
        assert_eq!(notes.email, "hr@acme.io");
        assert_eq!(notes.plan, "paid3m");
    }

    #[test]
    fn order_paid_falls_back_to_order_notes() {
        let body = br#"{
            "event": "order.paid",
            "payload": {
                "payment": {"entity": {"id": "pay_2", "notes": []}},
                "order": {"entity": {"id": "order_2",
                    "notes": {"email": "hr@acme.io", "plan": "paid12m"}}}
            }
        }"#;
        let event = parse_webhook(body).unwrap();
        assert!(matches!(event, PaymentWebhookEvent::OrderPaid { .. }));
        assert_eq!(event.order_id(), Some("order_2"));
        assert_eq!(event.activation_notes().unwrap().plan, "paid12m");
    }

    #[test]
    fn other_events_are_unknown() {
        let event = parse_webhook(br#"{"event": "refund.created", "payload": {}}"#).unwrap();
        assert_eq!(
            event,
            PaymentWebhookEvent::Unknown {
                event_type: "refund.created".to_string()
            }
        );
        assert!(event.activation_notes().is_none());
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        match parse_webhook(b"not json") {
            Err(DomainError::Validation(msg)) if msg.contains("webhook") => {}
            other => panic!("Expected validation error, got {other:?}"),
        }
    }
}
