//! Payment reconciliation primitives.
//!
//! Signature verification for the client callback and the provider webhook,
//! webhook payload parsing, and the order types exchanged with the payment
//! provider. Pure logic; the HTTP client and the activation service live in
//! `jobboard-infra`.

pub mod order;
pub mod signature;
pub mod webhook;

pub use order::{OrderHandle, OrderNotes, OrderRequest, PaymentOrigin, receipt_for};
pub use signature::{callback_payload, sign_hex, verify_callback, verify_webhook};
pub use webhook::{PaymentWebhookEvent, parse_webhook};
