//! HMAC-SHA256 signatures used by the payment provider.
//!
//! Both checks run before any state is touched. A signature that fails to
//! verify is always [`DomainError::InvalidSignature`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use jobboard_core::{DomainError, DomainResult};

type HmacSha256 = Hmac<Sha256>;

/// Payload signed for the client-side callback: `order_id|payment_id`.
pub fn callback_payload(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}|{payment_id}")
}

/// Lowercase hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign_hex(secret: &[u8], payload: &[u8]) -> DomainResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|err| DomainError::validation(format!("invalid signing secret: {err}")))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the signature returned to the browser after checkout.
pub fn verify_callback(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> DomainResult<()> {
    let payload = callback_payload(order_id, payment_id);
    verify(key_secret.as_bytes(), payload.as_bytes(), signature)
}

/// Verify the `x-razorpay-signature` header against the raw webhook body.
pub fn verify_webhook(webhook_secret: &str, body: &[u8], signature: &str) -> DomainResult<()> {
    verify(webhook_secret.as_bytes(), body, signature)
}

fn verify(secret: &[u8], payload: &[u8], provided: &str) -> DomainResult<()> {
    if secret.is_empty() {
        return Err(DomainError::InvalidSignature);
    }
    let expected = sign_hex(secret, payload)?;
    let provided = provided.trim().to_ascii_lowercase();
    if expected.len() != provided.len() {
        return Err(DomainError::InvalidSignature);
    }
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(DomainError::InvalidSignature)
    }
}
