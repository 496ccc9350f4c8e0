//! Request-signing primitives for the aggregator families.
//!
//! Espay uses two schemes: an uppercase `##`-delimited SHA-256 hash for
//! form-encoded invoice calls, and an RSA PKCS#1 v1.5 signature over a
//! `METHOD:PATH:DIGEST:TIMESTAMP` string for host-to-host JSON calls.
//! SenangPay signs with HMAC-SHA256 and still accepts legacy MD5 hashes on
//! inbound callbacks. Midtrans notifications carry a SHA-512 signature key.

use crate::error::GatewayError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use hmac::{Hmac, Mac};
use md5::Md5;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EspayAction {
    Inquiry,
    PaymentReport,
    CheckStatus,
    ExpireTransaction,
    SendInvoice,
}

impl EspayAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EspayAction::Inquiry => "INQUIRY",
            EspayAction::PaymentReport => "PAYMENTREPORT",
            EspayAction::CheckStatus => "CHECKSTATUS",
            EspayAction::ExpireTransaction => "EXPIRETRANSACTION",
            EspayAction::SendInvoice => "SENDINVOICE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HashSignatureInput<'a> {
    pub signature_key: &'a str,
    pub rq_uuid: &'a str,
    pub rq_datetime: NaiveDateTime,
    pub order_id: &'a str,
    pub amount: &'a str,
    pub currency: &'a str,
    pub comm_code: &'a str,
    pub action: EspayAction,
}

pub fn espay_hash_signature(input: &HashSignatureInput<'_>) -> String {
    let raw = format!(
        "##{}##{}##{}##{}##{}##{}##{}##{}##",
        input.signature_key,
        input.rq_uuid,
        input.rq_datetime.format("%Y-%m-%d %H:%M:%S"),
        input.order_id,
        input.amount,
        input.currency,
        input.comm_code,
        input.action.as_str(),
    );
    hex::encode(Sha256::digest(raw.to_uppercase().as_bytes()))
}

/// Lowercase hex SHA-256 of the exact body bytes sent on the wire.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body)).to_lowercase()
}

pub fn string_to_sign(method: &str, path: &str, digest: &str, timestamp: &DateTime<FixedOffset>) -> String {
    format!(
        "{}:{}:{}:{}",
        method,
        path,
        digest,
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, GatewayError> {
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| GatewayError::Signature(format!("failed to parse private key: {e}")))
}

fn parse_public_key(pem: &str) -> Option<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .ok()
}

/// Signs a host-to-host request body. Key or signing failures are fatal for
/// the current attempt.
pub fn espay_asymmetric_signature(
    private_key_pem: &str,
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: &DateTime<FixedOffset>,
) -> Result<String, GatewayError> {
    let key = parse_private_key(private_key_pem)?;
    let payload = string_to_sign(method, path, &body_digest(body), timestamp);
    let hashed = Sha256::digest(payload.as_bytes());
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
        .map_err(|e| GatewayError::Signature(format!("failed to sign: {e}")))?;
    Ok(STANDARD.encode(signature))
}

/// Verifies an inbound Espay `X-SIGNATURE` header.
pub fn verify_espay_signature(
    public_key_pem: &str,
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: &str,
    signature_b64: &str,
) -> bool {
    let Some(key) = parse_public_key(public_key_pem) else {
        return false;
    };
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let payload = format!("{}:{}:{}:{}", method, path, body_digest(body), timestamp);
    let hashed = Sha256::digest(payload.as_bytes());
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature)
        .is_ok()
}

/// HMAC-SHA256 keyed by `secret` over the concatenated parts, hex encoded.
pub fn hmac_sha256_hex(secret: &str, parts: &[&str]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    for part in parts {
        mac.update(part.as_bytes());
    }
    hex::encode(mac.finalize().into_bytes())
}

pub fn md5_hex(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hash sent with the SenangPay payment redirect.
pub fn senangpay_payment_hash(secret: &str, detail: &str, amount: &str, order_id: &str) -> String {
    hmac_sha256_hex(secret, &[secret, detail, amount, order_id])
}

/// Accepts either the HMAC-SHA256 or the legacy MD5 hash of a SenangPay
/// callback, compared case-insensitively.
pub fn verify_senangpay_callback(
    secret: &str,
    status_id: &str,
    order_id: &str,
    transaction_id: &str,
    msg: &str,
    received: &str,
) -> bool {
    let parts = [secret, status_id, order_id, transaction_id, msg];
    let received = received.trim();
    !secret.is_empty()
        && !received.is_empty()
        && (hmac_sha256_hex(secret, &parts).eq_ignore_ascii_case(received)
            || md5_hex(&parts).eq_ignore_ascii_case(received))
}

pub fn midtrans_notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let raw = format!("{order_id}{status_code}{gross_amount}{server_key}");
    hex::encode(Sha512::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_digest() {
        assert_eq!(md5_hex(&["abc"]), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn string_to_sign_uses_rfc3339_offset() {
        let ts = DateTime::parse_from_rfc3339("2025-01-02T03:04:05+07:00").unwrap();
        assert_eq!(
            string_to_sign("POST", "/api/v1.0/debit/payment-host-to-host", "abc", &ts),
            "POST:/api/v1.0/debit/payment-host-to-host:abc:2025-01-02T03:04:05+07:00"
        );
    }

    #[test]
    fn invalid_private_key_is_a_signature_error() {
        let ts = DateTime::parse_from_rfc3339("2025-01-02T03:04:05+07:00").unwrap();
        let err = espay_asymmetric_signature("not a key", "POST", "/x", b"{}", &ts).unwrap_err();
        assert!(matches!(err, GatewayError::Signature(_)));
    }
}
