use chrono::{DateTime, NaiveDate, SecondsFormat};
use kpay_orchestrator::signature::{
    espay_asymmetric_signature, espay_hash_signature, midtrans_notification_signature, senangpay_payment_hash,
    verify_espay_signature, verify_senangpay_callback, EspayAction, HashSignatureInput,
};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

fn input() -> HashSignatureInput<'static> {
    HashSignatureInput {
        signature_key: "sig-key",
        rq_uuid: "5f1c7a1e-0000-4000-8000-000000000001",
        rq_datetime: NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(10, 11, 12))
            .unwrap(),
        order_id: "ORD-1",
        amount: "100000",
        currency: "IDR",
        comm_code: "SGWKLIK",
        action: EspayAction::SendInvoice,
    }
}

#[test]
fn hash_signature_is_deterministic() {
    assert_eq!(espay_hash_signature(&input()), espay_hash_signature(&input()));
    assert_eq!(espay_hash_signature(&input()).len(), 64);
}

#[test]
fn one_character_changes_the_hash() {
    let base = espay_hash_signature(&input());
    let variants = [
        HashSignatureInput { signature_key: "sig-kez", ..input() },
        HashSignatureInput { order_id: "ORD-2", ..input() },
        HashSignatureInput { amount: "100001", ..input() },
        HashSignatureInput { currency: "MYR", ..input() },
        HashSignatureInput { comm_code: "SGWKLIX", ..input() },
        HashSignatureInput { action: EspayAction::Inquiry, ..input() },
    ];
    for v in variants {
        assert_ne!(espay_hash_signature(&v), base);
    }
}

#[test]
fn senangpay_callback_accepts_matching_hash_in_any_case() {
    let hash = kpay_orchestrator::signature::hmac_sha256_hex("secret", &["secret", "1", "ORD-1", "TX-1", "ok"]);
    assert!(verify_senangpay_callback("secret", "1", "ORD-1", "TX-1", "ok", &hash.to_uppercase()));
    assert!(!verify_senangpay_callback("secret", "0", "ORD-1", "TX-1", "ok", &hash));
    assert!(!verify_senangpay_callback("secret", "1", "ORD-1", "TX-1", "ok", ""));

    let legacy = kpay_orchestrator::signature::md5_hex(&["secret", "1", "ORD-1", "TX-1", "ok"]);
    assert!(verify_senangpay_callback("secret", "1", "ORD-1", "TX-1", "ok", &legacy));
}

#[test]
fn senangpay_payment_hash_depends_on_amount() {
    assert_ne!(
        senangpay_payment_hash("secret", "detail", "10.00", "ORD-1"),
        senangpay_payment_hash("secret", "detail", "10.01", "ORD-1")
    );
}

#[test]
fn midtrans_signature_is_sha512_hex() {
    let sig = midtrans_notification_signature("ORD-1", "200", "10000.00", "server-key");
    assert_eq!(sig.len(), 128);
    assert_ne!(sig, midtrans_notification_signature("ORD-1", "201", "10000.00", "server-key"));
}

#[test]
fn asymmetric_signature_verifies_with_public_key() {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let private_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap();
    let public_pem = key.to_public_key().to_public_key_pem(LineEnding::LF).unwrap();

    let ts = DateTime::parse_from_rfc3339("2025-01-02T03:04:05+07:00").unwrap();
    let stamp = ts.to_rfc3339_opts(SecondsFormat::Secs, true);
    let body = br#"{"partnerReferenceNo":"ORD-1"}"#;
    let path = "/webhooks/espay/payment";

    let signature = espay_asymmetric_signature(&private_pem, "POST", path, body, &ts).unwrap();
    assert!(verify_espay_signature(&public_pem, "POST", path, body, &stamp, &signature));
    assert!(!verify_espay_signature(&public_pem, "POST", path, b"{}", &stamp, &signature));
    assert!(!verify_espay_signature(&public_pem, "POST", "/other", body, &stamp, &signature));
    assert!(!verify_espay_signature("garbage", "POST", path, body, &stamp, &signature));
}
