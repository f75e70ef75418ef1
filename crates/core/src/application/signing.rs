//! Webhook request signing
//!
//! Signed content is `{webhook-id}.{webhook-timestamp}.{body}`, keyed by the
//! subscription secret with HMAC-SHA256. The `webhook-signature` header is
//! `v1,<base64>`; receivers may get several space-separated signatures.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_WEBHOOK_ID: &str = "webhook-id";
pub const HEADER_WEBHOOK_TIMESTAMP: &str = "webhook-timestamp";
pub const HEADER_WEBHOOK_SIGNATURE: &str = "webhook-signature";
pub const SIGNATURE_VERSION: &str = "v1";

/// Prefix marking a base64-encoded secret
const SECRET_PREFIX: &str = "whsec_";

/// Sign a payload. Pure: equal inputs always give equal output.
pub fn sign(msg_id: &str, timestamp: i64, body: &[u8], secret: &str) -> String {
    let mac = compute_mac(msg_id, timestamp, body, secret);
    format!(
        "{},{}",
        SIGNATURE_VERSION,
        BASE64.encode(mac.finalize().into_bytes())
    )
}

/// Verify a `webhook-signature` header value in constant time.
pub fn verify(msg_id: &str, timestamp: i64, body: &[u8], secret: &str, header: &str) -> bool {
    header.split_whitespace().any(|candidate| {
        let Some(encoded) = candidate
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|rest| rest.strip_prefix(','))
        else {
            return false;
        };
        let Ok(expected) = BASE64.decode(encoded) else {
            return false;
        };
        compute_mac(msg_id, timestamp, body, secret)
            .verify_slice(&expected)
            .is_ok()
    })
}

/// The three signing headers for one outbound attempt
pub fn signed_headers(
    msg_id: &str,
    timestamp: i64,
    body: &[u8],
    secret: &str,
) -> Vec<(String, String)> {
    vec![
        (HEADER_WEBHOOK_ID.to_string(), msg_id.to_string()),
        (HEADER_WEBHOOK_TIMESTAMP.to_string(), timestamp.to_string()),
        (
            HEADER_WEBHOOK_SIGNATURE.to_string(),
            sign(msg_id, timestamp, body, secret),
        ),
    ]
}

fn compute_mac(msg_id: &str, timestamp: i64, body: &[u8], secret: &str) -> HmacSha256 {
    let key = secret_bytes(secret);
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&key)
        .expect("HMAC can take key of any size");
    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

fn secret_bytes(secret: &str) -> Vec<u8> {
    match secret.strip_prefix(SECRET_PREFIX) {
        Some(encoded) => BASE64
            .decode(encoded)
            .unwrap_or_else(|_| secret.as_bytes().to_vec()),
        None => secret.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "msg_2KWPBgLlAfxdpx2AI54pPJ85f4W";
    const TS: i64 = 1_706_400_000;
    const BODY: &[u8] = br#"{"type":"contact.created"}"#;
    const SECRET: &str = "my-webhook-secret";

    #[test]
    fn test_signature_deterministic() {
        assert_eq!(sign(ID, TS, BODY, SECRET), sign(ID, TS, BODY, SECRET));
    }

    #[test]
    fn test_signature_changes_with_each_input() {
        let base = sign(ID, TS, BODY, SECRET);
        assert_ne!(base, sign("msg_other", TS, BODY, SECRET));
        assert_ne!(base, sign(ID, TS + 1, BODY, SECRET));
        assert_ne!(base, sign(ID, TS, br#"{"type":"contact.deleted"}"#, SECRET));
        assert_ne!(base, sign(ID, TS, BODY, "other-secret"));
    }

    #[test]
    fn test_signature_format() {
        let sig = sign(ID, TS, BODY, SECRET);
        let encoded = sig.strip_prefix("v1,").expect("v1 prefix");
        // SHA256 = 32 bytes
        assert_eq!(BASE64.decode(encoded).unwrap().len(), 32);
    }

    #[test]
    fn test_signature_matches_manual_hmac() {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}.", ID, TS).as_bytes());
        mac.update(BODY);
        let expected = format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()));

        assert_eq!(sign(ID, TS, BODY, SECRET), expected);
    }

    #[test]
    fn test_prefixed_secret_is_base64_decoded() {
        let raw = b"0123456789abcdef";
        let prefixed = format!("whsec_{}", BASE64.encode(raw));

        let mut mac = <HmacSha256 as Mac>::new_from_slice(raw).unwrap();
        mac.update(format!("{}.{}.", ID, TS).as_bytes());
        mac.update(BODY);
        let expected = format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()));

        assert_eq!(sign(ID, TS, BODY, &prefixed), expected);
    }

    #[test]
    fn test_verify_accepts_own_signature_among_several() {
        let sig = sign(ID, TS, BODY, SECRET);
        let header = format!("v1,Zm9vYmFy {}", sig);
        assert!(verify(ID, TS, BODY, SECRET, &header));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let sig = sign(ID, TS, BODY, SECRET);
        assert!(!verify(ID, TS, b"{}", SECRET, &sig));
        assert!(!verify(ID, TS, BODY, "wrong", &sig));
        assert!(!verify(ID, TS, BODY, SECRET, "v2,abc"));
        assert!(!verify(ID, TS, BODY, SECRET, "v1,not base64!"));
    }

    #[test]
    fn test_signed_headers_names() {
        let headers = signed_headers(ID, TS, BODY, SECRET);
        let names: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["webhook-id", "webhook-timestamp", "webhook-signature"]
        );
        assert_eq!(headers[1].1, "1706400000");
    }
}
