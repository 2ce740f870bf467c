//! Boundary checks for inbound webhooks.
//!
//! A delivery is accepted only if, in order:
//!
//! 1. the signature header is present,
//! 2. it is the HMAC-SHA256 of the raw body under the shared secret,
//! 3. the body is a JSON webhook with a `payload.id`,
//! 4. `payload.created_at` is inside the freshness window,
//! 5. `(type, payload.id)` has not been claimed inside the dedup window.
//!
//! The claim in step 5 is taken before the envelope is handed on, so a
//! concurrent duplicate always loses.

use super::event::{EventType, WebhookEnvelope, payload_str};
use super::idempotency::{DedupKey, IdempotencyStore};
use crate::error::{BridgeError, Result};
use crate::utils::now_epoch_secs;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded signature
pub const SIGNATURE_HEADER: &str = "x-front-signature";

/// Timestamps above this are epoch milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Trait for verifying webhook signatures
#[async_trait]
pub trait WebhookVerifier: Send + Sync {
    /// `Ok(true)` if `signature` authenticates `payload`
    async fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<bool>;
}

/// HMAC-SHA256 verifier for hex-encoded signatures, compared in constant time
pub struct HmacSha256Verifier {
    secret: SecretString,
    /// Optional prefix to strip from signatures (e.g. `sha256=`)
    signature_prefix: Option<String>,
}

impl HmacSha256Verifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            signature_prefix: None,
        }
    }

    pub fn new_with_prefix(secret: SecretString, prefix: impl Into<String>) -> Self {
        Self {
            secret,
            signature_prefix: Some(prefix.into()),
        }
    }

    fn compute_signature(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| BridgeError::internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn decode_signature(&self, signature: &str) -> Option<Vec<u8>> {
        let sig = signature.trim();
        let sig = match &self.signature_prefix {
            Some(prefix) => sig.strip_prefix(prefix.as_str()).unwrap_or(sig),
            None => sig,
        };
        hex::decode(sig).ok()
    }
}

impl std::fmt::Debug for HmacSha256Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Verifier")
            .field("signature_prefix", &self.signature_prefix)
            .finish_non_exhaustive()
    }
}

/// Hex HMAC-SHA256 of `payload` under `secret`, as a sender would compute it
pub fn sign(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[async_trait]
impl WebhookVerifier for HmacSha256Verifier {
    async fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let provided = match self.decode_signature(signature) {
            Some(bytes) => bytes,
            None => {
                tracing::debug!("Failed to decode webhook signature");
                return Ok(false);
            }
        };

        let expected = self.compute_signature(payload)?;
        let is_valid = constant_time_compare(&expected, &provided);

        if !is_valid {
            tracing::debug!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }
}

#[derive(Deserialize)]
struct RawWebhook {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Map<String, Value>,
}

/// Signature, freshness and dedup checks in front of the dispatcher
pub struct WebhookAuthenticator {
    verifier: Arc<dyn WebhookVerifier>,
    store: Arc<dyn IdempotencyStore>,
    freshness_window: Duration,
}

impl WebhookAuthenticator {
    pub fn new(
        verifier: Arc<dyn WebhookVerifier>,
        store: Arc<dyn IdempotencyStore>,
        freshness_window: Duration,
    ) -> Self {
        Self {
            verifier,
            store,
            freshness_window,
        }
    }

    pub fn store(&self) -> &Arc<dyn IdempotencyStore> {
        &self.store
    }

    /// Authenticate and claim a delivery
    ///
    /// On success the delivery is recorded as processed and its envelope is
    /// returned; every failure maps to the boundary error for its check.
    pub async fn authenticate(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookEnvelope> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(BridgeError::MissingSignature)?;

        if !self.verifier.verify_signature(body, signature).await? {
            return Err(BridgeError::InvalidSignature);
        }

        let raw: RawWebhook = serde_json::from_slice(body)
            .map_err(|e| BridgeError::validation(format!("Malformed webhook body: {}", e)))?;

        let id = payload_str(&raw.payload, "id")
            .ok_or_else(|| BridgeError::validation("payload.id is required"))?
            .to_string();

        let now = now_epoch_secs();
        if let Some(created_at) = created_at_secs(&raw.payload) {
            let age = now - created_at;
            if age > self.freshness_window.as_secs_f64() {
                tracing::warn!(
                    event_type = %raw.event_type,
                    webhook_id = %id,
                    age_secs = age as u64,
                    "Rejecting stale webhook"
                );
                return Err(BridgeError::StaleWebhook {
                    age_secs: age as u64,
                });
            }
        }

        let key = DedupKey::new(raw.event_type.as_str(), id.as_str());
        if !self.store.claim(&key).await {
            tracing::info!(
                event_type = %raw.event_type,
                webhook_id = %id,
                "Rejecting duplicate webhook"
            );
            return Err(BridgeError::DuplicateWebhook {
                event_type: raw.event_type,
                id,
            });
        }

        Ok(WebhookEnvelope {
            event_type: EventType::from(raw.event_type.as_str()),
            payload: raw.payload,
            id,
            received_at: now,
        })
    }
}

/// `payload.created_at` in epoch seconds, accepting seconds or milliseconds
fn created_at_secs(payload: &Map<String, Value>) -> Option<f64> {
    let raw = match payload.get("created_at")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };

    if !raw.is_finite() {
        return None;
    }
    Some(if raw >= EPOCH_MILLIS_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::MemoryIdempotencyStore;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn authenticator() -> WebhookAuthenticator {
        WebhookAuthenticator::new(
            Arc::new(HmacSha256Verifier::new(SecretString::from(SECRET))),
            Arc::new(MemoryIdempotencyStore::default()),
            Duration::from_secs(300),
        )
    }

    fn body(id: &str, created_at: f64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "conversation.created",
            "payload": {"id": id, "created_at": created_at},
            "_links": {"self": "https://api2.frontapp.com/events/evt_1"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_signature() {
        let verifier = HmacSha256Verifier::new(SecretString::from(SECRET));
        let payload = br#"{"type":"tag.added"}"#;

        let valid = verifier
            .verify_signature(payload, &sign(SECRET, payload))
            .await
            .unwrap();
        assert!(valid);
    }

    #[tokio::test]
    async fn test_signature_with_wrong_secret() {
        let verifier = HmacSha256Verifier::new(SecretString::from(SECRET));
        let payload = br#"{"type":"tag.added"}"#;

        let valid = verifier
            .verify_signature(payload, &sign("other_secret", payload))
            .await
            .unwrap();
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_malformed_signature_is_invalid() {
        let verifier = HmacSha256Verifier::new(SecretString::from(SECRET));
        assert!(!verifier.verify_signature(b"{}", "not-hex").await.unwrap());
        assert!(!verifier.verify_signature(b"{}", "abcd").await.unwrap());
    }

    #[tokio::test]
    async fn test_prefixed_signature() {
        let verifier = HmacSha256Verifier::new_with_prefix(SecretString::from(SECRET), "sha256=");
        let payload = b"{}";
        let signature = format!("sha256={}", sign(SECRET, payload));

        assert!(verifier.verify_signature(payload, &signature).await.unwrap());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hello!"));
    }

    #[tokio::test]
    async fn test_authenticate_accepts_fresh_signed_webhook() {
        let auth = authenticator();
        let body = body("cnv_123", now_epoch_secs());

        let envelope = auth
            .authenticate(&body, Some(&sign(SECRET, &body)))
            .await
            .unwrap();

        assert_eq!(envelope.event_type, EventType::ConversationCreated);
        assert_eq!(envelope.id, "cnv_123");
        assert!(auth.store().is_processed(&DedupKey::new("conversation.created", "cnv_123")).await);
    }

    #[tokio::test]
    async fn test_missing_signature() {
        let auth = authenticator();
        let body = body("cnv_1", now_epoch_secs());

        let err = auth.authenticate(&body, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::MissingSignature));

        let err = auth.authenticate(&body, Some("  ")).await.unwrap_err();
        assert!(matches!(err, BridgeError::MissingSignature));
    }

    #[tokio::test]
    async fn test_tampered_body_is_invalid() {
        let auth = authenticator();
        let original = body("cnv_1", now_epoch_secs());
        let signature = sign(SECRET, &original);
        let tampered = body("cnv_2", now_epoch_secs());

        let err = auth.authenticate(&tampered, Some(&signature)).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_stale_webhook_rejected_even_when_signed() {
        let auth = authenticator();
        let body = body("cnv_old", now_epoch_secs() - 301.0);

        let err = auth
            .authenticate(&body, Some(&sign(SECRET, &body)))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::StaleWebhook { age_secs } if age_secs >= 300));

        // Stale deliveries are never claimed
        assert!(!auth.store().is_processed(&DedupKey::new("conversation.created", "cnv_old")).await);
    }

    #[tokio::test]
    async fn test_millisecond_created_at() {
        let auth = authenticator();
        let body = body("cnv_ms", now_epoch_secs() * 1000.0);

        assert!(auth.authenticate(&body, Some(&sign(SECRET, &body))).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let auth = authenticator();
        let body = body("cnv_dup", now_epoch_secs());
        let signature = sign(SECRET, &body);

        auth.authenticate(&body, Some(&signature)).await.unwrap();
        let err = auth.authenticate(&body, Some(&signature)).await.unwrap_err();

        assert!(matches!(
            err,
            BridgeError::DuplicateWebhook { ref event_type, ref id }
                if event_type == "conversation.created" && id == "cnv_dup"
        ));
    }

    #[tokio::test]
    async fn test_missing_payload_id_is_validation_error() {
        let auth = authenticator();
        let body = serde_json::to_vec(&json!({"type": "tag.added", "payload": {}})).unwrap();

        let err = auth
            .authenticate(&body, Some(&sign(SECRET, &body)))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_signed_garbage_is_validation_error() {
        let auth = authenticator();
        let body = b"not json";

        let err = auth
            .authenticate(body, Some(&sign(SECRET, body)))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }
}
