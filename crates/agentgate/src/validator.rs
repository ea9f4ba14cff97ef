//! Response attestation: signed proofs that a result was served.
//!
//! An attestation binds a result to its request (method and params), its
//! chain context (slot, when the result carries one), and its position in
//! the session (sequence number). The digest is a domain-separated SHA-256
//! over those fields; the signature is Ed25519 over the digest. Anyone
//! holding the attested result can re-derive the digest and check the
//! signature against the embedded public key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentgate_types::{current_timestamp, SessionId, Timestamp};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Domain separator for attestation digests.
const ATTESTATION_DOMAIN: u8 = 0x02;

/// Something that can sign attestation digests.
///
/// Abstracted so tests can supply deterministic signers and deployments can
/// back this with an HSM or remote signer.
pub trait AttestationSigner: Send + Sync {
    /// Sign a 32-byte digest.
    fn sign(&self, digest: &[u8]) -> Vec<u8>;

    /// Hex-encoded public key matching the signatures.
    fn public_key_hex(&self) -> String;
}

/// In-process Ed25519 signer.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Create a signer from a 32-byte secret key.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    /// Generate a signer with a fresh random key.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }
}

impl AttestationSigner for Ed25519Signer {
    fn sign(&self, digest: &[u8]) -> Vec<u8> {
        self.key.sign(digest).to_bytes().to_vec()
    }

    fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }
}

/// The proof attached to an attested result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseAttestation {
    /// Hex-encoded SHA-256 digest of the bound fields.
    pub digest: String,

    /// Hex-encoded Ed25519 signature over the digest.
    pub signature: String,

    /// Hex-encoded public key of the signer.
    pub public_key: String,

    /// When the attestation was produced (Unix seconds).
    pub attested_at: Timestamp,
}

/// A result wrapped with its metering context and optional attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestedResult {
    /// The raw RPC result.
    pub value: Value,

    /// Session the call was metered under.
    pub session_id: SessionId,

    /// RPC method name.
    pub method: String,

    /// RPC params as sent.
    pub params: Vec<Value>,

    /// Per-session sequence number, strictly increasing from 1.
    pub sequence: u64,

    /// Chain slot the result reports, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,

    /// Wall-clock call latency in milliseconds.
    pub latency_ms: u64,

    /// Attestation, when the tier includes one and a signer is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<ResponseAttestation>,
}

/// Domain-separated digest binding a result to its request and context.
pub fn attestation_digest(
    method: &str,
    params: &[Value],
    result: &Value,
    slot: Option<u64>,
    sequence: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([ATTESTATION_DOMAIN]);
    hasher.update((method.len() as u64).to_be_bytes());
    hasher.update(method.as_bytes());
    let params_json = serde_json::to_vec(params).unwrap_or_default();
    hasher.update((params_json.len() as u64).to_be_bytes());
    hasher.update(&params_json);
    let result_json = serde_json::to_vec(result).unwrap_or_default();
    hasher.update((result_json.len() as u64).to_be_bytes());
    hasher.update(&result_json);
    hasher.update(slot.unwrap_or(0).to_be_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.finalize().into()
}

/// Pull a slot number out of a Solana RPC result.
///
/// Most account/transaction methods report it under `context.slot`; a few
/// put it at the top level.
pub fn extract_slot(result: &Value) -> Option<u64> {
    result
        .get("context")
        .and_then(|c| c.get("slot"))
        .or_else(|| result.get("slot"))
        .and_then(Value::as_u64)
}

/// Re-derive the digest and verify the signature of an attested result.
pub fn verify_attested(attested: &AttestedResult) -> bool {
    let Some(attestation) = &attested.attestation else {
        return false;
    };

    let digest = attestation_digest(
        &attested.method,
        &attested.params,
        &attested.value,
        attested.slot,
        attested.sequence,
    );
    if hex::encode(digest) != attestation.digest {
        return false;
    }

    let Ok(key_bytes) = hex::decode(&attestation.public_key) else {
        return false;
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(&attestation.signature) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);

    key.verify(&digest, &signature).is_ok()
}

/// Wraps raw RPC results into [`AttestedResult`]s.
///
/// Holds the optional signer; without one, results are wrapped unattested
/// even for tiers that ask for attestation.
#[derive(Default)]
pub struct ResponseValidator {
    signer: Option<Arc<dyn AttestationSigner>>,
    total_attestations: AtomicU64,
}

impl ResponseValidator {
    /// Create a validator that never attests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with a signer.
    pub fn with_signer(signer: Arc<dyn AttestationSigner>) -> Self {
        Self {
            signer: Some(signer),
            total_attestations: AtomicU64::new(0),
        }
    }

    /// Whether a signer is configured.
    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    /// Attestations produced over the validator's lifetime.
    pub fn total_attestations(&self) -> u64 {
        self.total_attestations.load(Ordering::Relaxed)
    }

    /// Wrap a raw result, attesting it when `should_attest` and a signer is
    /// available.
    pub fn wrap_result(
        &self,
        value: Value,
        session_id: SessionId,
        method: &str,
        params: &[Value],
        sequence: u64,
        latency_ms: u64,
        should_attest: bool,
    ) -> AttestedResult {
        let slot = extract_slot(&value);

        let attestation = if should_attest {
            self.signer.as_ref().map(|signer| {
                let digest = attestation_digest(method, params, &value, slot, sequence);
                let signature = signer.sign(&digest);
                self.total_attestations.fetch_add(1, Ordering::Relaxed);
                ResponseAttestation {
                    digest: hex::encode(digest),
                    signature: hex::encode(signature),
                    public_key: signer.public_key_hex(),
                    attested_at: current_timestamp(),
                }
            })
        } else {
            None
        };

        AttestedResult {
            value,
            session_id,
            method: method.to_string(),
            params: params.to_vec(),
            sequence,
            slot,
            latency_ms,
            attestation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_validator() -> ResponseValidator {
        ResponseValidator::with_signer(Arc::new(Ed25519Signer::from_bytes(&[7u8; 32])))
    }

    #[test]
    fn test_attested_result_verifies() {
        let validator = test_validator();
        let attested = validator.wrap_result(
            json!({ "context": { "slot": 250_000_000 }, "value": 42 }),
            SessionId::new("s-1"),
            "getBalance",
            &[json!("some-pubkey")],
            1,
            12,
            true,
        );

        assert_eq!(attested.slot, Some(250_000_000));
        assert!(attested.attestation.is_some());
        assert!(verify_attested(&attested));
        assert_eq!(validator.total_attestations(), 1);
    }

    #[test]
    fn test_tampered_result_fails_verification() {
        let validator = test_validator();
        let mut attested = validator.wrap_result(
            json!({ "value": 42 }),
            SessionId::new("s-1"),
            "getBalance",
            &[],
            1,
            5,
            true,
        );

        attested.value = json!({ "value": 43 });
        assert!(!verify_attested(&attested));
    }

    #[test]
    fn test_no_attestation_when_not_requested() {
        let validator = test_validator();
        let attested = validator.wrap_result(
            json!({ "value": 42 }),
            SessionId::new("s-1"),
            "getBalance",
            &[],
            1,
            5,
            false,
        );

        assert!(attested.attestation.is_none());
        assert!(!verify_attested(&attested));
        assert_eq!(validator.total_attestations(), 0);
    }

    #[test]
    fn test_no_signer_means_no_attestation() {
        let validator = ResponseValidator::new();
        let attested = validator.wrap_result(
            json!({ "value": 42 }),
            SessionId::new("s-1"),
            "getBalance",
            &[],
            1,
            5,
            true,
        );

        assert!(!validator.has_signer());
        assert!(attested.attestation.is_none());
    }

    #[test]
    fn test_digest_binds_every_field() {
        let base = attestation_digest("m", &[json!(1)], &json!(2), Some(3), 4);

        assert_ne!(base, attestation_digest("x", &[json!(1)], &json!(2), Some(3), 4));
        assert_ne!(base, attestation_digest("m", &[json!(9)], &json!(2), Some(3), 4));
        assert_ne!(base, attestation_digest("m", &[json!(1)], &json!(9), Some(3), 4));
        assert_ne!(base, attestation_digest("m", &[json!(1)], &json!(2), Some(9), 4));
        assert_ne!(base, attestation_digest("m", &[json!(1)], &json!(2), Some(3), 9));
    }

    #[test]
    fn test_extract_slot_variants() {
        assert_eq!(
            extract_slot(&json!({ "context": { "slot": 10 }, "value": null })),
            Some(10)
        );
        assert_eq!(extract_slot(&json!({ "slot": 20 })), Some(20));
        assert_eq!(extract_slot(&json!({ "value": 1 })), None);
    }

    #[test]
    fn test_attestation_serde_camel_case() {
        let validator = test_validator();
        let attested = validator.wrap_result(
            json!({ "value": 42 }),
            SessionId::new("s-1"),
            "getBalance",
            &[],
            1,
            5,
            true,
        );

        let json = serde_json::to_string(&attested).unwrap();
        assert!(json.contains("sessionId"));
        assert!(json.contains("latencyMs"));
        assert!(json.contains("publicKey"));
    }
}
