//! x402 protocol types and the payment header codec.
//!
//! Follows the x402 specification's message shapes with a Solana "exact"
//! payment scheme: the buyer names a lamport amount, recipient, validity
//! window, and a replay-prevention nonce, and the whole payload travels
//! base64(JSON)-encoded in the `X-PAYMENT` header.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{X402Error, X402Result};

/// x402 protocol version.
pub const X402_VERSION: u32 = 1;

/// HTTP header carrying the payment payload (client → server).
pub const HEADER_PAYMENT: &str = "X-PAYMENT";

/// HTTP header carrying the settlement confirmation (server → client).
pub const HEADER_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// Solana network identifiers (CAIP-2 format).
pub const NETWORK_SOLANA_MAINNET: &str = "solana:mainnet";
pub const NETWORK_SOLANA_DEVNET: &str = "solana:devnet";

/// The payment scheme used by agentgate (exact lamport amount).
pub const SCHEME_EXACT: &str = "exact";

/// Default maximum payment validity window (seconds).
pub const DEFAULT_MAX_TIMEOUT_SECS: u64 = 300;

/// Payment requirements returned when a call needs payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// x402 protocol version.
    pub x402_version: u32,

    /// Payment scheme (e.g., "exact").
    pub scheme: String,

    /// Network identifier (CAIP-2 format, e.g., "solana:mainnet").
    pub network: String,

    /// Required payment amount in lamports, string-encoded.
    pub amount: String,

    /// Address to pay to.
    pub pay_to: String,

    /// The RPC method being paid for.
    pub resource: String,

    /// Human-readable description.
    pub description: String,

    /// Maximum seconds the payment is valid after creation.
    pub max_timeout_secs: u64,
}

/// Payment payload sent by the buyer in the `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// x402 protocol version.
    pub x402_version: u32,

    /// The payment scheme used.
    pub scheme: String,

    /// Network the payment is for.
    pub network: String,

    /// Scheme-specific payment details.
    pub payload: PaymentDetails,
}

/// Exact-scheme payment details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Payer's address.
    pub from: String,

    /// Recipient's address.
    pub to: String,

    /// Payment amount in lamports, string-encoded.
    pub amount: String,

    /// Timestamp after which the payment is valid (Unix seconds).
    pub valid_after: String,

    /// Timestamp before which the payment is valid (Unix seconds).
    pub valid_before: String,

    /// Unique nonce preventing replay.
    pub nonce: String,

    /// Buyer's signature over the payment details (hex-encoded).
    pub signature: String,
}

impl PaymentPayload {
    /// Encode the payload for the `X-PAYMENT` header (base64 over JSON).
    pub fn to_header(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(json)
    }

    /// Decode a payload from an `X-PAYMENT` header value.
    pub fn from_header(header: &str) -> X402Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(header.trim())
            .map_err(|e| X402Error::MalformedPayload {
                reason: format!("invalid base64: {e}"),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| X402Error::MalformedPayload {
            reason: format!("invalid JSON: {e}"),
        })
    }
}

/// A payment that passed verification, reduced to what the gateway needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayload {
    /// Payer's address.
    pub payer: String,

    /// Verified amount in lamports.
    pub amount: u64,

    /// The payment nonce (now consumed).
    pub nonce: String,
}

/// Outcome of processing an incoming request's payment headers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// No valid payment attached; the caller must pay and retry.
    PaymentRequired(PaymentRequirements),

    /// Payment verified; proceed with the call, then settle the payload
    /// against the requirements it satisfied.
    PaymentValid {
        /// The verified payment.
        payload: VerifiedPayload,
        /// The requirements this payment satisfied.
        requirements: PaymentRequirements,
    },

    /// The method is free; proceed without payment.
    NoPaymentNeeded,
}

/// Result of settling a verified payment after the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutcome {
    /// Whether settlement succeeded.
    pub success: bool,

    /// On-chain transaction signature, if the rail settled on-chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_signature: Option<String>,

    /// Value for the `X-PAYMENT-RESPONSE` header, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_header: Option<String>,
}

impl SettlementOutcome {
    /// Encode this outcome as an `X-PAYMENT-RESPONSE` header value.
    pub fn to_response_header(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(json)
    }
}
