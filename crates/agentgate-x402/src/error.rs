//! Error types for x402 payment operations.

use thiserror::Error;

/// Result type for x402 operations.
pub type X402Result<T> = Result<T, X402Error>;

/// Errors that can occur during x402 payment operations.
#[derive(Debug, Error)]
pub enum X402Error {
    /// Payment amount is insufficient for the requested call.
    #[error("insufficient payment: required {required}, received {received}")]
    InsufficientPayment {
        /// Amount required
        required: u64,
        /// Amount received
        received: u64,
    },

    /// Payment payload is malformed or missing required fields.
    #[error("malformed payment payload: {reason}")]
    MalformedPayload {
        /// Description of what's wrong
        reason: String,
    },

    /// The payment scheme is not supported.
    #[error("unsupported payment scheme: {scheme}")]
    UnsupportedScheme {
        /// The unsupported scheme name
        scheme: String,
    },

    /// The payment network is not supported.
    #[error("unsupported network: {network}")]
    UnsupportedNetwork {
        /// The unsupported network identifier
        network: String,
    },

    /// Payment has expired (validBefore exceeded).
    #[error("payment expired at {expired_at}")]
    PaymentExpired {
        /// When the payment expired (Unix seconds)
        expired_at: u64,
    },

    /// Payment is not yet valid (validAfter not reached).
    #[error("payment not yet valid until {valid_after}")]
    PaymentNotYetValid {
        /// When the payment becomes valid (Unix seconds)
        valid_after: u64,
    },

    /// Nonce has already been used (replay prevention).
    #[error("nonce already used: {nonce}")]
    NonceReused {
        /// The reused nonce
        nonce: String,
    },

    /// Payment verification failed.
    #[error("payment verification failed: {reason}")]
    VerificationFailed {
        /// Reason for failure
        reason: String,
    },

    /// Payment settlement failed.
    #[error("payment settlement failed: {reason}")]
    SettlementFailed {
        /// Reason for failure
        reason: String,
    },

    /// x402 is not configured or disabled.
    #[error("x402 payments not configured")]
    NotConfigured,
}

impl X402Error {
    /// Returns true if this error is transient and the operation may succeed
    /// on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SettlementFailed { .. })
    }

    /// Returns the HTTP status code appropriate for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InsufficientPayment { .. }
            | Self::MalformedPayload { .. }
            | Self::PaymentExpired { .. }
            | Self::PaymentNotYetValid { .. }
            | Self::NonceReused { .. }
            | Self::VerificationFailed { .. } => 402,
            Self::UnsupportedScheme { .. } | Self::UnsupportedNetwork { .. } => 400,
            Self::NotConfigured => 501,
            Self::SettlementFailed { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status() {
        assert_eq!(
            X402Error::InsufficientPayment {
                required: 100,
                received: 50
            }
            .http_status(),
            402
        );
        assert_eq!(
            X402Error::UnsupportedScheme {
                scheme: "upto".into()
            }
            .http_status(),
            400
        );
        assert_eq!(X402Error::NotConfigured.http_status(), 501);
    }

    #[test]
    fn test_is_transient() {
        assert!(X402Error::SettlementFailed {
            reason: "rpc timeout".into()
        }
        .is_transient());
        assert!(!X402Error::NotConfigured.is_transient());
    }
}
