//! Error types for the agentgate core.
//!
//! Session-state errors are deliberately narrow so callers can branch on
//! cause: budget exhaustion means "top up and open a new session", a rate
//! limit means "wait and retry", expiry means "the session is dead".
//! Transport errors pass through transparently so callers keep the original
//! diagnostic.

use agentgate_types::Amount;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors produced by the gateway and its sessions.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The payment intent failed verification; the message names the
    /// violated condition.
    #[error("intent verification failed: {reason}")]
    IntentVerification {
        /// The specific violated condition
        reason: String,
    },

    /// The gateway's concurrent-session ceiling was reached.
    #[error("too many concurrent sessions: limit is {limit}")]
    MaxSessions {
        /// The configured ceiling
        limit: usize,
    },

    /// No session with the given ID is registered.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The unknown session ID
        session_id: String,
    },

    /// Committing this call would exceed the session budget.
    #[error("budget exhausted: {charged} of {max_budget} charged, next call costs {cost}")]
    BudgetExhausted {
        /// Amount committed so far
        charged: Amount,
        /// The session's budget ceiling
        max_budget: Amount,
        /// Cost of the rejected call
        cost: Amount,
    },

    /// The session's rate limit for the current window is exhausted.
    #[error("rate limit exceeded: {max_calls} calls per {window_ms} ms window")]
    RateLimitExceeded {
        /// Calls allowed per window
        max_calls: u32,
        /// Window length in milliseconds
        window_ms: u64,
    },

    /// The session outlived its TTL.
    #[error("session expired at {expired_at}")]
    SessionExpired {
        /// Expiry deadline (Unix seconds)
        expired_at: u64,
    },

    /// The tier's per-session call ceiling was reached.
    #[error("call limit exceeded: tier allows {limit} calls")]
    CallLimitExceeded {
        /// The tier's call ceiling
        limit: u64,
    },

    /// Generic session-state error (e.g., operating on a settled session).
    #[error("session error: {reason}")]
    Session {
        /// Description of the invalid operation
        reason: String,
    },

    /// A bundle with this ID is already registered.
    #[error("bundle already registered: {id}")]
    DuplicateBundle {
        /// The duplicate bundle ID
        id: String,
    },

    /// Upstream transport failure, surfaced unmodified.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// x402 payment rail failure.
    #[error(transparent)]
    X402(#[from] agentgate_x402::X402Error),
}

impl GatewayError {
    /// Returns true if this error is transient and the same call may succeed
    /// on retry without changing the session.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::Transport(_) => true,
            Self::X402(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the error leaves the session permanently unusable.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}
