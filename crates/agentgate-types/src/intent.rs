//! Payment intents: a buyer's declaration of intent to pay for metered access.

use serde::{Deserialize, Serialize};

use crate::{current_timestamp, AgentId, Amount, Nonce, Timestamp};

/// A buyer's declaration of intent to pay, bounded by a budget and a TTL.
///
/// The gateway verifies an intent before opening a session from it:
/// the seller must match the gateway's own identity, `max_budget` and
/// `ttl_secs` must be positive, and the intent must not have outlived its TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// The buying agent.
    pub buyer: AgentId,

    /// The selling agent (must equal the gateway's identity).
    pub seller: AgentId,

    /// Identifier of the pricing tier the buyer wants.
    pub tier_id: String,

    /// Maximum total spend, in the smallest currency unit.
    pub max_budget: Amount,

    /// Time-to-live in seconds, counted from `created_at`.
    pub ttl_secs: u64,

    /// Creation timestamp (Unix seconds).
    pub created_at: Timestamp,

    /// Uniqueness token, echoed in the settlement receipt.
    pub nonce: Nonce,
}

impl PaymentIntent {
    /// Create a new intent dated now, with a freshly generated nonce.
    pub fn new(
        buyer: AgentId,
        seller: AgentId,
        tier_id: impl Into<String>,
        max_budget: Amount,
        ttl_secs: u64,
    ) -> Self {
        Self {
            buyer,
            seller,
            tier_id: tier_id.into(),
            max_budget,
            ttl_secs,
            created_at: current_timestamp(),
            nonce: Nonce::generate(),
        }
    }

    /// Override the creation timestamp (for replaying recorded intents).
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    /// Override the nonce.
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = nonce;
        self
    }

    /// The deadline after which the intent (and any session derived from it)
    /// is expired.
    pub fn expires_at(&self) -> Timestamp {
        self.created_at.saturating_add(self.ttl_secs)
    }

    /// Check whether the intent has outlived its TTL at time `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_secs
    }
}
