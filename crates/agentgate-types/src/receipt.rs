//! Settlement receipts: the terminal, immutable record of a settled session.

use serde::{Deserialize, Serialize};

use crate::{Amount, Nonce, Timestamp};

/// How a session's usage was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementKind {
    /// Settled against an on-chain transaction.
    Onchain,
    /// Settled against an off-chain escrow balance.
    OffchainEscrow,
}

impl SettlementKind {
    /// Check if the settlement happened on-chain.
    pub fn is_onchain(&self) -> bool {
        matches!(self, Self::Onchain)
    }
}

/// The terminal record produced exactly once per settled session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// Nonce of the originating payment intent.
    pub nonce: Nonce,

    /// Final amount charged over the session's lifetime.
    pub amount_charged: Amount,

    /// Final number of committed calls.
    pub call_count: u64,

    /// On-chain settlement transaction reference, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_signature: Option<String>,

    /// Settlement discriminant.
    pub settlement: SettlementKind,

    /// When the session was settled (Unix seconds).
    pub settled_at: Timestamp,
}
