//! Shared domain types for the agentgate metered RPC gateway.
//!
//! This crate defines the vocabulary every other agentgate crate speaks:
//!
//! - **Identifiers**: [`AgentId`], [`SessionId`], [`Nonce`]
//! - **Payment intents** ([`PaymentIntent`]): a buyer's signed declaration of
//!   intent to pay, bounded by budget and TTL
//! - **Pricing tiers** ([`PricingTier`]): immutable named plans with per-call
//!   rates, method overrides, and rate/call limits
//! - **Receipts** ([`PaymentReceipt`]): the terminal record of a settled session
//! - **Catalog entries** ([`ToolListing`], [`ToolBundle`]): sellable methods and
//!   method groups for marketplace discovery
//!
//! # Example
//!
//! ```
//! use agentgate_types::{AgentId, PaymentIntent, PricingTier, current_timestamp};
//!
//! let intent = PaymentIntent::new(
//!     AgentId::new("buyer-1"),
//!     AgentId::new("seller-1"),
//!     "standard",
//!     10_000, // max budget in lamports
//!     600,    // ttl in seconds
//! );
//! assert!(!intent.is_expired(current_timestamp()));
//!
//! let tier = PricingTier::new("standard", 100);
//! assert_eq!(tier.cost_for("getBalance"), 100);
//! ```

pub mod constants;
mod ids;
mod intent;
mod listing;
mod receipt;
mod tier;

pub use constants::{
    BUDGET_WARNING_RATIO, DEFAULT_MAX_CONCURRENT_SESSIONS, DEFAULT_RATE_WINDOW_MS,
};
pub use ids::{AgentId, Nonce, SessionId};
pub use intent::PaymentIntent;
pub use listing::{ToolBundle, ToolListing};
pub use receipt::{PaymentReceipt, SettlementKind};
pub use tier::{PricingTier, RateLimit};

/// A monetary amount in the smallest currency/token unit (e.g., lamports).
pub type Amount = u64;

/// A Unix timestamp in seconds.
pub type Timestamp = u64;

/// Get the current Unix timestamp in seconds.
pub fn current_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Get the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
