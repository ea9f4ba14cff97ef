//! agentgate: an agent-to-agent metered session and pricing engine for
//! Solana RPC access.
//!
//! A selling agent fronts an RPC endpoint with an [`AgentGateway`]; a buying
//! agent opens a session against it with a
//! [`PaymentIntent`](agentgate_types::PaymentIntent) naming a budget and a
//! TTL, then executes metered calls until the budget, the TTL, or a tier
//! limit stops it. Settlement turns the session's usage into a
//! [`PaymentReceipt`](agentgate_types::PaymentReceipt).
//!
//! The moving parts:
//!
//! - [`PricingEngine`]: named tiers with per-call rates, method overrides,
//!   and rate/call limits
//! - [`AgentSession`]: the budget- and time-bounded state machine behind
//!   every metered call
//! - [`ResponseValidator`]: Ed25519 attestation of results, for tiers that
//!   include proof of computation
//! - [`ToolMarketplace`]: the discovery catalog of sellable methods and
//!   bundles
//! - x402 composition: an optional [`Paywall`](agentgate_x402::Paywall) /
//!   [`PaymentClient`](agentgate_x402::PaymentClient) pair turns the gateway
//!   into an HTTP-402-style pay-per-call endpoint
//!
//! The gateway performs no network I/O of its own; the upstream endpoint is
//! an injected [`RpcTransport`]. [`MockTransport`] serves tests.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agentgate::{AgentGateway, GatewayConfig, MockTransport};
//! use agentgate_types::{AgentId, PaymentIntent, PricingTier};
//!
//! # async fn demo() -> Result<(), agentgate::GatewayError> {
//! let gateway = AgentGateway::new(
//!     GatewayConfig::new(AgentId::new("seller-pubkey")),
//!     Arc::new(MockTransport::new()),
//! );
//! gateway.register_tier(PricingTier::new("standard", 100));
//!
//! let intent = PaymentIntent::new(
//!     AgentId::new("buyer-pubkey"),
//!     AgentId::new("seller-pubkey"),
//!     "standard",
//!     10_000, // budget in lamports
//!     600,    // ttl in seconds
//! );
//! let session = gateway.open_session(intent).await?;
//! let result = gateway.execute(&session, "getBalance", &[]).await?;
//! println!("balance response: {}", result.value);
//!
//! let receipt = gateway.settle_session(&session, None).await?;
//! println!("charged {} over {} calls", receipt.amount_charged, receipt.call_count);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod gateway;
pub mod marketplace;
pub mod mock;
pub mod pricing;
pub mod session;
pub mod transport;
pub mod validator;

pub use error::{GatewayError, GatewayResult};
pub use events::{EventBus, EventKind, GatewayEvent};
pub use gateway::{AgentGateway, GatewayConfig, GatewayMetrics, RpcCall, X402Execution};
pub use marketplace::{MarketplaceStats, QueryCriteria, ToolMarketplace};
pub use mock::{MockTransport, MockTransportBuilder};
pub use pricing::PricingEngine;
pub use session::{AgentSession, SessionSnapshot, SessionStatus, SessionUsage};
pub use transport::{RpcTransport, TransportError};
pub use validator::{
    attestation_digest, extract_slot, verify_attested, AttestationSigner, AttestedResult,
    Ed25519Signer, ResponseAttestation, ResponseValidator,
};

// Re-exported so downstream callers need only one import root.
pub use agentgate_types as types;
pub use agentgate_x402 as x402;
