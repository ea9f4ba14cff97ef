//! x402 pay-per-call payment rail for the agentgate gateway.
//!
//! x402 is an HTTP-status-code-driven micropayment pattern: a seller answers
//! an unpaid request with `402 Payment Required` and a set of payment
//! requirements; the buyer pays, retries with an `X-PAYMENT` header, and the
//! seller verifies and settles the payment around the actual call.
//!
//! The gateway consumes this rail through two narrow contracts:
//!
//! - [`Paywall`] (seller side): `process_request(method, headers)` yields one
//!   of *payment required*, *payment valid*, or *no payment needed*;
//!   `settle_after_response` finalizes a verified payment into a settlement
//!   outcome.
//! - [`PaymentClient`] (buyer side): `pay(requirements)` produces the
//!   `X-PAYMENT` header value for a retry.
//!
//! Both sides are optional capabilities: a gateway built without them behaves
//! as if every request needs no payment.
//!
//! [`LocalPaywall`] is a complete in-process implementation: it validates
//! payment payloads locally (scheme, recipient, amount, validity window,
//! nonce replay) and produces synthetic settlement receipts, which is enough
//! for escrow-style deployments and for tests. On-chain settlement backends
//! implement the same traits out of tree.

pub mod error;
pub mod local;
pub mod paywall;
pub mod types;

pub use error::{X402Error, X402Result};
pub use local::{LocalPaymentClient, LocalPaywall};
pub use paywall::{PaymentClient, Paywall};
pub use types::{
    PaymentDetails, PaymentPayload, PaymentRequirements, ProcessOutcome, SettlementOutcome,
    VerifiedPayload, HEADER_PAYMENT, HEADER_PAYMENT_RESPONSE, NETWORK_SOLANA_DEVNET,
    NETWORK_SOLANA_MAINNET, SCHEME_EXACT, X402_VERSION,
};
