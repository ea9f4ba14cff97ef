//! The consumed payment-rail contracts: seller-side paywall and buyer-side
//! payment client.
//!
//! Both are explicit optional capabilities of the gateway. When a gateway is
//! constructed without them, every request is treated as needing no payment
//! and buyer-side payment attempts fail with a configuration error.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::X402Result;
use crate::types::{PaymentRequirements, ProcessOutcome, SettlementOutcome, VerifiedPayload};

/// Seller-side payment gate.
///
/// `process_request` inspects the incoming headers for a given method and
/// decides whether the call may proceed; `settle_after_response` finalizes a
/// verified payment once the upstream call has succeeded.
#[async_trait]
pub trait Paywall: Send + Sync {
    /// Inspect an incoming request's headers and decide whether payment is
    /// required, already valid, or not needed at all.
    async fn process_request(
        &self,
        method: &str,
        headers: &HashMap<String, String>,
    ) -> X402Result<ProcessOutcome>;

    /// Settle a verified payment after the response was produced.
    async fn settle_after_response(
        &self,
        payload: &VerifiedPayload,
        requirements: &PaymentRequirements,
    ) -> X402Result<SettlementOutcome>;
}

/// Buyer-side payment capability.
///
/// Given a seller's payment requirements, produce the `X-PAYMENT` header
/// value to attach to the retried request.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Pay for a call and return the `X-PAYMENT` header value.
    async fn pay(&self, requirements: &PaymentRequirements) -> X402Result<String>;
}
