//! Pricing tiers: named, immutable plans resolved by identifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Amount, DEFAULT_RATE_WINDOW_MS};

/// A rate limit expressed as a call ceiling per rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    /// Maximum accepted calls per window.
    pub max_calls: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimit {
    /// Create a rate limit with the default window length.
    pub fn per_window(max_calls: u32) -> Self {
        Self {
            max_calls,
            window_ms: DEFAULT_RATE_WINDOW_MS,
        }
    }

    /// Create a rate limit with an explicit window length.
    pub fn new(max_calls: u32, window_ms: u64) -> Self {
        Self {
            max_calls,
            window_ms,
        }
    }
}

/// A named pricing plan.
///
/// Tiers are immutable once registered with the pricing engine; they are
/// looked up by identifier and never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    /// Tier identifier.
    pub id: String,

    /// Cost per call, in the smallest currency unit.
    pub rate_per_call: Amount,

    /// Whether results under this tier carry a proof-of-computation
    /// attestation.
    pub includes_attestation: bool,

    /// Method-specific price overrides, keyed by RPC method name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub method_overrides: HashMap<String, Amount>,

    /// Ceiling on total calls per session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_calls: Option<u64>,

    /// Rate limit applied per session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
}

impl PricingTier {
    /// Create a tier with a flat per-call rate and no limits.
    pub fn new(id: impl Into<String>, rate_per_call: Amount) -> Self {
        Self {
            id: id.into(),
            rate_per_call,
            includes_attestation: false,
            method_overrides: HashMap::new(),
            max_calls: None,
            rate_limit: None,
        }
    }

    /// Enable attestation for this tier.
    pub fn with_attestation(mut self) -> Self {
        self.includes_attestation = true;
        self
    }

    /// Add a method-specific price override.
    pub fn with_override(mut self, method: impl Into<String>, cost: Amount) -> Self {
        self.method_overrides.insert(method.into(), cost);
        self
    }

    /// Cap the total calls per session.
    pub fn with_max_calls(mut self, max_calls: u64) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    /// Apply a rate limit.
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Resolve the cost of one call to `method` under this tier.
    pub fn cost_for(&self, method: &str) -> Amount {
        self.method_overrides
            .get(method)
            .copied()
            .unwrap_or(self.rate_per_call)
    }
}
