//! Pricing engine: tier resolution and latency-informed pricing stats.
//!
//! The engine is a shared read-mostly service. Tier lookups are pure; an
//! unknown tier ID yields `None` and the gateway converts that into a domain
//! error. Latency reporting feeds a decayed moving average used for
//! marketplace listing stats.

use std::collections::HashMap;
use std::sync::RwLock;

use agentgate_types::{constants::LATENCY_EWMA_ALPHA, PricingTier, ToolBundle};
use tracing::debug;

#[derive(Debug, Default)]
struct LatencyAvg {
    avg_ms: f64,
    samples: u64,
}

/// Registry of pricing tiers plus a rolling latency estimate.
#[derive(Default)]
pub struct PricingEngine {
    tiers: RwLock<HashMap<String, PricingTier>>,
    latency: RwLock<LatencyAvg>,
}

impl PricingEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tier. Re-registering an ID replaces the previous tier;
    /// tiers handed out by [`get_tier`](Self::get_tier) are clones and never
    /// mutate in place.
    pub fn register_tier(&self, tier: PricingTier) {
        if let Ok(mut tiers) = self.tiers.write() {
            debug!(tier = %tier.id, rate = tier.rate_per_call, "registered pricing tier");
            tiers.insert(tier.id.clone(), tier);
        }
    }

    /// Resolve a tier by identifier. Pure lookup: unknown IDs yield `None`.
    pub fn get_tier(&self, tier_id: &str) -> Option<PricingTier> {
        self.tiers.read().ok()?.get(tier_id).cloned()
    }

    /// Register a bundle's tiers so bundle-scoped tier IDs resolve through
    /// [`get_tier`](Self::get_tier).
    pub fn register_bundle(&self, bundle: &ToolBundle) {
        for tier in &bundle.tiers {
            self.register_tier(tier.clone());
        }
    }

    /// Feed one latency observation into the moving average.
    ///
    /// Infallible and non-blocking beyond a short lock hold.
    pub fn report_latency(&self, latency_ms: u64) {
        if let Ok(mut latency) = self.latency.write() {
            if latency.samples == 0 {
                latency.avg_ms = latency_ms as f64;
            } else {
                latency.avg_ms = latency.avg_ms * (1.0 - LATENCY_EWMA_ALPHA)
                    + latency_ms as f64 * LATENCY_EWMA_ALPHA;
            }
            latency.samples += 1;
        }
    }

    /// The current moving average latency in milliseconds.
    pub fn avg_latency(&self) -> f64 {
        self.latency.read().map(|l| l.avg_ms).unwrap_or(0.0)
    }

    /// Number of latency observations recorded so far.
    pub fn latency_samples(&self) -> u64 {
        self.latency.read().map(|l| l.samples).unwrap_or(0)
    }

    /// Number of registered tiers (bundle tiers included).
    pub fn tier_count(&self) -> usize {
        self.tiers.read().map(|t| t.len()).unwrap_or(0)
    }
}
