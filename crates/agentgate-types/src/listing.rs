//! Marketplace catalog entries: sellable methods and method bundles.

use serde::{Deserialize, Serialize};

use crate::{AgentId, PricingTier, Timestamp};

/// A read-mostly catalog entry describing one sellable RPC method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListing {
    /// Selling agent.
    pub seller: AgentId,

    /// RPC method name (e.g., "getAccountInfo").
    pub method: String,

    /// Identifiers of the tiers this method is sold under.
    pub tiers: Vec<String>,

    /// Optional serving region hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Rolling average latency observed by the seller, milliseconds.
    pub avg_latency_ms: f64,

    /// Rolling reputation score (0.0 to 1.0).
    pub reputation: f64,

    /// When the listing was (re)published (Unix seconds).
    pub listed_at: Timestamp,
}

/// A named, fixed set of methods sold together under its own tier set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolBundle {
    /// Bundle identifier.
    pub id: String,

    /// Selling agent.
    pub seller: AgentId,

    /// Methods included in the bundle.
    pub methods: Vec<String>,

    /// Tiers the bundle is sold under, independent from per-method tiers.
    pub tiers: Vec<PricingTier>,
}

impl ToolBundle {
    /// Create a new bundle.
    pub fn new(
        id: impl Into<String>,
        seller: AgentId,
        methods: Vec<String>,
        tiers: Vec<PricingTier>,
    ) -> Self {
        Self {
            id: id.into(),
            seller,
            methods,
            tiers,
        }
    }

    /// Check whether the bundle covers a method.
    pub fn contains_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}
