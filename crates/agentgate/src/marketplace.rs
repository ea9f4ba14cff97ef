//! Tool marketplace: the discovery catalog of sellable methods and bundles.
//!
//! The catalog is read-mostly. Listings are upserted in place by
//! `(seller, method)` so a republish refreshes stats without losing the
//! listing's position, and queries return results in insertion order.

use std::collections::HashMap;
use std::sync::RwLock;

use agentgate_types::{AgentId, ToolBundle, ToolListing};
use serde::Serialize;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// Filter criteria for marketplace queries. All fields are conjunctive;
/// an empty criteria matches every listing.
#[derive(Debug, Clone, Default)]
pub struct QueryCriteria {
    /// Substring match on the method name.
    pub method_contains: Option<String>,
    /// Exact match on the seller.
    pub seller: Option<AgentId>,
    /// Listings offered under this tier ID.
    pub tier: Option<String>,
    /// Exact match on the region hint.
    pub region: Option<String>,
}

impl QueryCriteria {
    /// Criteria matching every listing.
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter by method-name substring.
    pub fn method_contains(mut self, fragment: impl Into<String>) -> Self {
        self.method_contains = Some(fragment.into());
        self
    }

    /// Filter by seller.
    pub fn seller(mut self, seller: AgentId) -> Self {
        self.seller = Some(seller);
        self
    }

    /// Filter by offered tier ID.
    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    /// Filter by region hint.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn matches(&self, listing: &ToolListing) -> bool {
        if let Some(fragment) = &self.method_contains {
            if !listing.method.contains(fragment.as_str()) {
                return false;
            }
        }
        if let Some(seller) = &self.seller {
            if &listing.seller != seller {
                return false;
            }
        }
        if let Some(tier) = &self.tier {
            if !listing.tiers.iter().any(|t| t == tier) {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if listing.region.as_deref() != Some(region.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Catalog totals, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStats {
    /// Number of listings in the catalog.
    pub total_listings: usize,
    /// Number of registered bundles.
    pub total_bundles: usize,
}

/// In-memory discovery catalog.
#[derive(Default)]
pub struct ToolMarketplace {
    listings: RwLock<Vec<ToolListing>>,
    bundles: RwLock<HashMap<String, ToolBundle>>,
}

impl ToolMarketplace {
    /// Create an empty marketplace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a listing.
    ///
    /// A listing with the same `(seller, method)` pair replaces the existing
    /// entry in place; its position in query results is preserved.
    pub fn list_tool(&self, listing: ToolListing) {
        if let Ok(mut listings) = self.listings.write() {
            debug!(seller = %listing.seller, method = %listing.method, "published listing");
            match listings
                .iter_mut()
                .find(|l| l.seller == listing.seller && l.method == listing.method)
            {
                Some(existing) => *existing = listing,
                None => listings.push(listing),
            }
        }
    }

    /// Register a bundle. Bundle IDs are unique; re-registering an ID is
    /// rejected rather than silently replaced.
    pub fn register_bundle(&self, bundle: ToolBundle) -> GatewayResult<()> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| GatewayError::Session {
                reason: "marketplace lock poisoned".to_string(),
            })?;

        if bundles.contains_key(&bundle.id) {
            return Err(GatewayError::DuplicateBundle {
                id: bundle.id.clone(),
            });
        }
        bundles.insert(bundle.id.clone(), bundle);
        Ok(())
    }

    /// Look up a bundle by ID.
    pub fn get_bundle(&self, id: &str) -> Option<ToolBundle> {
        self.bundles.read().ok()?.get(id).cloned()
    }

    /// Query listings matching the criteria, in insertion order.
    pub fn query(&self, criteria: &QueryCriteria) -> Vec<ToolListing> {
        self.listings
            .read()
            .map(|listings| {
                listings
                    .iter()
                    .filter(|l| criteria.matches(l))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Catalog totals.
    pub fn stats(&self) -> MarketplaceStats {
        MarketplaceStats {
            total_listings: self.listings.read().map(|l| l.len()).unwrap_or(0),
            total_bundles: self.bundles.read().map(|b| b.len()).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_types::{current_timestamp, PricingTier};

    fn listing(seller: &str, method: &str) -> ToolListing {
        ToolListing {
            seller: AgentId::new(seller),
            method: method.to_string(),
            tiers: vec!["standard".to_string()],
            region: None,
            avg_latency_ms: 0.0,
            reputation: 1.0,
            listed_at: current_timestamp(),
        }
    }

    #[test]
    fn test_publish_and_query_all() {
        let market = ToolMarketplace::new();
        market.list_tool(listing("s1", "getBalance"));
        market.list_tool(listing("s1", "getAccountInfo"));

        let results = market.query(&QueryCriteria::any());
        assert_eq!(results.len(), 2);
        assert_eq!(market.stats().total_listings, 2);
    }

    #[test]
    fn test_republish_upserts_in_place() {
        let market = ToolMarketplace::new();
        market.list_tool(listing("s1", "getBalance"));
        market.list_tool(listing("s1", "getAccountInfo"));

        let mut refreshed = listing("s1", "getBalance");
        refreshed.avg_latency_ms = 33.0;
        market.list_tool(refreshed);

        let results = market.query(&QueryCriteria::any());
        assert_eq!(results.len(), 2);
        // Position preserved, stats refreshed.
        assert_eq!(results[0].method, "getBalance");
        assert_eq!(results[0].avg_latency_ms, 33.0);
    }

    #[test]
    fn test_query_criteria_are_conjunctive() {
        let market = ToolMarketplace::new();
        market.list_tool(listing("s1", "getBalance"));
        market.list_tool(listing("s2", "getBalance"));
        market.list_tool(listing("s1", "getAsset"));

        let results = market.query(
            &QueryCriteria::any()
                .method_contains("Balance")
                .seller(AgentId::new("s1")),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].seller, AgentId::new("s1"));
    }

    #[test]
    fn test_query_by_tier_and_region() {
        let market = ToolMarketplace::new();
        let mut l = listing("s1", "getBalance");
        l.region = Some("eu-west".to_string());
        market.list_tool(l);
        market.list_tool(listing("s2", "getBalance"));

        assert_eq!(
            market.query(&QueryCriteria::any().region("eu-west")).len(),
            1
        );
        assert_eq!(market.query(&QueryCriteria::any().tier("standard")).len(), 2);
        assert_eq!(market.query(&QueryCriteria::any().tier("premium")).len(), 0);
    }

    #[test]
    fn test_duplicate_bundle_rejected() {
        let market = ToolMarketplace::new();
        let bundle = ToolBundle::new(
            "das-basics",
            AgentId::new("s1"),
            vec!["getAsset".to_string()],
            vec![PricingTier::new("das-basics:standard", 150)],
        );

        market.register_bundle(bundle.clone()).unwrap();
        let result = market.register_bundle(bundle);
        assert!(matches!(result, Err(GatewayError::DuplicateBundle { .. })));
        assert_eq!(market.stats().total_bundles, 1);
    }

    #[test]
    fn test_get_bundle() {
        let market = ToolMarketplace::new();
        assert!(market.get_bundle("nope").is_none());

        market
            .register_bundle(ToolBundle::new(
                "das-basics",
                AgentId::new("s1"),
                vec!["getAsset".to_string()],
                vec![],
            ))
            .unwrap();
        assert!(market.get_bundle("das-basics").is_some());
    }
}
