//! In-process x402 rail: local payload validation and escrow-style settlement.
//!
//! [`LocalPaywall`] performs the whole seller-side flow without any external
//! facilitator: it builds payment requirements, validates incoming payloads
//! (scheme, network, recipient, amount, validity window, nonce replay), and
//! settles against an in-memory escrow ledger. Signature verification is the
//! on-chain rail's concern; the local rail trusts escrow accounting.
//!
//! [`LocalPaymentClient`] is the matching buyer side: it turns a seller's
//! requirements into an `X-PAYMENT` header.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{X402Error, X402Result};
use crate::paywall::{PaymentClient, Paywall};
use crate::types::{
    PaymentDetails, PaymentPayload, PaymentRequirements, ProcessOutcome, SettlementOutcome,
    VerifiedPayload, DEFAULT_MAX_TIMEOUT_SECS, HEADER_PAYMENT, NETWORK_SOLANA_DEVNET,
    SCHEME_EXACT, X402_VERSION,
};

/// Seller-side paywall with purely local verification and settlement.
pub struct LocalPaywall {
    /// Address payments must be made out to.
    pay_to: String,

    /// Accepted network identifier.
    network: String,

    /// Flat price per call in lamports.
    price: u64,

    /// Methods exempt from payment.
    free_methods: HashSet<String>,

    /// Nonces already consumed, for replay prevention.
    used_nonces: RwLock<HashSet<String>>,

    /// Number of settled payments.
    settled_count: AtomicU64,

    /// Total settled volume in lamports.
    total_volume: AtomicU64,
}

impl LocalPaywall {
    /// Create a paywall charging `price` lamports per call on devnet.
    pub fn new(pay_to: impl Into<String>, price: u64) -> Self {
        Self {
            pay_to: pay_to.into(),
            network: NETWORK_SOLANA_DEVNET.to_string(),
            price,
            free_methods: HashSet::new(),
            used_nonces: RwLock::new(HashSet::new()),
            settled_count: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
        }
    }

    /// Set the accepted network identifier.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Exempt a method from payment.
    pub fn with_free_method(mut self, method: impl Into<String>) -> Self {
        self.free_methods.insert(method.into());
        self
    }

    /// Number of settled payments so far.
    pub fn settled_count(&self) -> u64 {
        self.settled_count.load(Ordering::Relaxed)
    }

    /// Total settled volume in lamports.
    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    /// Build the payment requirements for one call to `method`.
    fn requirements_for(&self, method: &str) -> PaymentRequirements {
        PaymentRequirements {
            x402_version: X402_VERSION,
            scheme: SCHEME_EXACT.to_string(),
            network: self.network.clone(),
            amount: self.price.to_string(),
            pay_to: self.pay_to.clone(),
            resource: method.to_string(),
            description: format!("Metered RPC call: {method}"),
            max_timeout_secs: DEFAULT_MAX_TIMEOUT_SECS,
        }
    }

    /// Validate a decoded payload against this paywall's requirements.
    fn validate_payload(&self, payload: &PaymentPayload) -> X402Result<u64> {
        if payload.scheme != SCHEME_EXACT {
            return Err(X402Error::UnsupportedScheme {
                scheme: payload.scheme.clone(),
            });
        }

        if payload.network != self.network {
            return Err(X402Error::UnsupportedNetwork {
                network: payload.network.clone(),
            });
        }

        if payload.payload.to != self.pay_to {
            return Err(X402Error::MalformedPayload {
                reason: format!(
                    "wrong recipient: expected {}, got {}",
                    self.pay_to, payload.payload.to
                ),
            });
        }

        let amount: u64 =
            payload
                .payload
                .amount
                .parse()
                .map_err(|_| X402Error::MalformedPayload {
                    reason: format!("invalid amount: {}", payload.payload.amount),
                })?;
        if amount < self.price {
            return Err(X402Error::InsufficientPayment {
                required: self.price,
                received: amount,
            });
        }

        let now = current_timestamp();

        let valid_after: u64 = payload.payload.valid_after.parse().unwrap_or(0);
        if now < valid_after {
            return Err(X402Error::PaymentNotYetValid { valid_after });
        }

        let valid_before: u64 = payload.payload.valid_before.parse().unwrap_or(u64::MAX);
        if now > valid_before {
            return Err(X402Error::PaymentExpired {
                expired_at: valid_before,
            });
        }

        Ok(amount)
    }
}

#[async_trait]
impl Paywall for LocalPaywall {
    async fn process_request(
        &self,
        method: &str,
        headers: &HashMap<String, String>,
    ) -> X402Result<ProcessOutcome> {
        if self.price == 0 || self.free_methods.contains(method) {
            return Ok(ProcessOutcome::NoPaymentNeeded);
        }

        let header = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(HEADER_PAYMENT))
            .map(|(_, v)| v.as_str());

        let Some(header) = header else {
            debug!(method, "no payment header, returning requirements");
            return Ok(ProcessOutcome::PaymentRequired(self.requirements_for(method)));
        };

        let payload = PaymentPayload::from_header(header)?;
        let amount = self.validate_payload(&payload)?;

        let nonce = payload.payload.nonce.clone();
        if self.used_nonces.read().await.contains(&nonce) {
            return Err(X402Error::NonceReused { nonce });
        }

        Ok(ProcessOutcome::PaymentValid {
            payload: VerifiedPayload {
                payer: payload.payload.from,
                amount,
                nonce,
            },
            requirements: self.requirements_for(method),
        })
    }

    async fn settle_after_response(
        &self,
        payload: &VerifiedPayload,
        requirements: &PaymentRequirements,
    ) -> X402Result<SettlementOutcome> {
        // Consume the nonce only once the call actually succeeded, so a
        // failed upstream call does not burn the buyer's payment.
        let mut nonces = self.used_nonces.write().await;
        if !nonces.insert(payload.nonce.clone()) {
            return Err(X402Error::NonceReused {
                nonce: payload.nonce.clone(),
            });
        }
        drop(nonces);

        self.settled_count.fetch_add(1, Ordering::Relaxed);
        self.total_volume.fetch_add(payload.amount, Ordering::Relaxed);

        info!(
            payer = %payload.payer,
            amount = payload.amount,
            resource = %requirements.resource,
            "x402 payment settled (local escrow)"
        );

        let mut outcome = SettlementOutcome {
            success: true,
            tx_signature: None,
            response_header: None,
        };
        outcome.response_header = Some(outcome.to_response_header());
        Ok(outcome)
    }
}

/// Buyer-side client that pays a seller's requirements from a named account.
pub struct LocalPaymentClient {
    /// Paying account address.
    payer: String,
}

impl LocalPaymentClient {
    /// Create a client paying from `payer`.
    pub fn new(payer: impl Into<String>) -> Self {
        Self {
            payer: payer.into(),
        }
    }
}

#[async_trait]
impl PaymentClient for LocalPaymentClient {
    async fn pay(&self, requirements: &PaymentRequirements) -> X402Result<String> {
        let now = current_timestamp();
        let nonce: [u8; 16] = rand::random();

        let payload = PaymentPayload {
            x402_version: X402_VERSION,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            payload: PaymentDetails {
                from: self.payer.clone(),
                to: requirements.pay_to.clone(),
                amount: requirements.amount.clone(),
                valid_after: now.saturating_sub(60).to_string(),
                valid_before: (now + requirements.max_timeout_secs).to_string(),
                nonce: hex::encode(nonce),
                signature: String::new(),
            },
        };

        Ok(payload.to_header())
    }
}

/// Get the current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_payment(header: String) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(HEADER_PAYMENT.to_string(), header);
        headers
    }

    async fn pay_for(paywall: &LocalPaywall, method: &str) -> HashMap<String, String> {
        let requirements = paywall.requirements_for(method);
        let client = LocalPaymentClient::new("buyer-1");
        headers_with_payment(client.pay(&requirements).await.unwrap())
    }

    #[tokio::test]
    async fn test_no_header_yields_requirements() {
        let paywall = LocalPaywall::new("seller-1", 100);
        let outcome = paywall
            .process_request("getBalance", &HashMap::new())
            .await
            .unwrap();

        match outcome {
            ProcessOutcome::PaymentRequired(req) => {
                assert_eq!(req.amount, "100");
                assert_eq!(req.pay_to, "seller-1");
                assert_eq!(req.resource, "getBalance");
            }
            other => panic!("expected PaymentRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_free_method_needs_no_payment() {
        let paywall = LocalPaywall::new("seller-1", 100).with_free_method("getHealth");
        let outcome = paywall
            .process_request("getHealth", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::NoPaymentNeeded);
    }

    #[tokio::test]
    async fn test_valid_payment_flow() {
        let paywall = LocalPaywall::new("seller-1", 100);
        let headers = pay_for(&paywall, "getBalance").await;

        let outcome = paywall
            .process_request("getBalance", &headers)
            .await
            .unwrap();
        let (verified, requirements) = match outcome {
            ProcessOutcome::PaymentValid {
                payload,
                requirements,
            } => (payload, requirements),
            other => panic!("expected PaymentValid, got {other:?}"),
        };
        assert_eq!(verified.payer, "buyer-1");
        assert_eq!(verified.amount, 100);
        assert_eq!(requirements.resource, "getBalance");

        let settlement = paywall
            .settle_after_response(&verified, &requirements)
            .await
            .unwrap();
        assert!(settlement.success);
        assert!(settlement.response_header.is_some());
        assert_eq!(paywall.settled_count(), 1);
        assert_eq!(paywall.total_volume(), 100);
    }

    #[tokio::test]
    async fn test_nonce_replay_rejected() {
        let paywall = LocalPaywall::new("seller-1", 100);
        let headers = pay_for(&paywall, "getBalance").await;

        let (verified, requirements) = match paywall
            .process_request("getBalance", &headers)
            .await
            .unwrap()
        {
            ProcessOutcome::PaymentValid {
                payload,
                requirements,
            } => (payload, requirements),
            other => panic!("expected PaymentValid, got {other:?}"),
        };
        paywall
            .settle_after_response(&verified, &requirements)
            .await
            .unwrap();

        // Replaying the same header is rejected at verification.
        let result = paywall.process_request("getBalance", &headers).await;
        assert!(matches!(result, Err(X402Error::NonceReused { .. })));
    }

    #[tokio::test]
    async fn test_insufficient_payment_rejected() {
        // Buyer pays the cheap paywall's price, seller charges more.
        let cheap = LocalPaywall::new("seller-1", 10);
        let expensive = LocalPaywall::new("seller-1", 1_000);

        let headers = pay_for(&cheap, "getBalance").await;
        let result = expensive.process_request("getBalance", &headers).await;
        assert!(matches!(
            result,
            Err(X402Error::InsufficientPayment {
                required: 1_000,
                received: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_wrong_recipient_rejected() {
        let other_seller = LocalPaywall::new("someone-else", 100);
        let paywall = LocalPaywall::new("seller-1", 100);

        let headers = pay_for(&other_seller, "getBalance").await;
        let result = paywall.process_request("getBalance", &headers).await;
        assert!(matches!(result, Err(X402Error::MalformedPayload { .. })));
    }

    #[tokio::test]
    async fn test_wrong_network_rejected() {
        let mainnet = LocalPaywall::new("seller-1", 100).with_network("solana:mainnet");
        let devnet = LocalPaywall::new("seller-1", 100);

        let headers = pay_for(&devnet, "getBalance").await;
        let result = mainnet.process_request("getBalance", &headers).await;
        assert!(matches!(result, Err(X402Error::UnsupportedNetwork { .. })));
    }

    #[tokio::test]
    async fn test_garbage_header_rejected() {
        let paywall = LocalPaywall::new("seller-1", 100);
        let headers = headers_with_payment("!!! not a payment !!!".to_string());
        let result = paywall.process_request("getBalance", &headers).await;
        assert!(matches!(result, Err(X402Error::MalformedPayload { .. })));
    }
}
