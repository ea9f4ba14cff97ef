//! The agent gateway: metered, budget-bounded RPC access for buying agents.
//!
//! The gateway composes the pricing engine, session table, response
//! validator, marketplace, and optional x402 payment rail around an injected
//! [`RpcTransport`]. Each session lives behind its own async mutex, held
//! across the pre-call check, the transport call, and the post-call commit,
//! so budget and rate-limit checks stay atomic under concurrent callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use agentgate_types::{
    current_timestamp, AgentId, Amount, PaymentIntent, PaymentReceipt, PricingTier, SessionId,
    SettlementKind, ToolBundle, ToolListing, DEFAULT_MAX_CONCURRENT_SESSIONS,
};
use agentgate_x402::{
    PaymentClient, PaymentRequirements, Paywall, ProcessOutcome, X402Error,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventBus, EventKind, GatewayEvent};
use crate::marketplace::{MarketplaceStats, QueryCriteria, ToolMarketplace};
use crate::pricing::PricingEngine;
use crate::session::{AgentSession, SessionSnapshot};
use crate::transport::RpcTransport;
use crate::validator::{AttestationSigner, AttestedResult, ResponseValidator};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The selling agent's identity; intents naming another seller are
    /// rejected.
    pub seller: AgentId,

    /// Ceiling on concurrently open (non-terminal) sessions.
    pub max_concurrent_sessions: usize,

    /// Attest every result, even for tiers that do not include attestation.
    pub attest_by_default: bool,
}

impl GatewayConfig {
    /// Configuration with default limits for the given seller identity.
    pub fn new(seller: AgentId) -> Self {
        Self {
            seller,
            max_concurrent_sessions: DEFAULT_MAX_CONCURRENT_SESSIONS,
            attest_by_default: false,
        }
    }

    /// Override the concurrent-session ceiling.
    pub fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    /// Attest every result regardless of tier.
    pub fn with_attest_by_default(mut self) -> Self {
        self.attest_by_default = true;
        self
    }
}

/// One call in a batch.
#[derive(Debug, Clone)]
pub struct RpcCall {
    /// RPC method name.
    pub method: String,
    /// RPC params.
    pub params: Vec<Value>,
}

impl RpcCall {
    /// Build a call.
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Outcome of an x402-gated execution.
#[derive(Debug)]
pub enum X402Execution {
    /// The paywall demands payment; pay and retry with the `X-PAYMENT`
    /// header these requirements describe.
    PaymentRequired(PaymentRequirements),

    /// The call went through.
    Completed {
        /// The metered (and possibly attested) result.
        result: AttestedResult,
        /// `X-PAYMENT-RESPONSE` header value, when a payment was settled.
        payment_header: Option<String>,
    },
}

/// Point-in-time gateway metrics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMetrics {
    /// Calls committed over the gateway's lifetime.
    pub total_calls_served: u64,
    /// Revenue committed over the gateway's lifetime, in lamports.
    pub total_revenue: Amount,
    /// Currently open (non-terminal) sessions.
    pub active_sessions: usize,
    /// Sessions opened over the gateway's lifetime.
    pub total_sessions: u64,
    /// Rolling average call latency, milliseconds.
    pub avg_latency_ms: f64,
    /// Attestations produced over the gateway's lifetime.
    pub total_attestations: u64,
    /// Marketplace catalog totals.
    pub marketplace: MarketplaceStats,
    /// Whether a seller-side x402 paywall is configured.
    pub x402_paywall_enabled: bool,
    /// Whether a buyer-side payment client is configured.
    pub payment_client_enabled: bool,
}

type SessionTable = RwLock<HashMap<SessionId, Arc<Mutex<AgentSession>>>>;

/// The metered RPC gateway.
pub struct AgentGateway {
    config: GatewayConfig,
    transport: Arc<dyn RpcTransport>,
    pricing: PricingEngine,
    validator: ResponseValidator,
    marketplace: ToolMarketplace,
    events: Arc<EventBus>,
    sessions: SessionTable,
    paywall: Option<Arc<dyn Paywall>>,
    payment_client: Option<Arc<dyn PaymentClient>>,
    total_calls: AtomicU64,
    total_revenue: AtomicU64,
    total_sessions: AtomicU64,
}

impl AgentGateway {
    /// Create a gateway with no signer and no payment rail.
    pub fn new(config: GatewayConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            transport,
            pricing: PricingEngine::new(),
            validator: ResponseValidator::new(),
            marketplace: ToolMarketplace::new(),
            events: Arc::new(EventBus::new()),
            sessions: RwLock::new(HashMap::new()),
            paywall: None,
            payment_client: None,
            total_calls: AtomicU64::new(0),
            total_revenue: AtomicU64::new(0),
            total_sessions: AtomicU64::new(0),
        }
    }

    /// Attach an attestation signer.
    pub fn with_signer(mut self, signer: Arc<dyn AttestationSigner>) -> Self {
        self.validator = ResponseValidator::with_signer(signer);
        self
    }

    /// Attach a seller-side x402 paywall.
    pub fn with_paywall(mut self, paywall: Arc<dyn Paywall>) -> Self {
        self.paywall = Some(paywall);
        self
    }

    /// Attach a buyer-side x402 payment client.
    pub fn with_payment_client(mut self, client: Arc<dyn PaymentClient>) -> Self {
        self.payment_client = Some(client);
        self
    }

    /// The gateway's seller identity.
    pub fn seller(&self) -> &AgentId {
        &self.config.seller
    }

    /// Register a pricing tier sessions can be opened against.
    pub fn register_tier(&self, tier: PricingTier) {
        self.pricing.register_tier(tier);
    }

    /// Subscribe to one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler);
    }

    /// Subscribe to every event kind.
    pub fn on_all<F>(&self, handler: F)
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.events.on_all(handler);
    }

    /// Verify a payment intent and open an active session from it.
    pub async fn open_session(&self, intent: PaymentIntent) -> GatewayResult<SessionId> {
        self.verify_intent(&intent)?;

        let tier = self.pricing.get_tier(&intent.tier_id).ok_or_else(|| {
            GatewayError::IntentVerification {
                reason: format!("unknown tier: {}", intent.tier_id),
            }
        })?;

        let mut sessions = self.sessions.write().await;
        let open = Self::count_open(&sessions).await;
        if open >= self.config.max_concurrent_sessions {
            return Err(GatewayError::MaxSessions {
                limit: self.config.max_concurrent_sessions,
            });
        }

        let mut session = AgentSession::new(
            intent,
            tier,
            self.config.seller.clone(),
            self.events.clone(),
        );
        session.activate()?;
        let id = session.id().clone();
        let buyer = session.intent().buyer.clone();
        let created = json!({
            "buyer": buyer,
            "tierId": session.tier().id,
            "maxBudget": session.intent().max_budget,
        });

        // Register before announcing, so handlers can already look the
        // session up; the table lock is released first to let them.
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        drop(sessions);

        info!(session = %id, buyer = %buyer, "session opened");
        self.events
            .emit(&GatewayEvent::new(EventKind::SessionCreated, Some(id.clone()), created));
        Ok(id)
    }

    /// Execute one metered call under a session.
    ///
    /// The session's mutex is held from the pre-call check through the
    /// transport call to the post-call commit, so two concurrent callers on
    /// the same session can never both pass a check only one of them is
    /// entitled to.
    pub async fn execute(
        &self,
        session_id: &SessionId,
        method: &str,
        params: &[Value],
    ) -> GatewayResult<AttestedResult> {
        let session = self.get_session(session_id).await?;
        let mut session = session.lock().await;

        let cost = session.pre_call(method)?;
        let should_attest =
            session.tier().includes_attestation || self.config.attest_by_default;

        self.emit_session(
            EventKind::CallBefore,
            session_id,
            json!({ "method": method, "cost": cost }),
        );

        let started = Instant::now();
        let value = match self.transport.request(method, params).await {
            Ok(value) => value,
            Err(e) => {
                warn!(session = %session_id, method, error = %e, "transport call failed");
                self.emit_session(
                    EventKind::CallError,
                    session_id,
                    json!({ "method": method, "error": e.to_string() }),
                );
                // Nothing was committed: the rejected call costs nothing.
                return Err(e.into());
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        session.post_call(cost);
        let sequence = session.next_sequence();
        drop(session);

        self.pricing.report_latency(latency_ms);
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let result = self.validator.wrap_result(
            value,
            session_id.clone(),
            method,
            params,
            sequence,
            latency_ms,
            should_attest,
        );

        if result.attestation.is_some() {
            self.emit_session(
                EventKind::CallAttested,
                session_id,
                json!({ "method": method, "sequence": sequence }),
            );
        }
        self.emit_session(
            EventKind::CallAfter,
            session_id,
            json!({ "method": method, "cost": cost, "latencyMs": latency_ms }),
        );

        Ok(result)
    }

    /// Execute a batch of calls sequentially, each independently metered.
    ///
    /// The first failing call fails the whole batch; charges committed by
    /// the calls that completed before it stand (no rollback) and are
    /// visible through [`session_snapshot`](Self::session_snapshot). Later
    /// calls in the batch never run.
    pub async fn execute_batch(
        &self,
        session_id: &SessionId,
        calls: &[RpcCall],
    ) -> GatewayResult<Vec<AttestedResult>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(session_id, &call.method, &call.params).await?);
        }
        Ok(results)
    }

    /// Settle a session into its receipt. Works exactly once per session;
    /// the session accepts no calls afterwards.
    ///
    /// A transaction signature marks the settlement as on-chain; without one
    /// it is recorded against off-chain escrow.
    pub async fn settle_session(
        &self,
        session_id: &SessionId,
        tx_signature: Option<String>,
    ) -> GatewayResult<PaymentReceipt> {
        let session = self.get_session(session_id).await?;
        let mut session = session.lock().await;

        let usage = session.settle()?;
        let settlement = if tx_signature.is_some() {
            SettlementKind::Onchain
        } else {
            SettlementKind::OffchainEscrow
        };

        let receipt = PaymentReceipt {
            nonce: session.intent().nonce.clone(),
            amount_charged: usage.amount_charged,
            call_count: usage.call_count,
            tx_signature,
            settlement,
            settled_at: current_timestamp(),
        };
        drop(session);

        // Revenue counts settled usage only; a session that expires or is
        // pruned without settling contributes nothing.
        self.total_revenue
            .fetch_add(receipt.amount_charged, Ordering::Relaxed);

        info!(session = %session_id, amount = receipt.amount_charged, "session settled");
        self.emit_session(
            EventKind::PaymentSettled,
            session_id,
            serde_json::to_value(&receipt).unwrap_or(Value::Null),
        );

        Ok(receipt)
    }

    /// Pause a session; calls fail until it is resumed.
    pub async fn pause_session(&self, session_id: &SessionId) -> GatewayResult<()> {
        let session = self.get_session(session_id).await?;
        let mut session = session.lock().await;
        session.pause()
    }

    /// Resume a paused session.
    pub async fn resume_session(&self, session_id: &SessionId) -> GatewayResult<()> {
        let session = self.get_session(session_id).await?;
        let mut session = session.lock().await;
        session.activate()
    }

    /// Read-only snapshot of a session.
    pub async fn session_snapshot(&self, session_id: &SessionId) -> GatewayResult<SessionSnapshot> {
        let session = self.get_session(session_id).await?;
        let snapshot = session.lock().await.snapshot();
        Ok(snapshot)
    }

    /// Drop terminal (expired or settled) sessions from the table and return
    /// how many were removed. This is the only place sessions are deleted.
    pub async fn prune_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut terminal = Vec::new();
        for (id, session) in sessions.iter() {
            if session.lock().await.status().is_terminal() {
                terminal.push(id.clone());
            }
        }
        for id in &terminal {
            sessions.remove(id);
        }
        if !terminal.is_empty() {
            debug!(count = terminal.len(), "pruned terminal sessions");
        }
        terminal.len()
    }

    /// Publish marketplace listings for a set of methods, stamped with the
    /// gateway's identity and live latency stats.
    pub fn publish(&self, methods: &[&str], tiers: Vec<String>, region: Option<String>) {
        let avg_latency_ms = self.pricing.avg_latency();
        let listed_at = current_timestamp();
        for method in methods {
            self.marketplace.list_tool(ToolListing {
                seller: self.config.seller.clone(),
                method: (*method).to_string(),
                tiers: tiers.clone(),
                region: region.clone(),
                avg_latency_ms,
                reputation: 1.0,
                listed_at,
            });
        }
    }

    /// Register a bundle: its tiers become openable and the bundle appears
    /// in marketplace stats.
    pub fn publish_bundle(&self, bundle: ToolBundle) -> GatewayResult<()> {
        self.marketplace.register_bundle(bundle.clone())?;
        self.pricing.register_bundle(&bundle);
        Ok(())
    }

    /// Query the marketplace catalog.
    pub fn query_marketplace(&self, criteria: &QueryCriteria) -> Vec<ToolListing> {
        self.marketplace.query(criteria)
    }

    /// Point-in-time metrics.
    pub async fn metrics(&self) -> GatewayMetrics {
        let sessions = self.sessions.read().await;
        let active_sessions = Self::count_open(&sessions).await;
        drop(sessions);

        GatewayMetrics {
            total_calls_served: self.total_calls.load(Ordering::Relaxed),
            total_revenue: self.total_revenue.load(Ordering::Relaxed),
            active_sessions,
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            avg_latency_ms: self.pricing.avg_latency(),
            total_attestations: self.validator.total_attestations(),
            marketplace: self.marketplace.stats(),
            x402_paywall_enabled: self.paywall.is_some(),
            payment_client_enabled: self.payment_client.is_some(),
        }
    }

    /// Execute a call behind the x402 paywall.
    ///
    /// Without a configured paywall this is a plain [`execute`](Self::execute).
    /// With one, the incoming headers decide the outcome: no valid payment
    /// yields the requirements to satisfy; a verified payment lets the call
    /// through and is settled after the response.
    pub async fn execute_with_x402(
        &self,
        session_id: &SessionId,
        method: &str,
        params: &[Value],
        headers: &HashMap<String, String>,
    ) -> GatewayResult<X402Execution> {
        let Some(paywall) = &self.paywall else {
            let result = self.execute(session_id, method, params).await?;
            return Ok(X402Execution::Completed {
                result,
                payment_header: None,
            });
        };

        match paywall.process_request(method, headers).await? {
            ProcessOutcome::PaymentRequired(requirements) => {
                self.emit_session(
                    EventKind::X402PaymentRequired,
                    session_id,
                    json!({ "method": method, "amount": requirements.amount }),
                );
                Ok(X402Execution::PaymentRequired(requirements))
            }
            ProcessOutcome::NoPaymentNeeded => {
                let result = self.execute(session_id, method, params).await?;
                Ok(X402Execution::Completed {
                    result,
                    payment_header: None,
                })
            }
            ProcessOutcome::PaymentValid {
                payload,
                requirements,
            } => {
                self.emit_session(
                    EventKind::X402PaymentVerified,
                    session_id,
                    json!({ "payer": payload.payer, "amount": payload.amount }),
                );

                let result = self.execute(session_id, method, params).await?;

                let settlement = paywall
                    .settle_after_response(&payload, &requirements)
                    .await?;
                self.emit_session(
                    EventKind::X402PaymentSettled,
                    session_id,
                    json!({ "txSignature": settlement.tx_signature }),
                );

                let payment_header = settlement
                    .response_header
                    .clone()
                    .or_else(|| Some(settlement.to_response_header()));
                Ok(X402Execution::Completed {
                    result,
                    payment_header,
                })
            }
        }
    }

    /// Buyer-side: pay a seller's requirements and return the `X-PAYMENT`
    /// header for the retry. Fails without a configured payment client.
    pub async fn pay_for(&self, requirements: &PaymentRequirements) -> GatewayResult<String> {
        let Some(client) = &self.payment_client else {
            return Err(X402Error::NotConfigured.into());
        };
        let header = client.pay(requirements).await?;
        self.events.emit(&GatewayEvent::new(
            EventKind::X402PaymentSent,
            None,
            json!({ "amount": requirements.amount, "payTo": requirements.pay_to }),
        ));
        Ok(header)
    }

    fn verify_intent(&self, intent: &PaymentIntent) -> GatewayResult<()> {
        if intent.seller != self.config.seller {
            return Err(GatewayError::IntentVerification {
                reason: format!(
                    "intent names seller {}, gateway is {}",
                    intent.seller, self.config.seller
                ),
            });
        }
        if intent.max_budget == 0 {
            return Err(GatewayError::IntentVerification {
                reason: "max budget must be positive".to_string(),
            });
        }
        if intent.ttl_secs == 0 {
            return Err(GatewayError::IntentVerification {
                reason: "ttl must be positive".to_string(),
            });
        }
        if intent.is_expired(current_timestamp()) {
            return Err(GatewayError::IntentVerification {
                reason: "intent has expired".to_string(),
            });
        }
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> GatewayResult<Arc<Mutex<AgentSession>>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn count_open(sessions: &HashMap<SessionId, Arc<Mutex<AgentSession>>>) -> usize {
        let mut open = 0;
        for session in sessions.values() {
            if session.lock().await.status().is_open() {
                open += 1;
            }
        }
        open
    }

    fn emit_session(&self, kind: EventKind, session_id: &SessionId, data: Value) {
        self.events
            .emit(&GatewayEvent::new(kind, Some(session_id.clone()), data));
    }
}
