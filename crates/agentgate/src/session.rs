//! Agent sessions: budget- and time-bounded grants of metered access.
//!
//! A session wraps one verified [`PaymentIntent`] and one resolved
//! [`PricingTier`] and enforces their limits through a pre-call / post-call
//! pair: `pre_call` validates and prices a call without committing anything,
//! `post_call` commits the cost exactly once after the upstream call
//! succeeded. Expiry is checked lazily on the next pre-call, not by a
//! background timer.

use std::sync::Arc;

use agentgate_types::{
    current_timestamp, current_timestamp_ms, AgentId, Amount, Nonce, PaymentIntent, PricingTier,
    SessionId, Timestamp, BUDGET_WARNING_RATIO,
};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventBus, EventKind, GatewayEvent};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created but not yet activated.
    Pending,
    /// Accepting calls.
    Active,
    /// Temporarily suspended; can be resumed.
    Paused,
    /// Outlived its TTL. Terminal.
    Expired,
    /// Settled into a receipt. Terminal.
    Settled,
}

impl SessionStatus {
    /// Check if the status accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Settled)
    }

    /// Check if the session counts against the concurrency ceiling.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Expired => "expired",
            Self::Settled => "settled",
        };
        f.write_str(s)
    }
}

/// Final usage snapshot returned by settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUsage {
    /// Total amount committed over the session's lifetime.
    pub amount_charged: Amount,
    /// Total committed calls.
    pub call_count: u64,
}

/// Read-only view of a session for external inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Current status (as of the last committed operation).
    pub status: SessionStatus,
    /// The buying agent.
    pub buyer: AgentId,
    /// Identifier of the session's tier.
    pub tier_id: String,
    /// Committed calls so far.
    pub calls_made: u64,
    /// Committed spend so far.
    pub amount_charged: Amount,
    /// Nonce of the originating intent.
    pub intent_nonce: Nonce,
    /// Session creation time (Unix seconds).
    pub created_at: Timestamp,
    /// Expiry deadline (Unix seconds).
    pub expires_at: Timestamp,
}

/// A per-buyer metered session.
///
/// Owned exclusively by the gateway's session table; the session enforces
/// its own counters' invariants and never reaches back into the gateway.
pub struct AgentSession {
    id: SessionId,
    intent: PaymentIntent,
    tier: PricingTier,
    seller: AgentId,
    status: SessionStatus,
    calls_made: u64,
    amount_charged: Amount,
    created_at: Timestamp,
    expires_at: Timestamp,
    // Rate-limit window bookkeeping (milliseconds).
    window_start_ms: u64,
    window_calls: u32,
    // Monotonic per-session sequence for attested results.
    next_sequence: u64,
    budget_warned: bool,
    events: Arc<EventBus>,
}

impl AgentSession {
    /// Create a session in `pending` from a verified intent.
    pub fn new(
        intent: PaymentIntent,
        tier: PricingTier,
        seller: AgentId,
        events: Arc<EventBus>,
    ) -> Self {
        let created_at = current_timestamp();
        let expires_at = created_at.saturating_add(intent.ttl_secs);

        Self {
            id: SessionId::generate(),
            intent,
            tier,
            seller,
            status: SessionStatus::Pending,
            calls_made: 0,
            amount_charged: 0,
            created_at,
            expires_at,
            window_start_ms: current_timestamp_ms(),
            window_calls: 0,
            next_sequence: 0,
            budget_warned: false,
            events,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The session's pricing tier.
    pub fn tier(&self) -> &PricingTier {
        &self.tier
    }

    /// The originating intent.
    pub fn intent(&self) -> &PaymentIntent {
        &self.intent
    }

    /// The selling agent.
    pub fn seller(&self) -> &AgentId {
        &self.seller
    }

    /// Activate the session.
    ///
    /// `pending -> active` and `paused -> active`; a no-op when already
    /// active; an error from a terminal state.
    pub fn activate(&mut self) -> GatewayResult<()> {
        match self.status {
            SessionStatus::Pending | SessionStatus::Paused => {
                self.status = SessionStatus::Active;
                Ok(())
            }
            SessionStatus::Active => Ok(()),
            terminal => Err(GatewayError::Session {
                reason: format!("cannot activate a {terminal} session"),
            }),
        }
    }

    /// Pause the session. Only an active session can be paused.
    pub fn pause(&mut self) -> GatewayResult<()> {
        match self.status {
            SessionStatus::Active => {
                self.status = SessionStatus::Paused;
                self.emit(EventKind::SessionPaused, json!({}));
                Ok(())
            }
            other => Err(GatewayError::Session {
                reason: format!("cannot pause a {other} session"),
            }),
        }
    }

    /// Validate a prospective call and return its cost without committing it.
    ///
    /// Checks, in order: active status, lazy TTL expiry, rate limit,
    /// projected budget, and the tier's call ceiling. A rejected call leaves
    /// all counters untouched.
    pub fn pre_call(&mut self, method: &str) -> GatewayResult<Amount> {
        match self.status {
            SessionStatus::Active | SessionStatus::Paused => {}
            SessionStatus::Expired => {
                return Err(GatewayError::SessionExpired {
                    expired_at: self.expires_at,
                })
            }
            other => {
                return Err(GatewayError::Session {
                    reason: format!("session is {other}, not active"),
                })
            }
        }

        // Lazy expiry: discovered on the call attempt, not by a timer.
        // A paused session past its deadline expires the same way.
        if current_timestamp() > self.expires_at {
            self.status = SessionStatus::Expired;
            self.emit(EventKind::SessionExpired, json!({ "expiresAt": self.expires_at }));
            debug!(session = %self.id, "session expired on pre-call check");
            return Err(GatewayError::SessionExpired {
                expired_at: self.expires_at,
            });
        }

        if self.status == SessionStatus::Paused {
            return Err(GatewayError::Session {
                reason: "session is paused, not active".to_string(),
            });
        }

        if let Some(limit) = self.tier.rate_limit {
            let now_ms = current_timestamp_ms();
            let in_window = now_ms.saturating_sub(self.window_start_ms) < limit.window_ms;
            if in_window && self.window_calls >= limit.max_calls {
                return Err(GatewayError::RateLimitExceeded {
                    max_calls: limit.max_calls,
                    window_ms: limit.window_ms,
                });
            }
        }

        let cost = self.tier.cost_for(method);

        let projected = self.amount_charged.saturating_add(cost);
        if projected > self.intent.max_budget {
            return Err(GatewayError::BudgetExhausted {
                charged: self.amount_charged,
                max_budget: self.intent.max_budget,
                cost,
            });
        }

        if let Some(max_calls) = self.tier.max_calls {
            if self.calls_made >= max_calls {
                return Err(GatewayError::CallLimitExceeded { limit: max_calls });
            }
        }

        Ok(cost)
    }

    /// Commit the cost of a call accepted by [`pre_call`](Self::pre_call).
    ///
    /// Must be called exactly once per accepted pre-call, and only after the
    /// upstream call succeeded.
    pub fn post_call(&mut self, cost: Amount) {
        self.calls_made += 1;
        self.amount_charged = self.amount_charged.saturating_add(cost);
        debug_assert!(self.amount_charged <= self.intent.max_budget);

        if self.tier.rate_limit.is_some() {
            let now_ms = current_timestamp_ms();
            let window_ms = self.tier.rate_limit.map(|l| l.window_ms).unwrap_or(0);
            if now_ms.saturating_sub(self.window_start_ms) >= window_ms {
                self.window_start_ms = now_ms;
                self.window_calls = 1;
            } else {
                self.window_calls += 1;
            }
        }

        if !self.budget_warned
            && self.amount_charged as f64
                >= self.intent.max_budget as f64 * BUDGET_WARNING_RATIO
        {
            self.budget_warned = true;
            self.emit(
                EventKind::BudgetWarning,
                json!({
                    "amountCharged": self.amount_charged,
                    "maxBudget": self.intent.max_budget,
                }),
            );
        }
    }

    /// Next per-session sequence number, strictly increasing from 1.
    pub fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Settle the session, freezing further calls.
    ///
    /// Transitions to `settled` exactly once; settling an already-terminal
    /// session is an error.
    pub fn settle(&mut self) -> GatewayResult<SessionUsage> {
        if self.status.is_terminal() {
            return Err(GatewayError::Session {
                reason: format!("cannot settle a {} session", self.status),
            });
        }

        self.status = SessionStatus::Settled;
        Ok(SessionUsage {
            amount_charged: self.amount_charged,
            call_count: self.calls_made,
        })
    }

    /// Read-only view of the last committed state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            status: self.status,
            buyer: self.intent.buyer.clone(),
            tier_id: self.tier.id.clone(),
            calls_made: self.calls_made,
            amount_charged: self.amount_charged,
            intent_nonce: self.intent.nonce.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Emit a lifecycle event. Never fails or blocks the caller.
    fn emit(&self, kind: EventKind, data: serde_json::Value) {
        self.events
            .emit(&GatewayEvent::new(kind, Some(self.id.clone()), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_types::RateLimit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_session(max_budget: Amount, ttl_secs: u64, tier: PricingTier) -> AgentSession {
        let intent = PaymentIntent::new(
            AgentId::new("buyer"),
            AgentId::new("seller"),
            tier.id.clone(),
            max_budget,
            ttl_secs,
        );
        AgentSession::new(intent, tier, AgentId::new("seller"), Arc::new(EventBus::new()))
    }

    fn active_session(max_budget: Amount, tier: PricingTier) -> AgentSession {
        let mut session = test_session(max_budget, 600, tier);
        session.activate().unwrap();
        session
    }

    #[test]
    fn test_lifecycle_pending_to_active() {
        let mut session = test_session(1_000, 600, PricingTier::new("t", 100));
        assert_eq!(session.status(), SessionStatus::Pending);

        session.activate().unwrap();
        assert_eq!(session.status(), SessionStatus::Active);

        // Activating again is a no-op.
        session.activate().unwrap();
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn test_pre_call_rejects_pending() {
        let mut session = test_session(1_000, 600, PricingTier::new("t", 100));
        let result = session.pre_call("getBalance");
        assert!(matches!(result, Err(GatewayError::Session { .. })));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut session = active_session(1_000, PricingTier::new("t", 100));

        session.pause().unwrap();
        assert_eq!(session.status(), SessionStatus::Paused);
        assert!(matches!(
            session.pre_call("getBalance"),
            Err(GatewayError::Session { .. })
        ));

        session.activate().unwrap();
        assert!(session.pre_call("getBalance").is_ok());
    }

    #[test]
    fn test_budget_ceiling_exact_boundary() {
        let mut session = active_session(1_000, PricingTier::new("t", 100));

        // Nine calls bring the charge to 900.
        for _ in 0..9 {
            let cost = session.pre_call("getBalance").unwrap();
            session.post_call(cost);
        }
        assert_eq!(session.snapshot().amount_charged, 900);

        // The call reaching exactly 1000 succeeds.
        let cost = session.pre_call("getBalance").unwrap();
        session.post_call(cost);
        assert_eq!(session.snapshot().amount_charged, 1_000);

        // The next one would reach 1100 and is rejected, leaving state intact.
        let result = session.pre_call("getBalance");
        assert!(matches!(
            result,
            Err(GatewayError::BudgetExhausted {
                charged: 1_000,
                max_budget: 1_000,
                cost: 100
            })
        ));
        let snap = session.snapshot();
        assert_eq!(snap.amount_charged, 1_000);
        assert_eq!(snap.calls_made, 10);
        // The session itself stays active.
        assert_eq!(snap.status, SessionStatus::Active);
    }

    #[test]
    fn test_method_override_pricing() {
        let tier = PricingTier::new("t", 100).with_override("getProgramAccounts", 500);
        let mut session = active_session(1_000, tier);

        assert_eq!(session.pre_call("getBalance").unwrap(), 100);
        assert_eq!(session.pre_call("getProgramAccounts").unwrap(), 500);
    }

    #[test]
    fn test_call_ceiling() {
        let tier = PricingTier::new("t", 1).with_max_calls(2);
        let mut session = active_session(1_000, tier);

        for _ in 0..2 {
            let cost = session.pre_call("getBalance").unwrap();
            session.post_call(cost);
        }

        let result = session.pre_call("getBalance");
        assert!(matches!(
            result,
            Err(GatewayError::CallLimitExceeded { limit: 2 })
        ));
    }

    #[test]
    fn test_rate_limit_window() {
        let tier = PricingTier::new("t", 1).with_rate_limit(RateLimit::new(2, 60_000));
        let mut session = active_session(1_000, tier);

        for _ in 0..2 {
            let cost = session.pre_call("getBalance").unwrap();
            session.post_call(cost);
        }

        let result = session.pre_call("getBalance");
        assert!(matches!(
            result,
            Err(GatewayError::RateLimitExceeded {
                max_calls: 2,
                window_ms: 60_000
            })
        ));
    }

    #[test]
    fn test_rate_limit_is_not_session_fatal() {
        let tier = PricingTier::new("t", 1).with_rate_limit(RateLimit::new(1, 60_000));
        let mut session = active_session(1_000, tier);

        let cost = session.pre_call("getBalance").unwrap();
        session.post_call(cost);
        assert!(session.pre_call("getBalance").is_err());

        // Still active: the violation was terminal for that call only.
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn test_lazy_expiry() {
        let mut session = test_session(1_000, 1, PricingTier::new("t", 100));
        session.activate().unwrap();

        std::thread::sleep(std::time::Duration::from_secs(2));

        // Status still reads active until the next call discovers expiry.
        assert_eq!(session.status(), SessionStatus::Active);

        let result = session.pre_call("getBalance");
        assert!(matches!(result, Err(GatewayError::SessionExpired { .. })));
        assert_eq!(session.status(), SessionStatus::Expired);

        // Permanently unusable with the same error kind.
        assert!(matches!(
            session.pre_call("getBalance"),
            Err(GatewayError::SessionExpired { .. })
        ));
        assert!(matches!(
            session.activate(),
            Err(GatewayError::Session { .. })
        ));
    }

    #[test]
    fn test_paused_session_expires_past_ttl() {
        let mut session = test_session(1_000, 1, PricingTier::new("t", 100));
        session.activate().unwrap();
        session.pause().unwrap();

        std::thread::sleep(std::time::Duration::from_secs(2));

        // A stale paused session expires on the next call attempt instead
        // of holding its slot forever behind a generic pause error.
        let result = session.pre_call("getBalance");
        assert!(matches!(result, Err(GatewayError::SessionExpired { .. })));
        assert_eq!(session.status(), SessionStatus::Expired);
        assert!(matches!(
            session.activate(),
            Err(GatewayError::Session { .. })
        ));
    }

    #[test]
    fn test_settle_once() {
        let mut session = active_session(1_000, PricingTier::new("t", 100));
        let cost = session.pre_call("getBalance").unwrap();
        session.post_call(cost);

        let usage = session.settle().unwrap();
        assert_eq!(usage.amount_charged, 100);
        assert_eq!(usage.call_count, 1);
        assert_eq!(session.status(), SessionStatus::Settled);

        // Second settle is an error; so is any further call.
        assert!(session.settle().is_err());
        assert!(matches!(
            session.pre_call("getBalance"),
            Err(GatewayError::Session { .. })
        ));
    }

    #[test]
    fn test_sequence_numbers_monotonic() {
        let mut session = active_session(1_000, PricingTier::new("t", 100));
        let a = session.next_sequence();
        let b = session.next_sequence();
        let c = session.next_sequence();
        assert!(a < b && b < c);
        assert_eq!(a, 1);
    }

    #[test]
    fn test_budget_warning_emitted_once() {
        let events = Arc::new(EventBus::new());
        let warnings = Arc::new(AtomicUsize::new(0));
        let w = warnings.clone();
        events.on(EventKind::BudgetWarning, move |_| {
            w.fetch_add(1, Ordering::SeqCst);
        });

        let intent = PaymentIntent::new(
            AgentId::new("buyer"),
            AgentId::new("seller"),
            "t",
            1_000,
            600,
        );
        let mut session = AgentSession::new(
            intent,
            PricingTier::new("t", 100),
            AgentId::new("seller"),
            events,
        );
        session.activate().unwrap();

        for _ in 0..10 {
            let cost = session.pre_call("getBalance").unwrap();
            session.post_call(cost);
        }

        // Crossed 90% once at call nine; warned exactly once.
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_reflects_committed_state() {
        let mut session = active_session(1_000, PricingTier::new("t", 100));

        let cost = session.pre_call("getBalance").unwrap();
        // Before post_call commits, the snapshot is unchanged.
        assert_eq!(session.snapshot().amount_charged, 0);
        session.post_call(cost);

        let snap = session.snapshot();
        assert_eq!(snap.amount_charged, 100);
        assert_eq!(snap.calls_made, 1);
        assert_eq!(snap.tier_id, "t");
    }
}
