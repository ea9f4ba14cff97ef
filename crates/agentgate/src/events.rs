//! Gateway event bus.
//!
//! Stateful components own a bus by composition rather than inheriting an
//! emitter: the gateway constructs one [`EventBus`] and hands clones of the
//! `Arc` to its sessions. Handlers run synchronously in registration order; a
//! panicking handler is isolated so it can neither abort the emitting
//! operation nor starve later handlers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;

use agentgate_types::{current_timestamp, SessionId, Timestamp};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// The kinds of events the gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// A session was created and activated.
    #[serde(rename = "session:created")]
    SessionCreated,
    /// A session was paused.
    #[serde(rename = "session:paused")]
    SessionPaused,
    /// A session lazily transitioned to expired.
    #[serde(rename = "session:expired")]
    SessionExpired,
    /// A session crossed the budget-warning threshold.
    #[serde(rename = "session:budget-warning")]
    BudgetWarning,
    /// A call passed pre-flight checks and is about to hit the transport.
    #[serde(rename = "call:before")]
    CallBefore,
    /// A call completed and its cost was committed.
    #[serde(rename = "call:after")]
    CallAfter,
    /// The transport failed a call.
    #[serde(rename = "call:error")]
    CallError,
    /// A call's result was attested.
    #[serde(rename = "call:attested")]
    CallAttested,
    /// A session was settled into a receipt.
    #[serde(rename = "payment:settled")]
    PaymentSettled,
    /// An x402 paywall demanded payment.
    #[serde(rename = "x402:payment-required")]
    X402PaymentRequired,
    /// An x402 payment passed verification.
    #[serde(rename = "x402:payment-verified")]
    X402PaymentVerified,
    /// An x402 payment was settled after the response.
    #[serde(rename = "x402:payment-settled")]
    X402PaymentSettled,
    /// The buyer-side client sent a payment.
    #[serde(rename = "x402:payment-sent")]
    X402PaymentSent,
}

impl EventKind {
    /// The event's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCreated => "session:created",
            Self::SessionPaused => "session:paused",
            Self::SessionExpired => "session:expired",
            Self::BudgetWarning => "session:budget-warning",
            Self::CallBefore => "call:before",
            Self::CallAfter => "call:after",
            Self::CallError => "call:error",
            Self::CallAttested => "call:attested",
            Self::PaymentSettled => "payment:settled",
            Self::X402PaymentRequired => "x402:payment-required",
            Self::X402PaymentVerified => "x402:payment-verified",
            Self::X402PaymentSettled => "x402:payment-settled",
            Self::X402PaymentSent => "x402:payment-sent",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Session the event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Emission timestamp (Unix seconds).
    pub timestamp: Timestamp,

    /// Event-specific payload.
    pub data: Value,
}

impl GatewayEvent {
    /// Build an event stamped with the current time.
    pub fn new(kind: EventKind, session_id: Option<SessionId>, data: Value) -> Self {
        Self {
            kind,
            session_id,
            timestamp: current_timestamp(),
            data,
        }
    }
}

type Handler = Box<dyn Fn(&GatewayEvent) + Send + Sync>;

struct Registration {
    /// `None` subscribes to all kinds (the `'*'` subscription).
    filter: Option<EventKind>,
    handler: Handler,
}

/// Synchronous event bus with per-kind and wildcard subscriptions.
#[derive(Default)]
pub struct EventBus {
    registrations: RwLock<Vec<Registration>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        if let Ok(mut regs) = self.registrations.write() {
            regs.push(Registration {
                filter: Some(kind),
                handler: Box::new(handler),
            });
        }
    }

    /// Subscribe to every event kind.
    pub fn on_all<F>(&self, handler: F)
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        if let Ok(mut regs) = self.registrations.write() {
            regs.push(Registration {
                filter: None,
                handler: Box::new(handler),
            });
        }
    }

    /// Emit an event to all matching handlers, in registration order.
    ///
    /// Never fails: a panicking handler is caught and logged, and remaining
    /// handlers still run.
    pub fn emit(&self, event: &GatewayEvent) {
        let Ok(regs) = self.registrations.read() else {
            return;
        };
        for reg in regs.iter() {
            if reg.filter.is_none() || reg.filter == Some(event.kind) {
                let result = catch_unwind(AssertUnwindSafe(|| (reg.handler)(event)));
                if result.is_err() {
                    warn!(kind = %event.kind, "event handler panicked; continuing");
                }
            }
        }
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registrations.read().map(|r| r.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn event(kind: EventKind) -> GatewayEvent {
        GatewayEvent::new(kind, None, Value::Null)
    }

    #[test]
    fn test_specific_subscription() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        bus.on(EventKind::CallAfter, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&event(EventKind::CallAfter));
        bus.emit(&event(EventKind::CallBefore));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wildcard_subscription() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        bus.on_all(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&event(EventKind::CallAfter));
        bus.emit(&event(EventKind::PaymentSettled));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..3 {
            let o = order.clone();
            bus.on_all(move |_| o.lock().unwrap().push(i));
        }

        bus.emit(&event(EventKind::CallAfter));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.on_all(|_| panic!("bad handler"));
        let h = hits.clone();
        bus.on_all(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        // The panic must neither propagate nor stop the second handler.
        bus.emit(&event(EventKind::CallAfter));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_serialization() {
        let e = GatewayEvent::new(
            EventKind::SessionCreated,
            Some(SessionId::new("s-1")),
            serde_json::json!({ "buyer": "b-1" }),
        );
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"type\":\"session:created\""));
        assert!(json.contains("sessionId"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::X402PaymentSent.to_string(), "x402:payment-sent");
    }
}
