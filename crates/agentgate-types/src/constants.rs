//! Protocol constants for the agentgate gateway.

/// Default rate-limit window length in milliseconds.
pub const DEFAULT_RATE_WINDOW_MS: u64 = 1_000;

/// Default ceiling on concurrently open (pending/active/paused) sessions.
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 256;

/// Fraction of the session budget at which a budget warning is emitted.
pub const BUDGET_WARNING_RATIO: f64 = 0.9;

/// Decay factor for the pricing engine's moving latency average.
///
/// Each new observation contributes this fraction; the remainder comes from
/// the previous average.
pub const LATENCY_EWMA_ALPHA: f64 = 0.2;
