//! The consumed RPC transport contract.
//!
//! The gateway never performs network I/O itself; it delegates every metered
//! call to an injected [`RpcTransport`]. The wire format, retries, and
//! timeouts are all the transport's concern — its errors reach gateway
//! callers unmodified.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors an RPC transport can raise.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network-level failure (connection, DNS, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The RPC endpoint returned a protocol-level error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the endpoint
        message: String,
    },

    /// The transport's own deadline elapsed.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// The elapsed deadline in milliseconds
        timeout_ms: u64,
    },
}

/// An asynchronous JSON-RPC transport.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Execute one RPC call and return its raw result value.
    async fn request(&self, method: &str, params: &[Value]) -> Result<Value, TransportError>;
}
