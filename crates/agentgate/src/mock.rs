//! Mock RPC transport for testing.
//!
//! Maintains scripted responses in memory without any network calls, making
//! it suitable for unit and integration tests. Recorded calls let tests
//! assert on what reached the transport.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::transport::{RpcTransport, TransportError};

type Scripted = Result<Value, TransportError>;

/// Mock transport with scripted responses and failure injection.
pub struct MockTransport {
    /// Scripted responses consumed front to back.
    scripted: Mutex<VecDeque<Scripted>>,
    /// Returned once the script is exhausted.
    default_response: Value,
    /// Simulated per-call latency.
    latency: Option<Duration>,
    /// Every `(method, params)` pair that reached the transport.
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockTransport {
    /// Create a transport answering every call with a default result.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default_response: json!({ "ok": true }),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls that reached the transport.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Snapshot of recorded calls.
    pub fn recorded_calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn request(&self, method: &str, params: &[Value]) -> Result<Value, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((method.to_string(), params.to_vec()));
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.scripted.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(result) => result,
            None => Ok(self.default_response.clone()),
        }
    }
}

/// Builder for mock transports with specific behavior.
pub struct MockTransportBuilder {
    mock: MockTransport,
}

impl MockTransportBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            mock: MockTransport::new(),
        }
    }

    /// Queue one successful response.
    pub fn response(self, value: Value) -> Self {
        if let Ok(mut s) = self.mock.scripted.lock() {
            s.push_back(Ok(value));
        }
        self
    }

    /// Queue one failure.
    pub fn failure(self, error: TransportError) -> Self {
        if let Ok(mut s) = self.mock.scripted.lock() {
            s.push_back(Err(error));
        }
        self
    }

    /// Set the response returned once the script is exhausted.
    pub fn default_response(mut self, value: Value) -> Self {
        self.mock.default_response = value;
        self
    }

    /// Simulate per-call latency.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.mock.latency = Some(latency);
        self
    }

    /// Build the mock transport.
    pub fn build(self) -> MockTransport {
        self.mock
    }
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_response() {
        let mock = MockTransport::new();
        let result = mock.request("getHealth", &[]).await.unwrap();
        assert_eq!(result, json!({ "ok": true }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let mock = MockTransportBuilder::new()
            .response(json!(1))
            .failure(TransportError::Network("boom".to_string()))
            .response(json!(2))
            .build();

        assert_eq!(mock.request("a", &[]).await.unwrap(), json!(1));
        assert!(matches!(
            mock.request("b", &[]).await,
            Err(TransportError::Network(_))
        ));
        assert_eq!(mock.request("c", &[]).await.unwrap(), json!(2));

        // Script exhausted: back to the default.
        assert_eq!(mock.request("d", &[]).await.unwrap(), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_records_calls() {
        let mock = MockTransport::new();
        mock.request("getBalance", &[json!("some-pubkey")])
            .await
            .unwrap();

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "getBalance");
        assert_eq!(calls[0].1, vec![json!("some-pubkey")]);
    }

    #[tokio::test]
    async fn test_simulated_latency() {
        let mock = MockTransportBuilder::new()
            .latency(Duration::from_millis(20))
            .build();

        let start = std::time::Instant::now();
        mock.request("getHealth", &[]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
