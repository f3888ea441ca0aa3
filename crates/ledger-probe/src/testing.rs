//! Scripted transport for deterministic testing.

use crate::client::{ProbeTransport, RawResponse, TransportError};
use crate::models::Method;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Transport that replays pre-scripted outcomes in order.
///
/// Once the script runs out every call fails with
/// [`TransportError::Connect`], which makes an empty mock behave like an
/// unreachable service.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    responses: Vec<Result<RawResponse, TransportError>>,
    current: usize,
    requests: Vec<SentRequest>,
}

/// Record of a request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl MockTransport {
    /// Creates a mock with scripted outcomes.
    pub fn new(responses: Vec<Result<RawResponse, TransportError>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responses,
                current: 0,
                requests: Vec::new(),
            })),
        }
    }

    /// Creates a mock where every call fails to connect.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Appends an outcome to the script.
    pub fn push(&self, response: Result<RawResponse, TransportError>) {
        self.lock().responses.push(response);
    }

    /// Returns the number of times `send` was called.
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns all received requests.
    pub fn requests(&self) -> Vec<SentRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProbeTransport for MockTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        let mut state = self.lock();
        state.requests.push(SentRequest {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let outcome = state.responses.get(state.current).cloned().unwrap_or_else(|| {
            Err(TransportError::Connect(format!(
                "{method} {path}: mock transport has no scripted response"
            )))
        });
        state.current += 1;
        outcome
    }
}
