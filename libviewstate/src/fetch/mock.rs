//! Scripted transport for testing
//!
//! Answers requests from a script keyed by operation name, records every
//! request it sees, and can simulate latency. Compiled into every build so
//! integration tests and downstream crates can drive the pipeline without a
//! server.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use super::transport::Transport;
use super::{GraphQLRequest, GraphQLResponse};
use crate::error::FetchError;

#[derive(Debug, Clone)]
enum Scripted {
    Respond(GraphQLResponse),
    Fail(FetchError),
}

/// Transport that plays back scripted outcomes.
///
/// Each operation has a queue of outcomes. Outcomes are consumed in order,
/// and the last one keeps answering once the queue is down to it.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    delay: Duration,
    requests: Arc<Mutex<Vec<GraphQLRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that waits `delay` before every answer
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Answer `operation` with `data`.
    pub fn respond_data(&self, operation: &str, data: Value) -> &Self {
        self.push(operation, Scripted::Respond(GraphQLResponse::data(data)))
    }

    /// Answer `operation` with structured GraphQL errors.
    pub fn respond_errors(&self, operation: &str, messages: &[&str]) -> &Self {
        self.push(
            operation,
            Scripted::Respond(GraphQLResponse::errors(messages.iter().copied())),
        )
    }

    /// Fail `operation` at the transport level.
    pub fn fail(&self, operation: &str, error: FetchError) -> &Self {
        self.push(operation, Scripted::Fail(error))
    }

    fn push(&self, operation: &str, outcome: Scripted) -> &Self {
        lock(&self.script)
            .entry(operation.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    fn next_outcome(&self, operation: &str) -> Option<Scripted> {
        let mut script = lock(&self.script);
        let queue = script.get_mut(operation)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    /// Number of requests received
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of requests received for one operation
    pub fn call_count_for(&self, operation: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.operation_name.as_deref() == Some(operation))
            .count()
    }

    /// All requests received, oldest first
    pub fn requests(&self) -> Vec<GraphQLRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: GraphQLRequest) -> Result<GraphQLResponse, FetchError> {
        let operation = request
            .operation_name
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());
        lock(&self.requests).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_outcome(&operation) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(FetchError::Transport(format!(
                "no scripted response for operation {}",
                operation
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(operation: &str) -> GraphQLRequest {
        GraphQLRequest::new(&format!("query {} {{ x }}", operation), json!({}))
    }

    #[tokio::test]
    async fn test_scripted_data() {
        let transport = ScriptedTransport::new();
        transport.respond_data("Viewer", json!({"x": 1}));

        let response = transport.send(request("Viewer")).await.unwrap();
        assert_eq!(response.data, Some(json!({"x": 1})));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.call_count_for("Viewer"), 1);
    }

    #[tokio::test]
    async fn test_outcomes_consumed_in_order_last_repeats() {
        let transport = ScriptedTransport::new();
        transport
            .fail("Viewer", FetchError::Transport("down".to_string()))
            .respond_data("Viewer", json!({"x": 2}));

        assert!(transport.send(request("Viewer")).await.is_err());
        assert!(transport.send(request("Viewer")).await.is_ok());
        assert!(transport.send(request("Viewer")).await.is_ok());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_operation_is_transport_error() {
        let transport = ScriptedTransport::new();
        let err = transport.send(request("Missing")).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(ref m) if m.contains("Missing")));
    }

    #[tokio::test]
    async fn test_errors_response() {
        let transport = ScriptedTransport::new();
        transport.respond_errors("Viewer", &["not authorized", "also bad"]);

        let response = transport.send(request("Viewer")).await.unwrap();
        assert_eq!(response.errors.unwrap()[0].message, "not authorized");
    }

    #[tokio::test]
    async fn test_delay() {
        let transport = ScriptedTransport::with_delay(Duration::from_millis(30));
        transport.respond_data("Viewer", json!({}));

        let start = std::time::Instant::now();
        transport.send(request("Viewer")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let transport = ScriptedTransport::new();
        transport.respond_data("A", json!({}));
        transport.send(request("A")).await.unwrap();
        transport.send(request("B")).await.unwrap_err();

        let names: Vec<_> = transport
            .requests()
            .into_iter()
            .filter_map(|r| r.operation_name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
