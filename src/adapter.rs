//! Agent adapter seam — the capability set the relay core needs from the
//! UI-automation layer that actually drives each chat agent.
//!
//! The core never touches a browser, a DOM selector, or a clipboard. It only
//! asks an adapter to deliver a message and to report the current text of the
//! agent's latest reply. Everything selector-shaped lives behind this trait.

use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;

/// Outbound delivery to an agent failed.
///
/// Causes are opaque to the relay core; every variant is handled the same
/// way (abort the current round, continue with the next).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The agent's input surface is not accepting messages.
    #[error("agent input is not available")]
    InputUnavailable,

    /// The adapter attempted delivery and it was rejected.
    #[error("message delivery failed: {0}")]
    DeliveryFailed(String),
}

/// A transient failure reading the agent's latest output.
///
/// Typically a readiness race in the underlying UI layer. The completion
/// detector treats a failed read as "no change" and keeps polling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("adapter read failed: {0}")]
pub struct ReadError(pub String);

/// Capability set one chat agent exposes to the relay core.
///
/// Each adapter instance is exclusively owned by one side of the relay and
/// carries its own ongoing conversation on the remote side. There is no
/// "done generating" signal — `latest_output` returns a snapshot of the most
/// recent reply as currently rendered, and the completion detector infers
/// completion from that snapshot stream.
#[async_trait]
pub trait AgentAdapter: Send {
    /// Short identifier for logs ("gpt", "claude", ...).
    fn name(&self) -> &str;

    /// Deliver a message into the agent's input surface.
    async fn send(&mut self, text: &str) -> Result<(), SendError>;

    /// Current best-known text of the agent's most recent reply.
    /// Empty string when the agent has not produced anything yet.
    async fn latest_output(&mut self) -> Result<String, ReadError>;

    /// Whether the input surface is currently accepting messages.
    async fn input_available(&mut self) -> bool;
}

/// Deterministic in-process adapter that replays canned replies,
/// revealing each one incrementally across `latest_output` calls.
///
/// Stands in for the real UI-automation adapters in the dry-run binary and
/// in tests: the incremental reveal exercises the stabilization heuristic
/// exactly the way a streaming reply in a browser does.
pub struct ScriptedAdapter {
    name: String,
    replies: Vec<String>,
    served: usize,
    current: Vec<char>,
    revealed: usize,
    reveal_chunk: usize,
    sends: Vec<String>,
    send_attempts: usize,
    fail_sends: VecDeque<usize>,
    pending_read_errors: u32,
    input_available: bool,
}

impl ScriptedAdapter {
    /// Create an adapter that cycles through `replies`, one per `send`.
    pub fn new(name: &str, replies: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            replies,
            served: 0,
            current: Vec::new(),
            revealed: 0,
            reveal_chunk: 40,
            sends: Vec::new(),
            send_attempts: 0,
            fail_sends: VecDeque::new(),
            pending_read_errors: 0,
            input_available: true,
        }
    }

    /// Characters revealed per `latest_output` call (default 40).
    pub fn with_reveal_chunk(mut self, chunk: usize) -> Self {
        self.reveal_chunk = chunk.max(1);
        self
    }

    /// Make the n-th `send` (0-based, counted across the adapter's lifetime)
    /// fail with a scripted delivery error.
    pub fn fail_send_at(mut self, nth: usize) -> Self {
        self.fail_sends.push_back(nth);
        self
    }

    /// Make the next `count` calls to `latest_output` fail transiently.
    pub fn with_read_errors(mut self, count: u32) -> Self {
        self.pending_read_errors = count;
        self
    }

    /// Mark the input surface unavailable.
    pub fn unavailable(mut self) -> Self {
        self.input_available = false;
        self
    }

    /// Messages delivered to this adapter so far, in order.
    pub fn sent_messages(&self) -> &[String] {
        &self.sends
    }
}

#[async_trait]
impl AgentAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, text: &str) -> Result<(), SendError> {
        let nth = self.send_attempts;
        self.send_attempts += 1;
        if self.fail_sends.front() == Some(&nth) {
            self.fail_sends.pop_front();
            return Err(SendError::DeliveryFailed("scripted send failure".to_string()));
        }

        self.sends.push(text.to_string());
        let reply = if self.replies.is_empty() {
            String::new()
        } else {
            self.replies[self.served % self.replies.len()].clone()
        };
        self.served += 1;
        self.current = reply.chars().collect();
        self.revealed = 0;
        Ok(())
    }

    async fn latest_output(&mut self) -> Result<String, ReadError> {
        if self.pending_read_errors > 0 {
            self.pending_read_errors -= 1;
            return Err(ReadError("scripted transient read failure".to_string()));
        }
        self.revealed = (self.revealed + self.reveal_chunk).min(self.current.len());
        Ok(self.current[..self.revealed].iter().collect())
    }

    async fn input_available(&mut self) -> bool {
        self.input_available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(len: usize) -> String {
        "x".repeat(len)
    }

    #[tokio::test]
    async fn test_scripted_reveal_is_incremental() {
        let mut adapter =
            ScriptedAdapter::new("a", vec![reply(100)]).with_reveal_chunk(30);
        adapter.send("hello").await.unwrap();

        assert_eq!(adapter.latest_output().await.unwrap().len(), 30);
        assert_eq!(adapter.latest_output().await.unwrap().len(), 60);
        assert_eq!(adapter.latest_output().await.unwrap().len(), 90);
        assert_eq!(adapter.latest_output().await.unwrap().len(), 100);
        // Fully revealed — stays stable from here on.
        assert_eq!(adapter.latest_output().await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_output_empty_before_any_send() {
        let mut adapter = ScriptedAdapter::new("a", vec![reply(10)]);
        assert_eq!(adapter.latest_output().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_replies_cycle_per_send() {
        let mut adapter =
            ScriptedAdapter::new("a", vec!["first".into(), "second".into()]).with_reveal_chunk(100);
        adapter.send("1").await.unwrap();
        assert_eq!(adapter.latest_output().await.unwrap(), "first");
        adapter.send("2").await.unwrap();
        assert_eq!(adapter.latest_output().await.unwrap(), "second");
        adapter.send("3").await.unwrap();
        assert_eq!(adapter.latest_output().await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_scripted_send_failure() {
        let mut adapter = ScriptedAdapter::new("a", vec![reply(10)]).fail_send_at(1);
        adapter.send("ok").await.unwrap();
        let err = adapter.send("boom").await.unwrap_err();
        assert!(matches!(err, SendError::DeliveryFailed(_)));
        // Failure is consumed; the next send goes through.
        adapter.send("after").await.unwrap();
        assert_eq!(adapter.sent_messages(), &["ok".to_string(), "after".to_string()]);
    }

    #[tokio::test]
    async fn test_transient_read_errors_then_recover() {
        let mut adapter = ScriptedAdapter::new("a", vec![reply(20)])
            .with_reveal_chunk(100)
            .with_read_errors(2);
        adapter.send("go").await.unwrap();
        assert!(adapter.latest_output().await.is_err());
        assert!(adapter.latest_output().await.is_err());
        assert_eq!(adapter.latest_output().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_unavailable_input() {
        let mut adapter = ScriptedAdapter::new("a", vec![]).unavailable();
        assert!(!adapter.input_available().await);
    }

    #[tokio::test]
    async fn test_multibyte_reveal_respects_char_boundaries() {
        let mut adapter =
            ScriptedAdapter::new("a", vec!["안녕하세요 반갑습니다".to_string()]).with_reveal_chunk(3);
        adapter.send("hi").await.unwrap();
        let first = adapter.latest_output().await.unwrap();
        assert_eq!(first.chars().count(), 3);
        assert_eq!(first, "안녕하");
    }
}
