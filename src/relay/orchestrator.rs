//! Relay orchestrator — drives the multi-round A↔B conversation loop.
//!
//! Owns the round/exchange counters, converts each agent's reply into the
//! other agent's next message, and contains every failure to the round it
//! occurred in. Single pipeline: one round in flight, one pending operation
//! per agent, Agent A's turn fully completes (including detection) before
//! Agent B's begins.

use tracing::{info, warn};

use crate::adapter::{AgentAdapter, SendError};
use crate::config::RelayConfig;
use crate::detector::{CancelFlag, CompletionDetector, DetectionResult};

use super::state::{Exchange, RelayState, RelaySummary, Round, RoundOutcome};
use super::transcript::{RoundTranscript, TranscriptSink};

/// Externally held stop control for a running relay.
///
/// Stopping is cooperative: the flag is honored at the next round or
/// exchange boundary, and the detector's poll loop checks it each
/// iteration. An in-flight sample is never preempted.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    cancel: CancelFlag,
}

impl RelayHandle {
    /// Request a clean early stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Wrap a received reply for hand-off to the other agent.
///
/// The fixed framing gives the receiving agent enough context to respond
/// coherently without re-sending the whole prior transcript each turn.
fn wrap_reply(text: &str) -> String {
    format!("The other participant replied:\n{text}\n\nWhat are your thoughts?")
}

/// The message to deliver for a hand-off. Only the very first hand-off of
/// the relay's first round goes out verbatim.
fn outbound_message(text: &str, first_handoff: bool) -> String {
    if first_handoff {
        text.to_string()
    } else {
        wrap_reply(text)
    }
}

/// Check the input surface, then deliver. Unavailability and rejection are
/// both send failures as far as the round is concerned.
async fn deliver(agent: &mut dyn AgentAdapter, text: &str) -> Result<(), SendError> {
    if !agent.input_available().await {
        return Err(SendError::InputUnavailable);
    }
    agent.send(text).await
}

/// Drives the full relay: for each prompt, alternate between the two
/// agents for a bounded number of exchanges, persist the round transcript,
/// and move on regardless of how the round ended.
pub struct RelayOrchestrator {
    config: RelayConfig,
    detector: CompletionDetector,
    state: RelayState,
}

impl RelayOrchestrator {
    pub fn new(config: RelayConfig) -> Self {
        let detector = CompletionDetector::new(config.detector_config());
        Self {
            config,
            detector,
            state: RelayState::new(),
        }
    }

    /// Stop control usable from another task.
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            cancel: self.state.cancel.clone(),
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run the relay over `prompts`, one round per prompt.
    ///
    /// Failures are round-local: a failed send or an empty detection aborts
    /// the current round and the relay proceeds to the next. A round is
    /// persisted to `sink` iff it captured at least one full A↔B pair.
    pub async fn run(
        &mut self,
        prompts: &[String],
        agent_a: &mut dyn AgentAdapter,
        agent_b: &mut dyn AgentAdapter,
        sink: &mut dyn TranscriptSink,
    ) -> RelaySummary {
        // Fresh counters and a lowered stop flag per run: the relay is
        // running again, and an orchestrator that was stopped last time
        // stays usable. Handles created earlier share the same flag.
        self.state.current_round_index = 0;
        self.state.successful_rounds = 0;
        self.state.cancel.clear();

        info!(
            "relay starting: {} rounds, {} exchanges each",
            prompts.len(),
            self.config.exchange_limit
        );

        let mut rounds: Vec<Round> = Vec::new();
        let mut stopped_early = false;

        for (index, prompt) in prompts.iter().enumerate() {
            if !self.state.is_running() {
                stopped_early = true;
                break;
            }
            self.state.current_round_index = index;

            let round = self.run_round(index, prompt, agent_a, agent_b).await;
            if round.outcome.is_success() {
                self.state.successful_rounds += 1;
            }
            info!("{}", round.status_line());

            if round.full_pairs() >= 1 {
                let transcript = RoundTranscript::from_round(&round);
                if let Err(err) = sink.emit(&transcript).await {
                    warn!("round {}: transcript not persisted: {}", index + 1, err);
                }
            } else {
                info!("round {}: no full pair captured, nothing persisted", index + 1);
            }
            rounds.push(round);

            if !self.state.is_running() {
                stopped_early = true;
                break;
            }
            if index + 1 < prompts.len() {
                tokio::time::sleep(self.config.inter_round_delay()).await;
            }
        }

        let aborted_rounds = rounds
            .iter()
            .filter(|r| r.outcome == RoundOutcome::Aborted)
            .count() as u32;
        let summary = RelaySummary {
            total_rounds: rounds.len(),
            successful_rounds: self.state.successful_rounds,
            aborted_rounds,
            stopped_early,
            rounds,
        };
        info!("{}", summary.summary_line());
        summary
    }

    /// One round: prompt to Agent A, then up to `exchange_limit` exchanges.
    /// The terminal exchange ends on Agent A's reply; nothing further is
    /// forwarded to Agent B.
    async fn run_round(
        &self,
        index: usize,
        prompt: &str,
        agent_a: &mut dyn AgentAdapter,
        agent_b: &mut dyn AgentAdapter,
    ) -> Round {
        let cancel = &self.state.cancel;
        let mut round = Round::new(index, prompt);
        info!("round {}: sending prompt to {}", index + 1, agent_a.name());

        if let Err(err) = deliver(agent_a, prompt).await {
            warn!("round {}: prompt delivery failed: {}", index + 1, err);
            round.abort(&format!("prompt delivery to {} failed: {err}", agent_a.name()));
            return round;
        }
        tokio::time::sleep(self.config.after_send_delay()).await;

        let mut degraded = false;
        for exchange_index in 0..self.config.exchange_limit {
            if cancel.is_cancelled() {
                round.abort("stop requested");
                return round;
            }
            let mut exchange = Exchange::new(exchange_index);

            // Agent A's reply for this exchange.
            let a_text = match self.detector.detect(agent_a, cancel).await {
                DetectionResult::Stable(text) => text,
                DetectionResult::TimedOut(text) => {
                    degraded = true;
                    text
                }
                DetectionResult::Empty => {
                    if cancel.is_cancelled() {
                        round.abort("stop requested");
                    } else {
                        round.abort(&format!("{} produced no usable reply", agent_a.name()));
                    }
                    return round;
                }
            };
            exchange.agent_a_response = Some(a_text.clone());

            let terminal = exchange_index + 1 == self.config.exchange_limit;
            if terminal {
                // The round ends on Agent A's reply.
                round.exchanges.push(exchange);
                break;
            }

            tokio::time::sleep(self.config.between_exchange_delay()).await;

            // Forward to Agent B. Only the relay's very first hand-off goes
            // out unwrapped.
            let first_handoff = index == 0 && exchange_index == 0;
            if let Err(err) = deliver(agent_b, &outbound_message(&a_text, first_handoff)).await {
                warn!("round {}: delivery to {} failed: {}", index + 1, agent_b.name(), err);
                round.exchanges.push(exchange);
                round.abort(&format!("delivery to {} failed: {err}", agent_b.name()));
                return round;
            }
            tokio::time::sleep(self.config.after_send_delay()).await;

            // Agent B's reply.
            let b_text = match self.detector.detect(agent_b, cancel).await {
                DetectionResult::Stable(text) => text,
                DetectionResult::TimedOut(text) => {
                    degraded = true;
                    text
                }
                DetectionResult::Empty => {
                    round.exchanges.push(exchange);
                    if cancel.is_cancelled() {
                        round.abort("stop requested");
                    } else {
                        round.abort(&format!("{} produced no usable reply", agent_b.name()));
                    }
                    return round;
                }
            };
            exchange.agent_b_response = Some(b_text.clone());
            round.exchanges.push(exchange);

            tokio::time::sleep(self.config.between_exchange_delay()).await;

            // Hand Agent B's reply back to Agent A for the next exchange.
            if let Err(err) = deliver(agent_a, &wrap_reply(&b_text)).await {
                warn!("round {}: delivery back to {} failed: {}", index + 1, agent_a.name(), err);
                round.abort(&format!("delivery to {} failed: {err}", agent_a.name()));
                return round;
            }
            tokio::time::sleep(self.config.after_send_delay()).await;
        }

        round.outcome = if degraded {
            RoundOutcome::PartiallyFailed
        } else {
            RoundOutcome::Completed
        };
        round
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ScriptedAdapter;
    use crate::relay::transcript::MemorySink;

    /// Millisecond-scale tunables so tests finish quickly. Zero-second
    /// politeness delays; the detector still polls for real.
    fn fast_config(exchange_limit: u32) -> RelayConfig {
        RelayConfig {
            exchange_limit,
            poll_interval_secs: 0,
            stability_threshold: 3,
            min_response_length: 5,
            max_wait_secs: 1,
            inter_round_delay_secs: 0,
            after_send_delay_secs: 0,
            between_exchange_delay_secs: 0,
        }
    }

    fn agent(name: &str, replies: &[&str]) -> ScriptedAdapter {
        ScriptedAdapter::new(
            name,
            replies.iter().map(|r| r.to_string()).collect(),
        )
        .with_reveal_chunk(1000)
    }

    #[tokio::test]
    async fn test_single_round_single_exchange() {
        // exchange_limit 1: Agent A's first reply is the whole round.
        let mut a = agent("a", &["a reply one"]);
        let mut b = agent("b", &["b reply one"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(1));
        let summary = orch
            .run(&["prompt".to_string()], &mut a, &mut b, &mut sink)
            .await;

        assert_eq!(summary.total_rounds, 1);
        assert_eq!(summary.successful_rounds, 1);
        assert_eq!(summary.rounds[0].outcome, RoundOutcome::Completed);
        // Terminal exchange has only A's reply, so no full pair and no
        // persisted transcript.
        assert_eq!(summary.rounds[0].full_pairs(), 0);
        assert!(sink.rounds.is_empty());
        // Agent B never heard anything.
        assert!(b.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_first_handoff_unwrapped_rest_wrapped() {
        let mut a = agent("a", &["alpha reply", "alpha again"]);
        let mut b = agent("b", &["bravo reply"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(2));
        orch.run(&["prompt".to_string()], &mut a, &mut b, &mut sink)
            .await;

        // B's first inbound message is the raw reply; A's follow-up is
        // wrapped with the hand-off framing.
        assert_eq!(b.sent_messages(), &["alpha reply".to_string()]);
        assert_eq!(a.sent_messages().len(), 2);
        assert_eq!(a.sent_messages()[0], "prompt");
        assert_eq!(a.sent_messages()[1], wrap_reply("bravo reply"));
    }

    #[tokio::test]
    async fn test_wrapping_applies_from_second_round() {
        let mut a = agent("a", &["alpha reply", "alpha two", "alpha three", "alpha four"]);
        let mut b = agent("b", &["bravo reply", "bravo two"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(2));
        orch.run(
            &["first".to_string(), "second".to_string()],
            &mut a,
            &mut b,
            &mut sink,
        )
        .await;

        // Round 1 hand-off to B is raw, round 2's is wrapped.
        assert_eq!(b.sent_messages()[0], "alpha reply");
        assert_eq!(b.sent_messages()[1], wrap_reply("alpha three"));
    }

    #[tokio::test]
    async fn test_prompt_send_failure_aborts_round_without_transcript() {
        let mut a = agent("a", &["alpha reply"]).fail_send_at(0);
        let mut b = agent("b", &["bravo reply"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(2));
        let summary = orch
            .run(&["prompt".to_string()], &mut a, &mut b, &mut sink)
            .await;

        assert_eq!(summary.successful_rounds, 0);
        assert_eq!(summary.aborted_rounds, 1);
        assert_eq!(summary.rounds[0].outcome, RoundOutcome::Aborted);
        assert!(summary.rounds[0].exchanges.is_empty());
        assert!(sink.rounds.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_input_is_a_send_failure() {
        let mut a = agent("a", &["alpha reply"]).unavailable();
        let mut b = agent("b", &["bravo reply"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(2));
        let summary = orch
            .run(&["prompt".to_string()], &mut a, &mut b, &mut sink)
            .await;

        assert_eq!(summary.rounds[0].outcome, RoundOutcome::Aborted);
        assert!(summary.rounds[0]
            .abort_reason
            .as_deref()
            .unwrap()
            .contains("not available"));
    }

    #[tokio::test]
    async fn test_empty_detection_aborts_round() {
        // Agent A replies with something too short to ever count.
        let mut a = agent("a", &["hm"]);
        let mut b = agent("b", &["bravo reply"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(2));
        let summary = orch
            .run(&["prompt".to_string()], &mut a, &mut b, &mut sink)
            .await;

        assert_eq!(summary.rounds[0].outcome, RoundOutcome::Aborted);
        assert!(summary.rounds[0]
            .abort_reason
            .as_deref()
            .unwrap()
            .contains("no usable reply"));
        assert!(sink.rounds.is_empty());
    }

    #[tokio::test]
    async fn test_stopped_orchestrator_runs_again() {
        // A stop request from an earlier lifetime must not brick the
        // orchestrator: run() lowers the flag when it starts.
        let mut a = agent("a", &["alpha reply"]);
        let mut b = agent("b", &["bravo reply"]);
        let mut sink = MemorySink::new();

        let mut orch = RelayOrchestrator::new(fast_config(1));
        orch.handle().stop();

        let summary = orch
            .run(&["p1".to_string()], &mut a, &mut b, &mut sink)
            .await;
        assert!(!summary.stopped_early);
        assert_eq!(summary.total_rounds, 1);
        assert_eq!(summary.successful_rounds, 1);

        // And the handle still works for the run it was stopped during.
        let handle = orch.handle();
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_outbound_message_policy() {
        assert_eq!(outbound_message("hello", true), "hello");
        let wrapped = outbound_message("hello", false);
        assert!(wrapped.contains("The other participant replied:"));
        assert!(wrapped.contains("hello"));
        assert!(wrapped.ends_with("What are your thoughts?"));
    }
}
