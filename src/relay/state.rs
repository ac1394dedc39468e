//! Relay state — rounds, exchanges, outcomes, and run-wide counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detector::CancelFlag;

/// Which agent produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The agent that receives each round's initial prompt.
    AgentA,
    /// The agent the responses are relayed to.
    AgentB,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AgentA => write!(f, "agent_a"),
            Self::AgentB => write!(f, "agent_b"),
        }
    }
}

/// One A→B→A sub-turn within a round.
///
/// The terminal exchange of a round carries only Agent A's response: the
/// round ends on that reply and nothing further is forwarded to Agent B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// 0-based position within the round.
    pub index: u32,
    /// Agent A's response for this exchange, once obtained.
    pub agent_a_response: Option<String>,
    /// Agent B's response, absent on the terminal exchange.
    pub agent_b_response: Option<String>,
}

impl Exchange {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            agent_a_response: None,
            agent_b_response: None,
        }
    }

    /// Whether both sides of the exchange were captured.
    pub fn is_full_pair(&self) -> bool {
        self.agent_a_response.is_some() && self.agent_b_response.is_some()
    }

    /// Whether the exchange is complete, given whether it is the round's
    /// terminal exchange.
    pub fn is_complete(&self, terminal: bool) -> bool {
        if terminal {
            self.agent_a_response.is_some()
        } else {
            self.is_full_pair()
        }
    }
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// Every accepted response stabilized cleanly.
    Completed,
    /// The round ran to its terminal exchange but at least one response was
    /// accepted as a timed-out partial.
    PartiallyFailed,
    /// A send failed or a detection came back empty; the round was cut
    /// short and the relay moved on.
    Aborted,
}

impl RoundOutcome {
    /// Whether the round counts toward the success tally.
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Aborted)
    }
}

impl std::fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::PartiallyFailed => write!(f, "partially_failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One full relay cycle seeded by a single initial prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// 0-based position in the prompt sequence.
    pub index: usize,
    /// The initial prompt that seeded this round.
    pub prompt: String,
    /// Exchanges in strictly increasing index order.
    pub exchanges: Vec<Exchange>,
    /// How the round ended.
    pub outcome: RoundOutcome,
    /// Why the round aborted, when it did.
    pub abort_reason: Option<String>,
    /// When the round began.
    pub started_at: DateTime<Utc>,
}

impl Round {
    pub fn new(index: usize, prompt: &str) -> Self {
        Self {
            index,
            prompt: prompt.to_string(),
            exchanges: Vec::new(),
            outcome: RoundOutcome::Completed,
            abort_reason: None,
            started_at: Utc::now(),
        }
    }

    /// Mark the round aborted with a reason. The exchanges captured so far
    /// are kept — a partially captured round may still be persisted.
    pub fn abort(&mut self, reason: &str) {
        self.outcome = RoundOutcome::Aborted;
        self.abort_reason = Some(reason.to_string());
    }

    /// Number of exchanges where both responses were captured.
    pub fn full_pairs(&self) -> usize {
        self.exchanges.iter().filter(|e| e.is_full_pair()).count()
    }

    /// Ordered (speaker, text) pairs for the transcript sink.
    pub fn utterances(&self) -> Vec<(Speaker, String)> {
        let mut out = Vec::new();
        for exchange in &self.exchanges {
            if let Some(text) = &exchange.agent_a_response {
                out.push((Speaker::AgentA, text.clone()));
            }
            if let Some(text) = &exchange.agent_b_response {
                out.push((Speaker::AgentB, text.clone()));
            }
        }
        out
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "round {} [{}] {} exchanges, {} full pairs",
            self.index + 1,
            self.outcome,
            self.exchanges.len(),
            self.full_pairs()
        )
    }
}

/// Run-wide state owned by the orchestrator.
///
/// Single-writer: only the orchestrator's own turn-taking logic mutates the
/// counters. The cancel flag is the one externally reachable piece, flipped
/// through [`RelayHandle`](crate::relay::orchestrator::RelayHandle).
#[derive(Debug, Clone, Default)]
pub struct RelayState {
    /// Index of the round currently in flight.
    pub current_round_index: usize,
    /// Rounds that ended in anything other than `Aborted`.
    pub successful_rounds: u32,
    /// Cooperative stop flag, honored at round and exchange boundaries.
    pub cancel: CancelFlag,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the relay should keep going.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Aggregate result of a relay run — the only failure signal surfaced to
/// the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySummary {
    /// Rounds attempted (may be fewer than the prompt count when stopped).
    pub total_rounds: usize,
    /// Rounds that were not aborted.
    pub successful_rounds: u32,
    /// Rounds cut short by a send failure or empty detection.
    pub aborted_rounds: u32,
    /// Whether a stop request ended the run before the prompt list did.
    pub stopped_early: bool,
    /// Per-round records, in order.
    pub rounds: Vec<Round>,
}

impl RelaySummary {
    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        let status = if self.stopped_early { "STOPPED" } else { "DONE" };
        format!(
            "[{}] {}/{} rounds successful, {} aborted",
            status, self.successful_rounds, self.total_rounds, self.aborted_rounds
        )
    }
}
