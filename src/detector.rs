//! Completion detection — deciding when an agent's streaming reply is done.
//!
//! Neither agent exposes an end-of-generation signal, so completion is
//! inferred from the only observable proxy: the rendered reply text has
//! stopped changing. The detector samples an adapter's latest output on a
//! fixed interval and applies a stabilization rule over the sample stream.
//!
//! # Detection outcomes
//!
//! ```text
//! Sampling ──────────────────────────────┐
//!   │ N consecutive equal samples,       │ max_wait elapsed
//!   │ each ≥ min_length                  │
//!   ▼                                    ▼
//! Stable(text)                 last sample ≥ min_length?
//!                                  ├─ yes → TimedOut(text)
//!                                  └─ no  → Empty
//! ```
//!
//! The stability threshold exists so a brief inter-token pause is not
//! mistaken for completion; the minimum length exists so a placeholder
//! ("thinking…") or an empty pane is not mistaken for a finished short
//! reply. Both misfire modes are accepted trade-offs of the heuristic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::AgentAdapter;

/// Cooperative cancellation flag shared between the orchestrator and any
/// in-flight detection loop. Cancelling never preempts; the loop notices
/// the flag on its next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Lower the flag again, e.g. when a new run starts on the same
    /// orchestrator. Existing clones stay connected.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tunables for one detection call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Samples shorter than this (in characters) never count as a finished
    /// reply and reset the stability run.
    pub min_length: usize,
    /// Consecutive identical samples required to declare stabilization.
    pub stability_threshold: u32,
    /// Delay between samples.
    pub poll_interval: Duration,
    /// Hard ceiling on one detection call.
    pub max_wait: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_length: 50,
            stability_threshold: 3,
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(120),
        }
    }
}

/// One immutable observation of an adapter's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Observed reply text.
    pub text: String,
    /// Wall-clock time of the observation.
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn take(text: String) -> Self {
        Self {
            text,
            taken_at: Utc::now(),
        }
    }

    /// Length in characters, matching how the UI renders progress.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Outcome of one detection call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionResult {
    /// Output stabilized — generation finished with this text.
    Stable(String),
    /// `max_wait` elapsed but a usable partial reply was observed.
    TimedOut(String),
    /// Nothing usable observed within the wait window.
    Empty,
}

impl DetectionResult {
    /// Whether the result carries text the relay can forward.
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// The carried text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Stable(t) | Self::TimedOut(t) => Some(t),
            Self::Empty => None,
        }
    }
}

impl std::fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable(t) => write!(f, "stable ({} chars)", t.chars().count()),
            Self::TimedOut(t) => write!(f, "timed_out ({} chars)", t.chars().count()),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Pure stabilization state machine over a stream of text samples.
///
/// Kept separate from the timed poll loop so the rule itself is testable
/// without any clock: feed samples, get `Some(text)` once the configured
/// run of identical, sufficiently long samples has been observed.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    min_length: usize,
    threshold: u32,
    last: String,
    consecutive: u32,
}

impl StabilityTracker {
    pub fn new(min_length: usize, threshold: u32) -> Self {
        Self {
            min_length,
            // A threshold of zero would declare stability before any sample.
            threshold: threshold.max(1),
            last: String::new(),
            consecutive: 0,
        }
    }

    /// Feed one sample. Returns the stabilized text once the run completes.
    pub fn observe(&mut self, sample: &str) -> Option<String> {
        if sample.chars().count() < self.min_length {
            // Placeholder or still-short output: remember it (it is the
            // best text seen so far) but restart the run.
            self.consecutive = 0;
            self.last = sample.to_string();
            return None;
        }

        if sample == self.last {
            self.consecutive += 1;
        } else {
            self.last = sample.to_string();
            self.consecutive = 1;
        }

        if self.consecutive >= self.threshold {
            Some(self.last.clone())
        } else {
            None
        }
    }

    /// Most recent sample, usable as a degraded result on timeout.
    pub fn last_sample(&self) -> &str {
        &self.last
    }

    /// Current length of the identical-sample run.
    pub fn run_length(&self) -> u32 {
        self.consecutive
    }
}

/// Timed poll loop applying [`StabilityTracker`] to a live adapter.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    config: DetectorConfig,
}

impl CompletionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Poll `adapter.latest_output()` until the reply stabilizes, the wait
    /// budget is exhausted, or `cancel` is raised.
    ///
    /// A failed read is a transient readiness race in the UI layer: it is
    /// logged and skipped, leaving the current stability run intact. It
    /// never terminates detection on its own.
    pub async fn detect(
        &self,
        adapter: &mut dyn AgentAdapter,
        cancel: &CancelFlag,
    ) -> DetectionResult {
        let start = std::time::Instant::now();
        let mut tracker =
            StabilityTracker::new(self.config.min_length, self.config.stability_threshold);

        while start.elapsed() < self.config.max_wait {
            if cancel.is_cancelled() {
                tracing::info!("{}: detection cancelled", adapter.name());
                return DetectionResult::Empty;
            }

            match adapter.latest_output().await {
                Ok(text) => {
                    let snapshot = Snapshot::take(text);
                    tracing::debug!(
                        "{}: sampled {} chars (run {}/{})",
                        adapter.name(),
                        snapshot.char_len(),
                        tracker.run_length(),
                        self.config.stability_threshold
                    );
                    if let Some(stable) = tracker.observe(&snapshot.text) {
                        tracing::info!(
                            "{}: reply stabilized at {} chars",
                            adapter.name(),
                            snapshot.char_len()
                        );
                        return DetectionResult::Stable(stable);
                    }
                }
                Err(err) => {
                    tracing::debug!("{}: sample failed, skipping: {}", adapter.name(), err);
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        let last = tracker.last_sample();
        if last.chars().count() >= self.config.min_length {
            tracing::warn!(
                "{}: wait budget exhausted, using partial reply ({} chars)",
                adapter.name(),
                last.chars().count()
            );
            DetectionResult::TimedOut(last.to_string())
        } else {
            tracing::warn!("{}: no usable reply within wait budget", adapter.name());
            DetectionResult::Empty
        }
    }
}
