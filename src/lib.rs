//! chat-relay — turn-based relay between two UI-driven chat agents.
//!
//! Automates a conversation between two independent chat agents that are
//! reachable only through a human-facing interface: each accepts a text
//! message and produces a reply that appears incrementally, with no
//! end-of-generation signal. The crate coordinates the relay anyway:
//!
//! - [`detector`] infers reply completion by polling an agent's rendered
//!   output until it stops changing (stabilization heuristic).
//! - [`relay`] drives bounded rounds of exchanges between the two agents,
//!   containing every failure to the round it occurred in.
//! - [`adapter`] is the seam behind which all real UI automation lives;
//!   the core only needs send / latest-output / input-available.
//! - [`prompts`] supplies the ordered initial prompts, [`config`] the
//!   timing tunables.
//!
//! ```text
//! PromptSet → RelayOrchestrator → { AgentAdapter A, AgentAdapter B }
//!                   │                      via CompletionDetector
//!                   ▼
//!            TranscriptSink (one record per persisted round)
//! ```

pub mod adapter;
pub mod config;
pub mod detector;
pub mod prompts;
pub mod relay;

pub use adapter::{AgentAdapter, ReadError, ScriptedAdapter, SendError};
pub use config::{ConfigError, RelayConfig};
pub use detector::{
    CancelFlag, CompletionDetector, DetectionResult, DetectorConfig, Snapshot, StabilityTracker,
};
pub use prompts::{PromptError, PromptSet};
pub use relay::{
    Exchange, FileSink, MemorySink, RelayHandle, RelayOrchestrator, RelayState, RelaySummary,
    Round, RoundOutcome, RoundTranscript, Speaker, TranscriptEntry, TranscriptError,
    TranscriptSink,
};
