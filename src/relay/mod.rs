//! Relay orchestration — bounded multi-round conversation between two agents.
//!
//! # Relay flow
//!
//! ```text
//! prompt ──▶ Agent A
//!              │ detect (stabilization)
//!              ▼
//!         A's reply ──▶ Agent B        ┐
//!                         │ detect     │ × exchange_limit − 1
//!                         ▼            │
//!                    B's reply ──▶ A   ┘
//!              │
//!              ▼ terminal exchange: A's final reply, nothing forwarded
//!         transcript sink (iff ≥ 1 full A↔B pair)
//! ```
//!
//! Failures (send errors, empty detections) abort the round they occur in;
//! the relay always proceeds to the next round. Stop requests are honored
//! cooperatively at round and exchange boundaries.

pub mod orchestrator;
pub mod state;
pub mod transcript;

pub use orchestrator::{RelayHandle, RelayOrchestrator};
pub use state::{Exchange, RelayState, RelaySummary, Round, RoundOutcome, Speaker};
pub use transcript::{
    FileSink, MemorySink, RoundTranscript, TranscriptEntry, TranscriptError, TranscriptSink,
};
