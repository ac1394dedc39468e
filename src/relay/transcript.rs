//! Transcript sinks — durable storage for a round's ordered utterances.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{Round, Speaker};

/// Failure writing a round transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One utterance in a round, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// A completed round's prompt plus its ordered utterances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTranscript {
    /// 0-based round index.
    pub round_index: usize,
    /// The prompt that seeded the round.
    pub prompt: String,
    /// Utterances in strict (speaker, turn) order.
    pub entries: Vec<TranscriptEntry>,
}

impl RoundTranscript {
    /// Build a transcript from a round record.
    pub fn from_round(round: &Round) -> Self {
        Self {
            round_index: round.index,
            prompt: round.prompt.clone(),
            entries: round
                .utterances()
                .into_iter()
                .map(|(speaker, text)| TranscriptEntry { speaker, text })
                .collect(),
        }
    }
}

/// Receives each persisted round. Implementations decide format and
/// location; the orchestrator only guarantees ordering.
#[async_trait]
pub trait TranscriptSink: Send {
    async fn emit(&mut self, transcript: &RoundTranscript) -> Result<(), TranscriptError>;
}

/// In-memory sink, mostly for tests and the dry-run binary.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rounds: Vec<RoundTranscript>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptSink for MemorySink {
    async fn emit(&mut self, transcript: &RoundTranscript) -> Result<(), TranscriptError> {
        self.rounds.push(transcript.clone());
        Ok(())
    }
}

/// Writes one plain-text file per round: `conversation_prompt_{n}.txt`
/// under the configured directory, prompt header first, then each
/// utterance as a `speaker:` block.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn render(transcript: &RoundTranscript) -> String {
        let mut out = String::new();
        out.push_str(&format!("Prompt: {}\n", transcript.prompt));
        out.push_str(&"=".repeat(60));
        out.push_str("\n\n");
        for entry in &transcript.entries {
            out.push_str(&format!("{}:\n{}\n\n", entry.speaker, entry.text));
            out.push_str(&"-".repeat(40));
            out.push_str("\n\n");
        }
        out
    }
}

#[async_trait]
impl TranscriptSink for FileSink {
    async fn emit(&mut self, transcript: &RoundTranscript) -> Result<(), TranscriptError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("conversation_prompt_{}.txt", transcript.round_index + 1));
        std::fs::write(&path, Self::render(transcript))?;
        tracing::info!("round {} transcript written to {}", transcript.round_index + 1, path.display());
        Ok(())
    }
}
