//! Round source — the ordered prompt list that seeds each relay round.
//!
//! Stored as a JSON array of strings. A missing file is seeded with a small
//! default set so a fresh checkout produces a runnable relay.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure loading or saving the prompt file.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt file access failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt file is not a JSON list of strings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("prompt file contains no prompts")]
    Empty,
}

/// Ordered, finite sequence of initial prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptSet {
    prompts: Vec<String>,
}

impl PromptSet {
    pub fn new(prompts: Vec<String>) -> Self {
        Self { prompts }
    }

    /// Conversation starters used when no prompt file exists yet.
    pub fn default_prompts() -> Self {
        Self::new(vec![
            "Hello! What is your name, and how are you feeling today?".to_string(),
            "What is your favorite color? Tell me why you chose it.".to_string(),
            "If you could be any animal for a day, what would you be?".to_string(),
        ])
    }

    /// Load prompts from a JSON file. Errors if the list is empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let contents = std::fs::read_to_string(path)?;
        let set: Self = serde_json::from_str(&contents)?;
        if set.prompts.is_empty() {
            return Err(PromptError::Empty);
        }
        Ok(set)
    }

    /// Load prompts, seeding the file with the defaults when it is missing.
    pub fn load_or_seed(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        if !path.exists() {
            let set = Self::default_prompts();
            set.save(path)?;
            tracing::info!("seeded default prompts at {}", path.display());
            return Ok(set);
        }
        Self::load(path)
    }

    /// Write the prompt list back out as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PromptError> {
        let rendered = serde_json::to_string_pretty(&self.prompts)?;
        std::fs::write(path, rendered)?;
        Ok(())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
