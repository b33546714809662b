//! Session configuration surface.
//!
//! The same [`ChatConfig`] drives both the interactive session and the
//! one-shot completion path. Values can come from CLI flags or a JSON file;
//! every field has a serde default so partial files are fine.

use std::path::Path;

use serde::Deserialize;

use crate::engine::PoolHint;
use crate::error::{GemmaError, Result};

/// Configuration for a chat session or completion call.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Session-wide token budget across all turns (prompt + generated).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Whether conversational context persists across turns.
    #[serde(default)]
    pub multiturn: bool,

    /// Whether sampling uses a fixed seed (reproducible runs).
    #[serde(default)]
    pub deterministic: bool,

    /// Output verbosity:
    /// - 0: generated text only
    /// - 1: input prompt, progress ticks, response separation
    /// - 2+: turn-end markers, per-turn token counts and throughput
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Worker threads requested from the engine's pool.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

fn default_max_tokens() -> usize {
    3072
}
fn default_verbosity() -> u8 {
    1
}
fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            max_tokens: default_max_tokens(),
            multiturn: false,
            deterministic: false,
            verbosity: default_verbosity(),
            num_threads: default_num_threads(),
        }
    }
}

impl ChatConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: ChatConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Check required values. Fatal at startup; callers surface the error
    /// together with usage help.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(GemmaError::Config("max_tokens must be positive".into()));
        }
        if self.num_threads == 0 {
            return Err(GemmaError::Config("num_threads must be positive".into()));
        }
        Ok(())
    }

    /// Threading hint handed to the engine at construction.
    pub fn pool_hint(&self) -> PoolHint {
        PoolHint::new(self.num_threads)
    }
}
