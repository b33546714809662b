//! Prompt formatting with Gemma control markup.
//!
//! Instruction-tuned models expect each user message wrapped in turn
//! markers, with an extra end-of-turn boundary when continuing a dialogue.
//! Pre-trained models take the raw text. The beginning-of-sequence token is
//! inserted exactly once per session, on the first turn.

use crate::engine::TokenId;
use crate::error::Result;
use crate::tokenizer::{special_tokens, Tokenizer};

/// Builds the text and token sequence handed to the engine each turn.
#[derive(Debug, Clone, Copy)]
pub struct PromptFormatter {
    instruction_tuned: bool,
}

impl PromptFormatter {
    pub fn new(instruction_tuned: bool) -> Self {
        Self { instruction_tuned }
    }

    /// Wrap `raw` with turn markup.
    ///
    /// `abs_pos > 0` marks a multi-turn continuation, which gets an
    /// end-of-turn boundary prepended so the model sees where the previous
    /// exchange ended. Deterministic, no side effects.
    pub fn format(&self, raw: &str, abs_pos: usize) -> String {
        if !self.instruction_tuned {
            return raw.to_string();
        }

        let mut text = format!(
            "{sot}user\n{raw}{eot}\n{sot}model\n",
            sot = special_tokens::START_OF_TURN,
            eot = special_tokens::END_OF_TURN,
        );
        if abs_pos > 0 {
            text = format!("{}\n{text}", special_tokens::END_OF_TURN);
        }
        text
    }

    /// Format and tokenize one turn's prompt.
    ///
    /// On the session's first turn (`abs_pos == 0`) a single
    /// beginning-of-sequence token is inserted at the front.
    pub fn encode(
        &self,
        raw: &str,
        abs_pos: usize,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Vec<TokenId>> {
        let formatted = self.format(raw, abs_pos);
        let mut tokens = tokenizer.encode(&formatted)?;
        if abs_pos == 0 {
            tokens.insert(0, special_tokens::BOS_ID);
        }
        Ok(tokens)
    }
}
