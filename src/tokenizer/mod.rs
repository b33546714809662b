//! Tokenizer seam for the session controller.
//!
//! The real text↔token mapping lives in the external engine; this module
//! defines the trait the controller consumes plus the Gemma control-token
//! constants, and ships a word-level reference tokenizer used by the demo
//! engine and the test suite.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::engine::TokenId;
use crate::error::{GemmaError, Result};

/// Special tokens used by Gemma models.
pub mod special_tokens {
    use crate::engine::TokenId;

    pub const BOS: &str = "<bos>";
    pub const EOS: &str = "<eos>";
    pub const START_OF_TURN: &str = "<start_of_turn>";
    pub const END_OF_TURN: &str = "<end_of_turn>";

    /// Beginning-of-sequence token ID.
    pub const BOS_ID: TokenId = 2;

    /// End-of-sequence token ID.
    pub const EOS_ID: TokenId = 1;
}

/// Core tokenizer trait. Implementations can be swapped without changing
/// session code.
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token IDs.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>>;

    /// Decode a sequence of token IDs into text.
    fn decode(&self, tokens: &[TokenId]) -> Result<String>;
}

/// Word-level reference tokenizer.
///
/// - Splits on whitespace, assigning IDs on first sight
/// - Each decoded piece carries a leading space, mirroring the word
///   boundaries a SentencePiece vocabulary produces
/// - Deterministic for a given encode order
///
/// The vocabulary is shared behind an `Arc` so clones observe the same
/// ID assignment; tests rely on this to pre-learn marker IDs.
#[derive(Clone)]
pub struct WordTokenizer {
    state: Arc<RwLock<VocabState>>,
}

#[derive(Debug)]
struct VocabState {
    vocab: HashMap<TokenId, String>,
    reverse_vocab: HashMap<String, TokenId>,
    next_id: TokenId,
}

impl Default for VocabState {
    fn default() -> Self {
        let mut vocab = HashMap::new();
        let mut reverse_vocab = HashMap::new();
        for (id, piece) in [
            (special_tokens::EOS_ID, special_tokens::EOS),
            (special_tokens::BOS_ID, special_tokens::BOS),
        ] {
            vocab.insert(id, piece.to_string());
            reverse_vocab.insert(piece.to_string(), id);
        }
        VocabState {
            vocab,
            reverse_vocab,
            // IDs below this are reserved for control tokens.
            next_id: 3,
        }
    }
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(VocabState::default())),
        }
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut state = self
            .state
            .write()
            .map_err(|_| GemmaError::Encode("tokenizer lock poisoned".to_string()))?;

        let mut ids = Vec::new();
        for word in text.split_whitespace() {
            let id = if let Some(&id) = state.reverse_vocab.get(word) {
                id
            } else {
                let id = state.next_id;
                state.next_id += 1;
                state.vocab.insert(id, word.to_string());
                state.reverse_vocab.insert(word.to_string(), id);
                id
            };
            ids.push(id);
        }
        Ok(ids)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let state = self
            .state
            .read()
            .map_err(|_| GemmaError::Decode("tokenizer lock poisoned".to_string()))?;

        let mut text = String::new();
        for &id in tokens {
            let piece = state
                .vocab
                .get(&id)
                .ok_or_else(|| GemmaError::Decode(format!("unknown token id: {id}")))?;
            text.push(' ');
            text.push_str(piece);
        }
        Ok(text)
    }
}
