//! Reference engines for the demo CLI and the test suite.
//!
//! Neither runs a real model. [`DemoEngine`] babbles deterministically from
//! the prompt's own vocabulary using the caller-supplied RNG, which makes it
//! useful for exercising the determinism guarantees end to end.
//! [`ScriptedEngine`] replays fixed token sequences and records every
//! request it receives.

use std::collections::VecDeque;

use crate::engine::{Engine, GenerationRequest, StreamEvent, TokenId};
use crate::error::Result;
use crate::rng::SeededRng;
use crate::tokenizer::special_tokens;

use super::PoolHint;

/// Emit one event, honoring the session token budget.
///
/// Returns `false` when the stream should stop (budget reached or the
/// callback asked to).
fn emit(
    event: StreamEvent,
    emitted: &mut usize,
    budget: usize,
    on_token: &mut dyn FnMut(StreamEvent) -> bool,
) -> bool {
    if *emitted >= budget {
        return false;
    }
    *emitted += 1;
    on_token(event)
}

/// Deterministic babble engine for the CLI demo.
///
/// Echoes the prompt positions, then "generates" a short reply by sampling
/// tokens out of the prompt itself, then emits end-of-sequence. All
/// randomness comes from the RNG the session owns, so a fixed seed yields a
/// fixed reply.
pub struct DemoEngine {
    instruction_tuned: bool,
    min_reply: usize,
    max_reply: usize,
    _pool: PoolHint,
}

impl DemoEngine {
    pub fn new(instruction_tuned: bool, pool: PoolHint) -> Self {
        Self {
            instruction_tuned,
            min_reply: 4,
            max_reply: 16,
            _pool: pool,
        }
    }

    /// Override the reply-length bounds (both inclusive).
    pub fn with_reply_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_reply = min;
        self.max_reply = max.max(min);
        self
    }
}

impl Engine for DemoEngine {
    fn is_instruction_tuned(&self) -> bool {
        self.instruction_tuned
    }

    fn generate(
        &mut self,
        request: GenerationRequest,
        rng: &mut SeededRng,
        on_token: &mut dyn FnMut(StreamEvent) -> bool,
    ) -> Result<()> {
        let budget = request.max_tokens.saturating_sub(request.start_pos);
        let mut emitted = 0usize;

        for &token_id in &request.prompt_tokens {
            let event = StreamEvent {
                token_id,
                score: 0.0,
            };
            if !emit(event, &mut emitted, budget, on_token) {
                return Ok(());
            }
        }

        // Babble vocabulary: the prompt's non-control tokens.
        let source: Vec<TokenId> = request
            .prompt_tokens
            .iter()
            .copied()
            .filter(|&t| t > special_tokens::BOS_ID)
            .collect();

        if !source.is_empty() {
            let span = self.max_reply - self.min_reply + 1;
            let reply_len = self.min_reply + rng.next_index(span);
            for _ in 0..reply_len {
                let token_id = source[rng.next_index(source.len())];
                if !(request.accept)(token_id) {
                    continue;
                }
                let event = StreamEvent {
                    token_id,
                    score: rng.next_f32(),
                };
                if !emit(event, &mut emitted, budget, on_token) {
                    return Ok(());
                }
            }
        }

        let eos = StreamEvent {
            token_id: special_tokens::EOS_ID,
            score: 0.0,
        };
        emit(eos, &mut emitted, budget, on_token);
        Ok(())
    }
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt_tokens: Vec<TokenId>,
    pub start_pos: usize,
    pub max_tokens: usize,
}

/// Replay engine for tests: pops one scripted reply per call and records
/// the requests it was given. Calls past the end of the script reply with
/// an immediate end-of-sequence.
pub struct ScriptedEngine {
    instruction_tuned: bool,
    replies: VecDeque<Vec<TokenId>>,
    pub calls: Vec<RecordedCall>,
}

impl ScriptedEngine {
    pub fn new(instruction_tuned: bool, replies: Vec<Vec<TokenId>>) -> Self {
        Self {
            instruction_tuned,
            replies: replies.into(),
            calls: Vec::new(),
        }
    }
}

impl Engine for ScriptedEngine {
    fn is_instruction_tuned(&self) -> bool {
        self.instruction_tuned
    }

    fn generate(
        &mut self,
        request: GenerationRequest,
        _rng: &mut SeededRng,
        on_token: &mut dyn FnMut(StreamEvent) -> bool,
    ) -> Result<()> {
        self.calls.push(RecordedCall {
            prompt_tokens: request.prompt_tokens.clone(),
            start_pos: request.start_pos,
            max_tokens: request.max_tokens,
        });

        let budget = request.max_tokens.saturating_sub(request.start_pos);
        let mut emitted = 0usize;

        for &token_id in &request.prompt_tokens {
            let event = StreamEvent {
                token_id,
                score: 0.0,
            };
            if !emit(event, &mut emitted, budget, on_token) {
                return Ok(());
            }
        }

        for token_id in self.replies.pop_front().unwrap_or_default() {
            if !(request.accept)(token_id) {
                continue;
            }
            let event = StreamEvent {
                token_id,
                score: 1.0,
            };
            if !emit(event, &mut emitted, budget, on_token) {
                return Ok(());
            }
        }

        let eos = StreamEvent {
            token_id: special_tokens::EOS_ID,
            score: 0.0,
        };
        emit(eos, &mut emitted, budget, on_token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::accept_all;
    use crate::rng::{SeededRng, FIXED_SEED};

    fn collect_stream(engine: &mut dyn Engine, prompt: Vec<TokenId>, max_tokens: usize) -> Vec<TokenId> {
        let mut rng = SeededRng::new(FIXED_SEED);
        let mut seen = Vec::new();
        let request = GenerationRequest {
            prompt_tokens: prompt,
            start_pos: 0,
            max_tokens,
            accept: accept_all(),
        };
        engine
            .generate(request, &mut rng, &mut |event| {
                seen.push(event.token_id);
                true
            })
            .unwrap();
        seen
    }

    #[test]
    fn demo_engine_echoes_prompt_then_babbles() {
        let mut engine = DemoEngine::new(true, PoolHint::new(1));
        let seen = collect_stream(&mut engine, vec![10, 11, 12], 128);

        assert_eq!(&seen[..3], &[10, 11, 12]);
        assert_eq!(*seen.last().unwrap(), special_tokens::EOS_ID);
        // Generated tokens come from the prompt vocabulary.
        assert!(seen[3..seen.len() - 1].iter().all(|t| [10, 11, 12].contains(t)));
    }

    #[test]
    fn demo_engine_is_deterministic_for_a_seed() {
        let mut a = DemoEngine::new(true, PoolHint::new(1));
        let mut b = DemoEngine::new(true, PoolHint::new(1));
        assert_eq!(
            collect_stream(&mut a, vec![10, 11, 12], 128),
            collect_stream(&mut b, vec![10, 11, 12], 128)
        );
    }

    #[test]
    fn demo_engine_respects_budget() {
        let mut engine = DemoEngine::new(true, PoolHint::new(1));
        let seen = collect_stream(&mut engine, vec![10, 11, 12, 13], 2);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn scripted_engine_replays_and_records() {
        let mut engine = ScriptedEngine::new(true, vec![vec![20, 21], vec![22]]);

        let first = collect_stream(&mut engine, vec![10], 128);
        assert_eq!(first, vec![10, 20, 21, special_tokens::EOS_ID]);

        let second = collect_stream(&mut engine, vec![11], 128);
        assert_eq!(second, vec![11, 22, special_tokens::EOS_ID]);

        // Script exhausted: prompt echo then immediate end-of-sequence.
        let third = collect_stream(&mut engine, vec![12], 128);
        assert_eq!(third, vec![12, special_tokens::EOS_ID]);

        assert_eq!(engine.calls.len(), 3);
        assert_eq!(engine.calls[0].prompt_tokens, vec![10]);
    }

    #[test]
    fn scripted_engine_applies_accept_predicate() {
        let mut engine = ScriptedEngine::new(true, vec![vec![20, 21, 22]]);
        let mut rng = SeededRng::new(FIXED_SEED);
        let mut seen = Vec::new();
        let request = GenerationRequest {
            prompt_tokens: vec![10],
            start_pos: 0,
            max_tokens: 128,
            accept: Box::new(|t| t != 21),
        };
        engine
            .generate(request, &mut rng, &mut |event| {
                seen.push(event.token_id);
                true
            })
            .unwrap();
        assert_eq!(seen, vec![10, 20, 22, special_tokens::EOS_ID]);
    }
}
