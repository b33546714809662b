//! One-shot completion built from the session primitives.
//!
//! Single prompt in, single completion string out. Uses a fresh
//! [`ConversationState`] per request with context persistence off and the
//! stream controller in Collect mode: nothing is rendered incrementally,
//! and the generated token ids are decoded together once the engine
//! returns. Prompt-position tokens are never accumulated, so the decoded
//! text contains generated content only.

use crate::config::ChatConfig;
use crate::engine::{accept_all, Engine, GenerationRequest, StreamEvent};
use crate::error::Result;
use crate::prompt::PromptFormatter;
use crate::state::ConversationState;
use crate::stream::{NullSink, StreamController, StreamMode};
use crate::tokenizer::{special_tokens, Tokenizer};

/// Run one non-interactive completion.
///
/// The deterministic flag in `config` is honored; `multiturn` is ignored
/// (a completion is always a single independent turn starting at position
/// zero).
pub fn complete<E, T>(
    engine: &mut E,
    tokenizer: &T,
    config: &ChatConfig,
    prompt_text: &str,
) -> Result<String>
where
    E: Engine,
    T: Tokenizer,
{
    config.validate()?;

    let formatter = PromptFormatter::new(engine.is_instruction_tuned());
    let mut state = ConversationState::new(false, config.deterministic);

    let prompt_tokens = formatter.encode(prompt_text, 0, tokenizer)?;
    state.begin_turn(prompt_tokens.len());

    let request = GenerationRequest {
        prompt_tokens,
        start_pos: 0,
        max_tokens: config.max_tokens,
        accept: accept_all(),
    };

    let mut sink = NullSink;
    let mut controller = StreamController::new(
        StreamMode::Collect,
        &mut sink,
        config.verbosity,
        special_tokens::EOS_ID,
    );

    let generate_result = {
        let (counters, rng) = state.split_for_generation();
        let mut on_token =
            |event: StreamEvent| controller.on_token(event, &mut *counters, tokenizer);
        engine.generate(request, rng, &mut on_token)
    };

    let outcome = match (generate_result, controller.finish()) {
        (Err(e), _) | (Ok(()), Err(e)) => {
            state.finish_turn(false);
            return Err(e);
        }
        (Ok(()), Ok(outcome)) => outcome,
    };
    state.finish_turn(outcome.saw_eos);

    let text = tokenizer.decode(&outcome.tokens)?;
    Ok(text.trim_start_matches([' ', '\t', '\n']).to_string())
}
