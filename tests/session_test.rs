//! Tests for the interactive session loop.

use std::io::Cursor;

use gemma::config::ChatConfig;
use gemma::engine::{ScriptedEngine, TokenId};
use gemma::session::{Session, SessionEnd};
use gemma::stream::RecordingSink;
use gemma::tokenizer::{special_tokens, Tokenizer, WordTokenizer};

fn config(max_tokens: usize, multiturn: bool, verbosity: u8) -> ChatConfig {
    ChatConfig {
        max_tokens,
        multiturn,
        deterministic: false,
        verbosity,
        num_threads: 1,
    }
}

/// Pre-learn reply token ids through a clone sharing the vocabulary.
fn learn(tokenizer: &WordTokenizer, text: &str) -> Vec<TokenId> {
    tokenizer.encode(text).unwrap()
}

#[test]
fn quit_sentinel_after_one_turn() {
    let tokenizer = WordTokenizer::new();
    let reply = learn(&tokenizer, "okay fine");
    let engine = ScriptedEngine::new(true, vec![reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    let end = session
        .run(Cursor::new("hello\n%q\nignored\n"), &mut sink)
        .unwrap();

    assert_eq!(end, SessionEnd::Quit);
    assert_eq!(session.engine().calls.len(), 1);
}

#[test]
fn uppercase_quit_sentinel_also_works() {
    let tokenizer = WordTokenizer::new();
    let engine = ScriptedEngine::new(true, vec![]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    let end = session.run(Cursor::new("%Q\n"), &mut sink).unwrap();

    assert_eq!(end, SessionEnd::Quit);
    assert!(session.engine().calls.is_empty());
}

#[test]
fn input_exhaustion_terminates_normally() {
    let tokenizer = WordTokenizer::new();
    let reply = learn(&tokenizer, "sure");
    let engine = ScriptedEngine::new(true, vec![reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    let end = session.run(Cursor::new("hello\n"), &mut sink).unwrap();

    assert_eq!(end, SessionEnd::InputExhausted);
    assert_eq!(session.engine().calls.len(), 1);
}

#[test]
fn streamed_reply_is_rendered_with_first_token_stripped() {
    let tokenizer = WordTokenizer::new();
    let reply = learn(&tokenizer, "okay fine");
    let engine = ScriptedEngine::new(true, vec![reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    session.run(Cursor::new("hello\n"), &mut sink).unwrap();

    // Prompt: BOS + 3 markup words. The first three echo positions tick;
    // the echo tail is rendered as-is; the first generated token is
    // stripped of its leading space and later ones keep theirs.
    assert_eq!(sink.progress_ticks, 3);
    assert_eq!(
        sink.pieces,
        vec![
            " <start_of_turn>model".to_string(),
            "okay".to_string(),
            " fine".to_string()
        ]
    );
    assert_eq!(sink.responses_begun, 1);
    assert!(sink.text().ends_with("okay fine"));
}

#[test]
fn bos_on_first_turn_only_and_boundary_marker_on_continuation() {
    let tokenizer = WordTokenizer::new();
    let eot_id = learn(&tokenizer, special_tokens::END_OF_TURN)[0];
    let first_reply = learn(&tokenizer, "hi there");
    let second_reply = learn(&tokenizer, "still here");
    let engine = ScriptedEngine::new(true, vec![first_reply.clone(), second_reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    session
        .run(Cursor::new("hello\nagain\n"), &mut sink)
        .unwrap();

    let calls = &session.engine().calls;
    assert_eq!(calls.len(), 2);

    // Turn 1: BOS exactly once, at the front; no boundary marker.
    let bos_count = |tokens: &[TokenId]| {
        tokens
            .iter()
            .filter(|&&t| t == special_tokens::BOS_ID)
            .count()
    };
    assert_eq!(calls[0].prompt_tokens[0], special_tokens::BOS_ID);
    assert_eq!(bos_count(&calls[0].prompt_tokens), 1);
    assert_ne!(calls[0].prompt_tokens[1], eot_id);

    // Turn 2: no BOS, end-of-turn boundary prepended, and the engine
    // resumes from the accumulated absolute position.
    assert_eq!(bos_count(&calls[1].prompt_tokens), 0);
    assert_eq!(calls[1].prompt_tokens[0], eot_id);
    let expected_start = calls[0].prompt_tokens.len() + first_reply.len() + 1;
    assert_eq!(calls[1].start_pos, expected_start);
}

#[test]
fn budget_exhaustion_stops_the_loop_without_a_new_turn() {
    let tokenizer = WordTokenizer::new();
    let reply = learn(&tokenizer, "one two three four five six");
    let engine = ScriptedEngine::new(true, vec![reply]);

    // Prompt (BOS + 3 markup pieces) alone exceeds this budget.
    let mut session = Session::new(engine, tokenizer, config(4, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    let end = session
        .run(Cursor::new("hello\nworld\nmore\n"), &mut sink)
        .unwrap();

    assert_eq!(end, SessionEnd::BudgetExhausted);
    assert_eq!(session.engine().calls.len(), 1);
    assert!(session.state().abs_pos() >= 4);
    assert_eq!(sink.notices.len(), 1);
    assert!(sink.notices[0].contains("max_tokens (4) exceeded"));
}

#[test]
fn turn_stats_reported_at_high_verbosity() {
    let tokenizer = WordTokenizer::new();
    let reply = learn(&tokenizer, "okay fine");
    let engine = ScriptedEngine::new(true, vec![reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 2)).unwrap();
    let mut sink = RecordingSink::new();
    session.run(Cursor::new("hello\n"), &mut sink).unwrap();

    assert_eq!(sink.stats.len(), 1);
    // BOS + 3 markup pieces + 2 reply tokens + end-of-sequence.
    assert_eq!(sink.stats[0].turn_tokens, 7);
    assert_eq!(sink.stats[0].total_tokens, 7);
    assert_eq!(sink.turns_ended, 1);
}

#[test]
fn no_stats_or_input_prompt_at_verbosity_zero() {
    let tokenizer = WordTokenizer::new();
    let reply = learn(&tokenizer, "okay");
    let engine = ScriptedEngine::new(true, vec![reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 0)).unwrap();
    let mut sink = RecordingSink::new();
    session.run(Cursor::new("hello\n"), &mut sink).unwrap();

    assert!(sink.stats.is_empty());
    assert_eq!(sink.inputs_awaited, 0);
    assert_eq!(sink.progress_ticks, 0);
    assert_eq!(sink.responses_begun, 0);
    // Stripping is not verbosity-gated.
    assert_eq!(sink.pieces.last().unwrap(), "okay");
}

#[test]
fn decode_failure_aborts_the_turn_but_not_the_session() {
    let tokenizer = WordTokenizer::new();
    let good_reply = learn(&tokenizer, "recovered");
    // 9999 was never assigned by the tokenizer, so decoding it fails.
    let engine = ScriptedEngine::new(true, vec![vec![9999], good_reply]);

    let mut session = Session::new(engine, tokenizer, config(4096, true, 1)).unwrap();
    let mut sink = RecordingSink::new();
    let end = session
        .run(Cursor::new("first\nsecond\n"), &mut sink)
        .unwrap();

    assert_eq!(end, SessionEnd::InputExhausted);
    assert_eq!(sink.errors.len(), 1);
    assert!(sink.errors[0].contains("decode failed"));
    // The second turn still ran and rendered.
    assert_eq!(session.engine().calls.len(), 2);
    assert!(sink.text().contains("recovered"));
}

#[test]
fn invalid_configuration_is_rejected_at_construction() {
    let tokenizer = WordTokenizer::new();
    let engine = ScriptedEngine::new(true, vec![]);
    let result = Session::new(engine, tokenizer, config(0, false, 1));
    assert!(result.is_err());
}
