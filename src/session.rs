//! Interactive multi-turn session driver.
//!
//! A [`Session`] ties the prompt formatter, conversation state, and stream
//! controller together around an engine: read a line, frame it, hand it to
//! the engine, render the streamed reply, repeat. The loop ends on the quit
//! sentinel, input exhaustion, or the session-wide token budget — all of
//! which are success paths, not errors.

use std::io::BufRead;
use std::time::Instant;

use uuid::Uuid;

use crate::config::ChatConfig;
use crate::engine::{accept_all, Engine, GenerationRequest, StreamEvent};
use crate::error::Result;
use crate::prompt::PromptFormatter;
use crate::state::ConversationState;
use crate::stream::{StreamController, StreamMode, StreamSink};
use crate::tokenizer::{special_tokens, Tokenizer};

/// Literal quit forms accepted from the input source.
pub const QUIT_SENTINELS: [&str; 2] = ["%q", "%Q"];

/// Why the session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The input source yielded a quit sentinel.
    Quit,
    /// The input source ran out of lines.
    InputExhausted,
    /// The absolute position reached the token budget.
    BudgetExhausted,
}

/// Per-turn throughput summary, reported at verbosity >= 2.
#[derive(Debug, Clone)]
pub struct TurnStats {
    /// Tokens consumed this turn (prompt + generated).
    pub turn_tokens: usize,
    /// Tokens consumed across the session, before any reset.
    pub total_tokens: usize,
    /// Turn tokens divided by wall-clock seconds.
    pub tokens_per_sec: f64,
}

/// An interactive inference session.
pub struct Session<E, T> {
    engine: E,
    tokenizer: T,
    config: ChatConfig,
    formatter: PromptFormatter,
    state: ConversationState,
    id: Uuid,
}

impl<E, T> Session<E, T>
where
    E: Engine,
    T: Tokenizer,
{
    pub fn new(engine: E, tokenizer: T, config: ChatConfig) -> Result<Self> {
        config.validate()?;
        let formatter = PromptFormatter::new(engine.is_instruction_tuned());
        let state = ConversationState::new(config.multiturn, config.deterministic);
        Ok(Session {
            engine,
            tokenizer,
            config,
            formatter,
            state,
            id: Uuid::new_v4(),
        })
    }

    /// Run turns from `input` until a terminal condition.
    ///
    /// A new turn never starts once the budget is met; turn-level
    /// encode/decode failures are reported through the sink and the
    /// session continues with the next line.
    pub fn run<R, S>(&mut self, input: R, sink: &mut S) -> Result<SessionEnd>
    where
        R: BufRead,
        S: StreamSink,
    {
        tracing::info!(
            session = %self.id,
            multiturn = self.config.multiturn,
            max_tokens = self.config.max_tokens,
            "session started"
        );

        let mut lines = input.lines();
        loop {
            if self.state.budget_exhausted(self.config.max_tokens) {
                sink.notice(&format!(
                    "max_tokens ({}) exceeded. Use a larger value if desired \
                     using the --max-tokens command line flag.",
                    self.config.max_tokens
                ));
                self.state.terminate();
                tracing::info!(session = %self.id, "token budget exhausted");
                return Ok(SessionEnd::BudgetExhausted);
            }

            if self.config.verbosity >= 1 {
                sink.awaiting_input();
            }

            let line = match lines.next() {
                None => {
                    self.state.terminate();
                    tracing::info!(session = %self.id, "input exhausted");
                    return Ok(SessionEnd::InputExhausted);
                }
                Some(line) => line?,
            };

            if QUIT_SENTINELS.contains(&line.as_str()) {
                self.state.terminate();
                tracing::info!(session = %self.id, "quit sentinel");
                return Ok(SessionEnd::Quit);
            }

            match self.run_turn(&line, sink) {
                Ok(stats) => {
                    tracing::debug!(
                        session = %self.id,
                        turn_tokens = stats.turn_tokens,
                        total_tokens = stats.total_tokens,
                        "turn complete"
                    );
                    if self.config.verbosity >= 2 {
                        sink.stats(&stats);
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, error = %e, "turn aborted");
                    sink.error(&e.to_string());
                }
            }
            sink.turn_finished();
        }
    }

    /// One prompt → one generation call.
    fn run_turn(&mut self, line: &str, sink: &mut dyn StreamSink) -> Result<TurnStats> {
        let prompt_tokens = self
            .formatter
            .encode(line, self.state.abs_pos(), &self.tokenizer)?;

        self.state.begin_turn(prompt_tokens.len());
        sink.turn_starts();

        let request = GenerationRequest {
            prompt_tokens,
            start_pos: self.state.abs_pos(),
            max_tokens: self.config.max_tokens,
            accept: accept_all(),
        };

        let mut controller = StreamController::new(
            StreamMode::Interactive,
            sink,
            self.config.verbosity,
            special_tokens::EOS_ID,
        );

        let started = Instant::now();
        let generate_result = {
            let tokenizer = &self.tokenizer;
            let (counters, rng) = self.state.split_for_generation();
            let mut on_token = |event: StreamEvent| {
                controller.on_token(event, &mut *counters, tokenizer)
            };
            self.engine.generate(request, rng, &mut on_token)
        };
        let elapsed = started.elapsed();

        let outcome = match (generate_result, controller.finish()) {
            (Err(e), _) | (Ok(()), Err(e)) => {
                // The turn is over either way; the state machine moves on
                // without applying the end-of-sequence reset.
                self.state.finish_turn(false);
                return Err(e);
            }
            (Ok(()), Ok(outcome)) => outcome,
        };

        // Snapshot before finish_turn: a non-multiturn reset zeroes abs_pos.
        let secs = elapsed.as_secs_f64();
        let stats = TurnStats {
            turn_tokens: self.state.current_pos(),
            total_tokens: self.state.abs_pos(),
            tokens_per_sec: if secs > 0.0 {
                self.state.current_pos() as f64 / secs
            } else {
                0.0
            },
        };

        self.state.finish_turn(outcome.saw_eos);
        Ok(stats)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}
