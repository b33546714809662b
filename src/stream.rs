//! Token-stream classification and rendering.
//!
//! The engine pushes one [`StreamEvent`] per consumed position into
//! [`StreamController::on_token`], which decides whether the token is
//! prompt echo, end-of-sequence, or generated content — and either renders
//! it incrementally (Interactive) or buffers the raw id for a single
//! batched decode (Collect). Rendering goes through the [`StreamSink`]
//! trait so the controller runs against a console, a recorder in tests, or
//! nothing at all.

use std::io::Write;

use crate::engine::{StreamEvent, TokenId};
use crate::error::{GemmaError, Result};
use crate::session::TurnStats;
use crate::state::TurnCounters;
use crate::tokenizer::Tokenizer;

/// How generated tokens leave the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Decode each token as it arrives and emit it through the sink.
    Interactive,
    /// Accumulate raw token ids for one batched decode after the call.
    Collect,
}

/// Rendering callbacks for session output.
///
/// All methods have default no-op implementations so sinks can be
/// selective. The controller and session gate calls by verbosity; sinks
/// just render.
pub trait StreamSink {
    /// A piece of generated text, emitted incrementally.
    fn text(&mut self, _piece: &str) {}

    /// One tick per echoed prompt position.
    fn prompt_progress(&mut self) {}

    /// The first generated token of a turn is about to be emitted.
    fn response_begins(&mut self) {}

    /// The model signalled end-of-sequence (high verbosity only).
    fn turn_ended(&mut self) {}

    /// The session is ready for the next line of input.
    fn awaiting_input(&mut self) {}

    /// A turn's prompt is being consumed by the engine.
    fn turn_starts(&mut self) {}

    /// A turn completed, successfully or not.
    fn turn_finished(&mut self) {}

    /// Per-turn throughput report (high verbosity only).
    fn stats(&mut self, _stats: &TurnStats) {}

    /// Informational message on a success path (e.g. budget exhaustion).
    fn notice(&mut self, _message: &str) {}

    /// A turn-level failure that did not end the session.
    fn error(&mut self, _message: &str) {}
}

/// Sink that discards everything. Collect-mode callers use this when no
/// incremental output is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StreamSink for NullSink {}

/// Console sink: generated text to stdout, indicators to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl StreamSink for ConsoleSink {
    fn text(&mut self, piece: &str) {
        print!("{piece}");
        let _ = std::io::stdout().flush();
    }

    fn prompt_progress(&mut self) {
        eprint!(".");
        let _ = std::io::stderr().flush();
    }

    fn response_begins(&mut self) {
        println!();
        println!();
    }

    fn turn_ended(&mut self) {
        println!();
        println!("[ End ]");
    }

    fn awaiting_input(&mut self) {
        print!("> ");
        let _ = std::io::stdout().flush();
    }

    fn turn_starts(&mut self) {
        eprint!("\n[ Reading prompt ] ");
        let _ = std::io::stderr().flush();
    }

    fn turn_finished(&mut self) {
        println!();
        println!();
    }

    fn stats(&mut self, stats: &TurnStats) {
        println!(
            "{} tokens ({} total tokens)",
            stats.turn_tokens, stats.total_tokens
        );
        println!("{:.1} tokens / sec", stats.tokens_per_sec);
    }

    fn notice(&mut self, message: &str) {
        println!("{message}");
    }

    fn error(&mut self, message: &str) {
        eprintln!("Error: {message}");
    }
}

/// Recording sink for tests: captures everything it is shown.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub pieces: Vec<String>,
    pub progress_ticks: usize,
    pub responses_begun: usize,
    pub turns_ended: usize,
    pub inputs_awaited: usize,
    pub turns_started: usize,
    pub turns_finished: usize,
    pub stats: Vec<TurnStats>,
    pub notices: Vec<String>,
    pub errors: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All emitted text joined together.
    pub fn text(&self) -> String {
        self.pieces.concat()
    }
}

impl StreamSink for RecordingSink {
    fn text(&mut self, piece: &str) {
        self.pieces.push(piece.to_string());
    }

    fn prompt_progress(&mut self) {
        self.progress_ticks += 1;
    }

    fn response_begins(&mut self) {
        self.responses_begun += 1;
    }

    fn turn_ended(&mut self) {
        self.turns_ended += 1;
    }

    fn awaiting_input(&mut self) {
        self.inputs_awaited += 1;
    }

    fn turn_starts(&mut self) {
        self.turns_started += 1;
    }

    fn turn_finished(&mut self) {
        self.turns_finished += 1;
    }

    fn stats(&mut self, stats: &TurnStats) {
        self.stats.push(stats.clone());
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

/// What one generation call produced, from the controller's point of view.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Whether the model signalled end-of-sequence during the call.
    pub saw_eos: bool,
    /// Generated token ids accumulated in Collect mode (empty otherwise).
    pub tokens: Vec<TokenId>,
}

/// Classifies each stream event and routes it to the sink or the buffer.
///
/// Lives for exactly one generation call. The counters it advances belong
/// to the session's [`ConversationState`](crate::state::ConversationState);
/// the reset policy is applied by the state machine after the call
/// returns, never from in here.
pub struct StreamController<'a> {
    mode: StreamMode,
    sink: &'a mut dyn StreamSink,
    verbosity: u8,
    eos_id: TokenId,
    collected: Vec<TokenId>,
    saw_eos: bool,
    stop_requested: bool,
    failure: Option<GemmaError>,
}

impl<'a> StreamController<'a> {
    pub fn new(mode: StreamMode, sink: &'a mut dyn StreamSink, verbosity: u8, eos_id: TokenId) -> Self {
        Self {
            mode,
            sink,
            verbosity,
            eos_id,
            collected: Vec::new(),
            saw_eos: false,
            stop_requested: false,
            failure: None,
        }
    }

    /// Ask the engine to stop at the next emission. This is the consumer
    /// early-stop path; normal end-of-sequence keeps returning `true` so
    /// the engine can finish its call cleanly.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Classify one emission. Returns `true` to continue generation.
    pub fn on_token(
        &mut self,
        event: StreamEvent,
        counters: &mut TurnCounters,
        tokenizer: &dyn Tokenizer,
    ) -> bool {
        counters.advance();

        if self.stop_requested {
            return false;
        }

        if counters.in_prompt() {
            if self.mode == StreamMode::Interactive && self.verbosity >= 1 {
                self.sink.prompt_progress();
            }
            return true;
        }

        if event.token_id == self.eos_id {
            self.saw_eos = true;
            if self.mode == StreamMode::Interactive && self.verbosity >= 2 {
                self.sink.turn_ended();
            }
            return true;
        }

        match self.mode {
            StreamMode::Interactive => match tokenizer.decode(&[event.token_id]) {
                Ok(piece) => {
                    if counters.first_generated() {
                        if self.verbosity >= 1 {
                            self.sink.response_begins();
                        }
                        self.sink.text(piece.trim_start_matches([' ', '\t', '\n']));
                    } else {
                        self.sink.text(&piece);
                    }
                    true
                }
                Err(e) => {
                    // Abort the turn, not the process; surfaced by finish().
                    self.failure = Some(e);
                    false
                }
            },
            StreamMode::Collect => {
                // The emission at current_pos == prompt_size is still a
                // prompt position; only tokens beyond the prompt count are
                // generated content, so nothing else reaches the buffer.
                if counters.current_pos > counters.prompt_size {
                    self.collected.push(event.token_id);
                }
                true
            }
        }
    }

    /// Consume the controller once the generation call has returned.
    pub fn finish(self) -> Result<TurnOutcome> {
        if let Some(e) = self.failure {
            return Err(e);
        }
        Ok(TurnOutcome {
            saw_eos: self.saw_eos,
            tokens: self.collected,
        })
    }
}
