//! Conversation state: position counters, phase machine, and seed policy.
//!
//! One [`ConversationState`] exists per interactive session (or per
//! completion request) and is mutated only from the documented transition
//! edges. The RNG it owns is the sole source of sampling randomness handed
//! to the engine; in deterministic mode it reseeds to the fixed seed at
//! construction and on every reset, which is what makes independent
//! non-multiturn turns reproducible.

use crate::rng::{SeededRng, FIXED_SEED};

/// Conceptual phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingTurn,
    TurnInProgress,
    Terminated,
}

/// Position counters advanced once per emitted token.
///
/// `abs_pos` counts every token consumed across the whole session;
/// `current_pos` counts within the current turn and resets at each new
/// turn. `prompt_size` is fixed for the duration of one generation call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnCounters {
    pub abs_pos: usize,
    pub current_pos: usize,
    pub prompt_size: usize,
}

impl TurnCounters {
    /// Advance for one emission: absolute position first, then turn-local.
    /// Called exactly once per stream event, before classification.
    pub fn advance(&mut self) {
        self.abs_pos += 1;
        self.current_pos += 1;
    }

    /// Whether the engine is still consuming echoed prompt positions.
    pub fn in_prompt(&self) -> bool {
        self.current_pos < self.prompt_size
    }

    /// Whether the current emission is the turn's first generated token.
    /// (`+ 1` because counters advance before classification.)
    pub fn first_generated(&self) -> bool {
        self.current_pos == self.prompt_size + 1
    }
}

/// Mutable record of a conversation session.
pub struct ConversationState {
    counters: TurnCounters,
    phase: Phase,
    multiturn: bool,
    deterministic: bool,
    rng: SeededRng,
}

impl ConversationState {
    pub fn new(multiturn: bool, deterministic: bool) -> Self {
        let rng = if deterministic {
            SeededRng::new(FIXED_SEED)
        } else {
            SeededRng::from_entropy()
        };
        Self {
            counters: TurnCounters::default(),
            phase: Phase::AwaitingTurn,
            multiturn,
            deterministic,
            rng,
        }
    }

    /// `AwaitingTurn → TurnInProgress`: a new prompt arrived.
    pub fn begin_turn(&mut self, prompt_size: usize) {
        debug_assert_eq!(self.phase, Phase::AwaitingTurn);
        self.counters.current_pos = 0;
        self.counters.prompt_size = prompt_size;
        self.phase = Phase::TurnInProgress;
    }

    /// Disjoint borrows of the counters and the RNG for the duration of
    /// one generation call: the engine consumes the RNG while the stream
    /// callback advances the counters.
    pub fn split_for_generation(&mut self) -> (&mut TurnCounters, &mut SeededRng) {
        (&mut self.counters, &mut self.rng)
    }

    /// `TurnInProgress → AwaitingTurn`: the generation call returned.
    ///
    /// When the model signalled end-of-sequence and context does not
    /// persist across turns, the session resets here — and only here.
    pub fn finish_turn(&mut self, saw_eos: bool) {
        debug_assert_eq!(self.phase, Phase::TurnInProgress);
        self.phase = Phase::AwaitingTurn;
        if saw_eos && !self.multiturn {
            self.reset();
        }
    }

    /// Explicit reset: absolute position returns to zero and, in
    /// deterministic mode, the RNG reseeds to its fixed value.
    pub fn reset(&mut self) {
        self.counters.abs_pos = 0;
        if self.deterministic {
            self.rng.reseed(FIXED_SEED);
        }
    }

    /// `→ Terminated`: quit sentinel, input exhaustion, or budget.
    pub fn terminate(&mut self) {
        self.phase = Phase::Terminated;
    }

    /// Whether the session-wide token budget has been reached.
    pub fn budget_exhausted(&self, max_tokens: usize) -> bool {
        self.counters.abs_pos >= max_tokens
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn abs_pos(&self) -> usize {
        self.counters.abs_pos
    }

    pub fn current_pos(&self) -> usize {
        self.counters.current_pos
    }

    pub fn prompt_size(&self) -> usize {
        self.counters.prompt_size
    }

    pub fn multiturn(&self) -> bool {
        self.multiturn
    }
}
