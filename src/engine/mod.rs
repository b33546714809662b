//! Generation-engine seam.
//!
//! The numeric model (tensor math, sampling distributions, worker pools) is
//! an external collaborator behind the [`Engine`] trait. The session core
//! only frames requests, owns the RNG, and classifies the resulting token
//! stream — it never looks inside the model.

pub mod demo;

pub use demo::{DemoEngine, ScriptedEngine};

use crate::error::Result;
use crate::rng::SeededRng;

/// Token ID type (i32 for FFI compat; logically non-negative).
pub type TokenId = i32;

/// One token emission from the engine.
///
/// Produced once per consumed prompt position and once per generated token.
/// Not retained beyond the controller's current decision.
#[derive(Debug, Clone, Copy)]
pub struct StreamEvent {
    pub token_id: TokenId,
    pub score: f32,
}

/// Per-token acceptance predicate, owned by a [`GenerationRequest`].
pub type AcceptPredicate = Box<dyn Fn(TokenId) -> bool>;

/// Predicate accepting every token (the default configuration).
pub fn accept_all() -> AcceptPredicate {
    Box::new(|_| true)
}

/// One generation call's worth of input, constructed fresh per turn and
/// discarded after the call returns.
pub struct GenerationRequest {
    /// Tokenized prompt for this turn (control markup included).
    pub prompt_tokens: Vec<TokenId>,

    /// Absolute position the engine resumes from (total tokens consumed
    /// across the session so far).
    pub start_pos: usize,

    /// Session-wide token budget; the engine must not push the absolute
    /// position past this.
    pub max_tokens: usize,

    /// Token filter applied to candidate generated tokens.
    pub accept: AcceptPredicate,
}

/// Best-effort threading hints handed to the engine at construction.
///
/// Pool construction and pinning mechanics belong to the engine; the core
/// only states the policy. Applying it may be a no-op on platforms without
/// the capability.
#[derive(Debug, Clone, Copy)]
pub struct PoolHint {
    pub num_threads: usize,
}

impl PoolHint {
    /// Pinning only pays off on many-core machines.
    pub const PIN_THRESHOLD: usize = 10;

    pub fn new(num_threads: usize) -> Self {
        Self { num_threads }
    }

    /// Whether the engine should pin workers to cores.
    pub fn should_pin(&self) -> bool {
        self.num_threads > Self::PIN_THRESHOLD
    }

    /// Logical core for the calling thread when pinning: the last one,
    /// leaving the lower cores to the workers.
    pub fn caller_core(&self) -> usize {
        self.num_threads.saturating_sub(1)
    }
}

/// A streaming text-generation engine.
///
/// # Callback contract
///
/// `generate` invokes `on_token` once per consumed prompt position, then
/// once per generated token, from a single logical thread of control at a
/// time — callers may hand over unsynchronized state. Generation stops when
/// the callback returns `false`, when the absolute position reaches
/// `request.max_tokens`, or after the model emits end-of-sequence.
pub trait Engine {
    /// Whether the model expects instruction-tuned turn markup.
    fn is_instruction_tuned(&self) -> bool;

    /// Run one blocking generation call, streaming tokens through
    /// `on_token` before returning.
    fn generate(
        &mut self,
        request: GenerationRequest,
        rng: &mut SeededRng,
        on_token: &mut dyn FnMut(StreamEvent) -> bool,
    ) -> Result<()>;
}
