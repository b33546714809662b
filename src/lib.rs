//! Session and token-stream controller for Gemma-style chat models.
//!
//! This crate frames conversations around an external text-generation
//! engine: it tracks absolute vs. per-turn token positions, decides when
//! conversational state resets, wraps prompts in model-specific control
//! markup, classifies streamed tokens, and exposes both an interactive
//! multi-turn session and a one-shot completion mode built from the same
//! primitives. The engine itself (tensor math, tokenizer internals,
//! worker pools) lives behind the [`engine::Engine`] and
//! [`tokenizer::Tokenizer`] traits.

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod rng;
pub mod session;
pub mod state;
pub mod stream;
pub mod tokenizer;

pub use completion::complete;
pub use config::ChatConfig;
pub use error::{GemmaError, Result};
pub use session::{Session, SessionEnd};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
