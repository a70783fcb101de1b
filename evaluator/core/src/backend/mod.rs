//! Scoring Backend Integration
//!
//! This module provides access to scoring backends through a common trait.
//! The engine never talks to a provider directly: it hands a [`ScoreCall`] to
//! a [`ScoringBackend`] and gets raw reply text plus the observed cost back.
//!
//! # Available Backends
//!
//! - **Scripted**: Deterministic in-memory replies (tests, offline CLI runs)
//! - **Ollama**: Local LLM server over HTTP
//!
//! # Usage
//!
//! ```ignore
//! use evaluator_core::backend::{ScriptedBackend, ScriptedReply};
//!
//! let backend = ScriptedBackend::new()
//!     .with_reply("seo", ScriptedReply::scored(82.0, 90.0).with_cost(0.02));
//! ```

mod ollama;
mod scripted;
mod traits;

pub use ollama::{OllamaScorer, DEFAULT_PRICE_PER_1K_TOKENS};
pub use scripted::{RecordedCall, ScriptedBackend, ScriptedReply};
pub use traits::{BackendError, BackendReply, ScoreCall, ScoringBackend};
