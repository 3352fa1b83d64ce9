//! kubectl-ai-llm — the LLM client/`Chat` trait boundary (spec §6).
//!
//! The concrete wire protocol for any given provider is an external
//! collaborator (spec §1 Non-goals); this crate only defines the seam the
//! agent core drives, plus a deterministic `mock` provider used in tests.

pub mod mock;
pub mod provider;
pub mod types;

pub use provider::{Chat, LlmError, LlmProvider, LlmResult, LlmStream};
pub use types::*;
