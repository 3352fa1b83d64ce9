//! kubectl-ai-core — shared types, error taxonomy, and the data model of the
//! conversational execution engine: `Message`, `Session`, `AgentState`,
//! `FunctionCall`/`FunctionCallResult`, `ToolCallAnalysis`.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
