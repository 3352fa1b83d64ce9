//! kubectl-ai-tools — the `Tool` trait, the registry, the call analyzer,
//! and the read/write approver (spec §4.2).
//!
//! Concrete tool implementations (a real `kubectl`/shell wrapper, sandbox
//! executors, MCP-backed tools) are external collaborators (spec §1
//! Non-goals); `stub` ships two minimal, fully-worked `Tool` impls used by
//! this crate's own tests and by `kubectl-ai-agent`'s loop tests.

pub mod analyzer;
pub mod approver;
pub mod executor;
pub mod registry;
pub mod stub;

pub use analyzer::{ToolCallAnalysis, ToolCallAnalyzer};
pub use approver::OperationApprover;
pub use executor::{ExecResult, Executor, NoopExecutor, StreamType, ToolContext};
pub use registry::{Tool, ToolCall, ToolRegistry, ToolResult};
