//! kubectl-ai-agent — the `Agent` state machine and loop (spec §4.1),
//! the tool dispatcher (spec §4.3), the text-shim adapter (spec §4.6), and
//! session persistence (spec §4.5).

pub mod agent;
pub mod dispatcher;
pub mod manager;
pub mod message_store;
pub mod request;
pub mod session_store;
pub mod shim;

pub use agent::{Agent, AgentConfig, InputMessage};
pub use manager::AgentManager;
pub use message_store::{ChatMessageStore, FileChatMessageStore, MemoryChatMessageStore};
pub use request::RequestController;
pub use session_store::{FileSessionStore, MemorySessionStore, SessionHandle, SessionManager, SessionStore};
pub use shim::{run_shim, ShimResult};
