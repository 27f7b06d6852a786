// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent orchestration for Ensign: the bounded turn loop, conversation
//! sessions, the tool registry, resume entry points, and the commit-reveal
//! waiter.
//!
//! An [`Agent`] is constructed once from its collaborators (LLM provider,
//! chat surface, chain client, secure store) and handles each inbound chat
//! event as an independent task; per-`(user, conversation)` locks serialize
//! work on one key while different keys stay fully concurrent.

pub mod cost;
pub mod keylock;
pub mod resume;
pub mod session;
pub mod tools;
pub mod turn;
pub mod waiter;

pub use resume::{FormResponse, SignatureOutcome};
pub use session::{
    ConversationSession, ExpectedAction, MessageRole, PendingToolCall, SessionStatus,
    SessionStore,
};
pub use tools::{AgentTool, ToolContext, ToolOutcome, ToolRegistry};
pub use turn::{Agent, RunOutcome};
pub use waiter::CommitWaiter;
