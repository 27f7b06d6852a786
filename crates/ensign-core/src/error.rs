// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ensign agent.

use thiserror::Error;

/// The primary error type used across all Ensign crates.
///
/// Variants follow the error taxonomy of the orchestration engine: input
/// errors are recovered locally with a retry prompt, external-call errors map
/// to a generic user message, integrity errors always fail closed, and domain
/// errors carry a precise, user-presentable message.
#[derive(Debug, Error)]
pub enum EnsignError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// State-store backend errors (connection, query failure, serialization).
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Envelope verification failure: bad signature, unknown version, future
    /// or stale timestamp. Always treated as not-found by callers.
    #[error("state integrity violation: {0}")]
    Integrity(String),

    /// LLM provider errors (API failure, token limits, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider returned content the loop cannot interpret (empty
    /// response, malformed tool input). Distinct from a transport failure.
    #[error("provider returned malformed content: {0}")]
    ProviderParse(String),

    /// Chain collaborator errors (RPC failure, estimation failure).
    #[error("chain error: {message}")]
    Chain {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chat-surface delivery errors.
    #[error("chat surface error: {0}")]
    Surface(String),

    /// Domain errors carry an exact, actionable message for the user
    /// (insufficient balance with shortfall, name unavailable, owner mismatch).
    #[error("{0}")]
    Domain(String),

    /// Rejected user input (empty message, unparseable arguments).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A flow operation referenced a `(user, conversation)` key with no
    /// active flow. Performs no write.
    #[error("no active flow for user {user} in conversation {conversation}")]
    FlowNotFound { user: String, conversation: String },

    /// A status update that is not a documented successor of the current status.
    #[error("illegal {flow_type} transition: {from} -> {to}")]
    IllegalTransition {
        flow_type: String,
        from: String,
        to: String,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EnsignError {
    /// True for errors whose message is safe and useful to show the user
    /// verbatim. Everything else maps to a generic "technical issue" reply.
    pub fn is_user_presentable(&self) -> bool {
        matches!(
            self,
            EnsignError::Domain(_) | EnsignError::InvalidInput(_)
        )
    }
}
