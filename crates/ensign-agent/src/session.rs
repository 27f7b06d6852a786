// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation sessions: the rolling chat context that lets the turn loop
//! resume mid-operation.
//!
//! One session per `(user, conversation)`, created lazily, reused while
//! non-terminal, expired after thirty minutes of inactivity. History is
//! capped at the most recent twenty messages -- lossy by design, since only
//! recent context feeds the model.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use ensign_core::EnsignError;
use ensign_core::types::{ChannelId, ConversationId, Identity, UserId, now_ms};
use ensign_store::SecureStateStore;

const SESSION_NAMESPACE: &str = "session";

/// Hard cap on stored history. Older entries are discarded, not archived.
pub const MAX_STORED_MESSAGES: usize = 20;

/// Storage key for a session record.
pub fn session_key(user: &UserId, conversation: &ConversationId) -> String {
    format!("{SESSION_NAMESPACE}:{}:{}", user.0, conversation.0)
}

/// Lifecycle status of a conversation session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    AwaitingConfirmation,
    AwaitingSignature,
    WaitingPeriod,
    Complete,
    Error,
    Timeout,
}

impl SessionStatus {
    /// Terminal sessions are not reused; a new one replaces them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Complete | SessionStatus::Error | SessionStatus::Timeout
        )
    }
}

/// Role of a stored session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    ToolResult,
}

/// One entry in the capped session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

/// The out-of-band action the loop suspended for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExpectedAction {
    /// The user must sign and submit a transaction.
    SignTransaction { request_id: String },
    /// The user must pick a signing wallet from a form.
    SelectWallet { request_id: String },
}

impl ExpectedAction {
    pub fn request_id(&self) -> &str {
        match self {
            ExpectedAction::SignTransaction { request_id } => request_id,
            ExpectedAction::SelectWallet { request_id } => request_id,
        }
    }

    /// The session status that holds while this action is pending.
    pub fn session_status(&self) -> SessionStatus {
        match self {
            ExpectedAction::SignTransaction { .. } => SessionStatus::AwaitingSignature,
            ExpectedAction::SelectWallet { .. } => SessionStatus::AwaitingConfirmation,
        }
    }
}

/// Marker set exactly when the loop suspends for user action, cleared exactly
/// when the resume path consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub tool_name: String,
    pub tool_id: String,
    pub expected_action: ExpectedAction,
}

/// The rolling conversational context for one `(user, conversation)` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub channel_id: ChannelId,
    pub status: SessionStatus,
    pub messages: Vec<SessionMessage>,
    pub pending_tool_call: Option<PendingToolCall>,
    pub turn_count: u32,
    /// Running LLM cost accrual in USD.
    pub estimated_cost: f64,
    pub started_at: i64,
    pub last_activity_at: i64,
}

impl ConversationSession {
    pub fn new(identity: &Identity) -> Self {
        let now = now_ms();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            conversation_id: identity.conversation_id.clone(),
            channel_id: identity.channel_id.clone(),
            status: SessionStatus::Active,
            messages: Vec::new(),
            pending_tool_call: None,
            turn_count: 0,
            estimated_cost: 0.0,
            started_at: now,
            last_activity_at: now,
        }
    }

    /// Appends a message, enforcing the history cap and refreshing activity.
    pub fn record(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(SessionMessage {
            role,
            content: content.into(),
            timestamp: now_ms(),
        });
        if self.messages.len() > MAX_STORED_MESSAGES {
            let excess = self.messages.len() - MAX_STORED_MESSAGES;
            self.messages.drain(..excess);
        }
        self.last_activity_at = now_ms();
    }

    /// The most recent `n` stored messages, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[SessionMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

/// Session persistence over the secure state store.
pub struct SessionStore {
    store: Arc<SecureStateStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<SecureStateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// The live session for this key, if any.
    pub async fn load(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> Result<Option<ConversationSession>, EnsignError> {
        let read = self
            .store
            .get::<ConversationSession>(&session_key(user, conversation))
            .await?;
        Ok(read.map(|r| r.value))
    }

    /// Reuses the existing non-terminal session or creates a fresh one.
    pub async fn load_or_create(
        &self,
        identity: &Identity,
    ) -> Result<ConversationSession, EnsignError> {
        match self.load(&identity.user_id, &identity.conversation_id).await? {
            Some(session) if !session.status.is_terminal() => Ok(session),
            Some(_) => {
                debug!(user = %identity.user_id.0, "replacing terminal session");
                Ok(ConversationSession::new(identity))
            }
            None => Ok(ConversationSession::new(identity)),
        }
    }

    /// Persists the session and refreshes its TTL.
    pub async fn save(&self, session: &ConversationSession) -> Result<(), EnsignError> {
        self.store
            .set(
                &session_key(&session.user_id, &session.conversation_id),
                session,
                self.ttl,
            )
            .await
    }

    pub async fn delete(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> Result<(), EnsignError> {
        self.store.delete(&session_key(user, conversation)).await
    }
}
