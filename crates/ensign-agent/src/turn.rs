// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bounded, turn-based tool-calling loop.
//!
//! Per invocation the loop is a small state machine: `Running(turn N)` ends
//! in `Complete`, `MaxTurns`, `Failed`, or `AwaitingAction`. Narration is
//! delivered before tools execute; a tool that needs an out-of-band user
//! action suspends the loop immediately and nothing after it -- same-turn
//! siblings included -- runs, guaranteeing exactly-once side effects for the
//! suspending action.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use ensign_config::EnsignConfig;
use ensign_core::traits::provider::{ContentBlock, ProviderMessage, ProviderRequest};
use ensign_core::types::Identity;
use ensign_core::{ChainClient, ChatSurface, EnsignError, ProviderAdapter};
use ensign_flow::FlowRepository;
use ensign_store::SecureStateStore;

use crate::cost;
use crate::keylock::KeyedLocks;
use crate::session::{
    ConversationSession, ExpectedAction, MessageRole, PendingToolCall, SessionStatus,
    SessionStore,
};
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry};
use crate::waiter::CommitWaiter;

const SYSTEM_PROMPT: &str = "\
You are Ensign, an assistant that manages ENS names for users over chat. You \
can check names, register them (commit-reveal, two signatures with a mandatory \
wait between), renew them, transfer them, create subdomains, and bridge funds \
from the secondary chain when the user's primary-chain balance falls short. \
Use the tools for every on-chain fact or action; never invent prices, owners, \
or balances. Each money-moving tool pauses the conversation until the user \
signs; continue from whatever the user reports. Be concise and concrete: \
exact names, exact amounts.";

/// Final result of one loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model finished with a plain-text turn; the session stays reusable.
    Complete,
    /// A tool needs an out-of-band user action; state is persisted and the
    /// loop will resume when the action's result arrives.
    AwaitingAction(ExpectedAction),
    /// The hard turn cap was reached. Distinct from failure so callers can
    /// offer a restart.
    MaxTurns,
    /// A turn failed; the session is marked errored.
    Failed,
    /// Nothing to resume: no live session (or no pending action) for the key.
    NoSession,
}

/// The orchestration engine: provider, surface, chain, stores, tools, and
/// the per-key locks that serialize work on one conversation.
pub struct Agent {
    provider: Arc<dyn ProviderAdapter>,
    surface: Arc<dyn ChatSurface>,
    chain: Arc<dyn ChainClient>,
    flows: Arc<FlowRepository>,
    sessions: Arc<SessionStore>,
    tools: Arc<ToolRegistry>,
    waiter: Arc<CommitWaiter>,
    locks: Arc<KeyedLocks>,
    config: EnsignConfig,
}

impl Agent {
    /// Wires the engine from its collaborators. No globals; everything the
    /// loop touches is injected here.
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        surface: Arc<dyn ChatSurface>,
        chain: Arc<dyn ChainClient>,
        store: Arc<SecureStateStore>,
        tools: ToolRegistry,
        config: EnsignConfig,
    ) -> Self {
        let flows = Arc::new(FlowRepository::new(
            store.clone(),
            Duration::from_secs(config.store.entry_ttl_secs),
        ));
        let sessions = Arc::new(SessionStore::new(
            store,
            Duration::from_secs(config.agent.session_ttl_secs),
        ));
        let locks = Arc::new(KeyedLocks::new());
        let waiter = Arc::new(CommitWaiter::new(
            flows.clone(),
            sessions.clone(),
            chain.clone(),
            surface.clone(),
            locks.clone(),
            config.chain.clone(),
        ));
        Self {
            provider,
            surface,
            chain,
            flows,
            sessions,
            tools: Arc::new(tools),
            waiter,
            locks,
            config,
        }
    }

    pub fn flows(&self) -> &Arc<FlowRepository> {
        &self.flows
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn waiter(&self) -> &Arc<CommitWaiter> {
        &self.waiter
    }

    pub(crate) fn surface(&self) -> &Arc<dyn ChatSurface> {
        &self.surface
    }

    pub(crate) fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// Entry point for an inbound user message.
    pub async fn handle_message(
        &self,
        identity: &Identity,
        text: &str,
    ) -> Result<RunOutcome, EnsignError> {
        let text = text.trim();
        if text.is_empty() {
            self.surface
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "I didn't catch that -- please send a message with some text.",
                )
                .await?;
            return Ok(RunOutcome::Complete);
        }

        let _guard = self
            .locks
            .acquire(&identity.user_id, &identity.conversation_id)
            .await;
        let mut session = self.sessions.load_or_create(identity).await?;

        // An explicit cancel while an operation is pending is a zero-tool
        // turn: clear state, confirm, no model call.
        if is_cancel_utterance(text) {
            let flow = self
                .flows
                .get_active_flow(&identity.user_id, &identity.conversation_id)
                .await?;
            if session.pending_tool_call.is_some() || flow.is_some() {
                self.flows
                    .clear_active_flow(&identity.user_id, &identity.conversation_id)
                    .await?;
                session.pending_tool_call = None;
                session.status = SessionStatus::Active;
                session.record(MessageRole::User, text);
                let confirmation =
                    "Cancelled. Nothing will be signed or sent; the operation has been discarded.";
                session.record(MessageRole::Assistant, confirmation);
                self.sessions.save(&session).await?;
                self.surface
                    .send_message(&identity.channel_id, &identity.conversation_id, confirmation)
                    .await?;
                return Ok(RunOutcome::Complete);
            }
        }

        session.record(MessageRole::User, text);
        self.drive(identity, session).await
    }

    /// Runs the turn loop and maps uncaught errors to the `Failed` outcome:
    /// session marked errored, error counter bumped, generic message sent,
    /// no automatic retry.
    pub(crate) async fn drive(
        &self,
        identity: &Identity,
        mut session: ConversationSession,
    ) -> Result<RunOutcome, EnsignError> {
        match self.run_turns(identity, &mut session).await {
            Ok(outcome) => {
                self.sessions.save(&session).await?;
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, user = %identity.user_id.0, "turn loop failed");
                metrics::counter!("ensign_agent_turn_errors").increment(1);
                session.status = SessionStatus::Error;
                if let Err(save_err) = self.sessions.save(&session).await {
                    warn!(error = %save_err, "failed to persist errored session");
                }
                let message = if e.is_user_presentable() {
                    e.to_string()
                } else {
                    "I hit a technical issue handling that -- please try again.".to_string()
                };
                if let Err(send_err) = self
                    .surface
                    .send_message(&identity.channel_id, &identity.conversation_id, &message)
                    .await
                {
                    warn!(error = %send_err, "failed to deliver error message");
                }
                Ok(RunOutcome::Failed)
            }
        }
    }

    async fn run_turns(
        &self,
        identity: &Identity,
        session: &mut ConversationSession,
    ) -> Result<RunOutcome, EnsignError> {
        // Window: the most recent stored messages plus the new one, mapped
        // into provider roles (tool results ride as user-role text).
        let mut transcript: Vec<ProviderMessage> = session
            .recent_messages(self.config.agent.message_window + 1)
            .iter()
            .map(|m| match m.role {
                MessageRole::User | MessageRole::ToolResult => {
                    ProviderMessage::user_text(m.content.as_str())
                }
                MessageRole::Assistant => ProviderMessage::assistant_text(m.content.as_str()),
            })
            .collect();

        let max_turns = self.config.agent.max_turns;
        let mut turns = 0u32;
        loop {
            if turns >= max_turns {
                warn!(max_turns, "turn cap reached without termination");
                self.surface
                    .send_message(
                        &identity.channel_id,
                        &identity.conversation_id,
                        "This is taking more steps than I allow in one go. Your progress \
                         is saved -- send another message to continue.",
                    )
                    .await?;
                return Ok(RunOutcome::MaxTurns);
            }
            turns += 1;
            session.turn_count += 1;

            let request = ProviderRequest {
                model: self.config.agent.model.clone(),
                system: Some(SYSTEM_PROMPT.to_string()),
                messages: transcript.clone(),
                max_tokens: self.config.agent.max_tokens,
                tools: Some(self.tools.definitions()),
            };
            let response = self.provider.complete(request).await?;
            session.estimated_cost +=
                cost::estimate_cost(&self.config.agent.model, &response.usage);
            debug!(
                turn = turns,
                blocks = response.content.len(),
                "provider turn completed"
            );

            let mut text_parts: Vec<String> = Vec::new();
            let mut tool_calls: Vec<(String, String, serde_json::Value)> = Vec::new();
            let mut assistant_blocks: Vec<ContentBlock> = Vec::new();
            for block in response.content {
                match block {
                    ContentBlock::Text { text } => {
                        if !text.trim().is_empty() {
                            text_parts.push(text.clone());
                        }
                        assistant_blocks.push(ContentBlock::Text { text });
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_calls.push((id.clone(), name.clone(), input.clone()));
                        assistant_blocks.push(ContentBlock::ToolUse { id, name, input });
                    }
                    // The model never sends tool results; drop them if an
                    // implementation does.
                    ContentBlock::ToolResult { .. } => {}
                }
            }

            // Narration reaches the user before any action lands.
            let narration = text_parts.join("\n\n");
            if !narration.trim().is_empty() {
                self.surface
                    .send_message(&identity.channel_id, &identity.conversation_id, &narration)
                    .await?;
                session.record(MessageRole::Assistant, narration);
            }

            if tool_calls.is_empty() {
                session.status = SessionStatus::Active;
                return Ok(RunOutcome::Complete);
            }

            transcript.push(ProviderMessage {
                role: "assistant".to_string(),
                content: assistant_blocks,
            });

            let ctx = self.tool_context(identity);
            let mut result_blocks: Vec<ContentBlock> = Vec::new();
            for (tool_id, tool_name, tool_input) in tool_calls {
                let outcome = match self.tools.get(&tool_name) {
                    None => ToolOutcome::fail(format!("unknown tool: {tool_name}")),
                    Some(tool) => match tool.execute(tool_input, &ctx).await {
                        Ok(outcome) => outcome,
                        Err(e) if e.is_user_presentable() => ToolOutcome::fail(e.to_string()),
                        Err(e) => return Err(e),
                    },
                };

                if let Some(display) = &outcome.display_message {
                    self.surface
                        .send_message(&identity.channel_id, &identity.conversation_id, display)
                        .await?;
                    session.record(MessageRole::Assistant, display.clone());
                }

                let result_content = outcome.as_tool_result_content();
                session.record(MessageRole::ToolResult, result_content.clone());

                if let Some(action) = outcome.user_action.clone() {
                    // Suspend: persist the marker and execute nothing further
                    // this turn, sibling calls included.
                    session.pending_tool_call = Some(PendingToolCall {
                        tool_name,
                        tool_id,
                        expected_action: action.clone(),
                    });
                    session.status = action.session_status();
                    return Ok(RunOutcome::AwaitingAction(action));
                }

                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: tool_id,
                    content: result_content,
                    is_error: if outcome.success { None } else { Some(true) },
                });
            }
            transcript.push(ProviderMessage {
                role: "user".to_string(),
                content: result_blocks,
            });
        }
    }

    pub(crate) fn tool_context(&self, identity: &Identity) -> ToolContext {
        ToolContext {
            identity: identity.clone(),
            flows: self.flows.clone(),
            chain: self.chain.clone(),
            surface: self.surface.clone(),
            chain_config: self.config.chain.clone(),
            bridge_config: self.config.bridge.clone(),
        }
    }
}

/// Explicit cancellation words, matched case-insensitively against the whole
/// message. Anything fuzzier is the model's job.
fn is_cancel_utterance(text: &str) -> bool {
    matches!(text.to_lowercase().as_str(), "cancel" | "stop" | "abort")
}
