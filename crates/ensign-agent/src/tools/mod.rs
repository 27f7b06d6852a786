// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry for the agent loop.
//!
//! Every tool deserializes its JSON input into a dedicated argument struct at
//! the boundary, acts through the shared [`ToolContext`], and returns a
//! [`ToolOutcome`]. A tool that needs an out-of-band user action (signature,
//! wallet choice) sets `user_action`, which makes the loop suspend
//! immediately after recording the pending marker.

mod bridge;
mod name_status;
mod registration;
mod renewal;
mod subdomain;
mod transfer;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use ensign_config::{BridgeConfig, ChainConfig};
use ensign_core::traits::provider::ToolDefinition;
use ensign_core::types::Identity;
use ensign_core::{ChainClient, ChatSurface, EnsignError};
use ensign_flow::FlowRepository;

use crate::session::ExpectedAction;

pub use bridge::PrepareBridgeTool;
pub use name_status::NameStatusTool;
pub use registration::{PrepareRegistrationTool, SubmitRegistrationTool};
pub use renewal::PrepareRenewalTool;
pub use subdomain::{ContinueSubdomainTool, PrepareSubdomainTool};
pub use transfer::PrepareTransferTool;

/// Seconds in one registration year.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Shared dependencies handed to every tool invocation.
pub struct ToolContext {
    pub identity: Identity,
    pub flows: Arc<FlowRepository>,
    pub chain: Arc<dyn ChainClient>,
    pub surface: Arc<dyn ChatSurface>,
    pub chain_config: ChainConfig,
    pub bridge_config: BridgeConfig,
}

/// Result of a tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// User-facing narration sent to the chat surface by the loop.
    pub display_message: Option<String>,
    /// Set when the loop must suspend for an out-of-band user action.
    pub user_action: Option<ExpectedAction>,
}

impl ToolOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            display_message: None,
            user_action: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            display_message: None,
            user_action: None,
        }
    }

    /// A successful outcome that pauses the loop for user action.
    pub fn suspend(
        data: serde_json::Value,
        display_message: impl Into<String>,
        action: ExpectedAction,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            display_message: Some(display_message.into()),
            user_action: Some(action),
        }
    }

    pub fn with_display(mut self, message: impl Into<String>) -> Self {
        self.display_message = Some(message.into());
        self
    }

    pub fn requires_user_action(&self) -> bool {
        self.user_action.is_some()
    }

    /// The JSON fed back to the model as the tool result.
    pub fn as_tool_result_content(&self) -> String {
        serde_json::json!({
            "success": self.success,
            "data": self.data,
            "error": self.error,
        })
        .to_string()
    }
}

/// Unified interface for every agent tool.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError>;
}

/// Deserializes tool input into its typed argument struct.
///
/// Schema enforcement happens here: a shape mismatch is an input error the
/// loop folds back to the model, never a loop failure.
pub fn parse_args<T: DeserializeOwned>(input: serde_json::Value) -> Result<T, EnsignError> {
    serde_json::from_value(input)
        .map_err(|e| EnsignError::InvalidInput(format!("invalid tool arguments: {e}")))
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The full tool set the assistant exposes.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NameStatusTool));
        registry.register(Arc::new(PrepareRegistrationTool));
        registry.register(Arc::new(SubmitRegistrationTool));
        registry.register(Arc::new(PrepareBridgeTool));
        registry.register(Arc::new(PrepareSubdomainTool));
        registry.register(Arc::new(ContinueSubdomainTool));
        registry.register(Arc::new(PrepareTransferTool));
        registry.register(Arc::new(PrepareRenewalTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    /// Provider-format tool definitions, sorted by name for stable prompts.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
