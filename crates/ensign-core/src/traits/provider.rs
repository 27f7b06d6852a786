// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM provider collaborator contract.
//!
//! The provider is a stateless request/response seam: system instructions,
//! tool schema, and a message window go in; text and tool-invocation content
//! blocks plus token usage come out. The HTTP client behind this trait is
//! outside the orchestration core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EnsignError;
use crate::types::TokenUsage;

/// A tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub input_schema: serde_json::Value,
}

/// A typed content block within a provider message or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Free text.
    #[serde(rename = "text")]
    Text { text: String },
    /// The model is requesting a tool invocation.
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// A tool result fed back to the model.
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// A single message in the provider conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Role: "user" or "assistant".
    pub role: String,
    pub content: Vec<ContentBlock>,
}

impl ProviderMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// A request to the LLM provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

/// A full response from the LLM provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

/// Adapter for LLM provider integrations.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, EnsignError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_tool_use_block() {
        let block = ContentBlock::ToolUse {
            id: "toolu_abc".into(),
            name: "name_status".into(),
            input: serde_json::json!({"name": "alice.eth"}),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "name_status");
        assert_eq!(json["input"]["name"], "alice.eth");
    }

    #[test]
    fn serialize_tool_result_omits_absent_is_error() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_abc".into(),
            content: "ok".into(),
            is_error: None,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn deserialize_response_with_mixed_blocks() {
        let json = r#"{
            "id": "resp_1",
            "content": [
                {"type": "text", "text": "Checking that name."},
                {"type": "tool_use", "id": "t1", "name": "name_status", "input": {"name": "alice.eth"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 15}
        }"#;
        let resp: ProviderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content.len(), 2);
        assert!(matches!(&resp.content[0], ContentBlock::Text { .. }));
        assert!(matches!(&resp.content[1], ContentBlock::ToolUse { .. }));
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn provider_message_constructors() {
        let u = ProviderMessage::user_text("hi");
        assert_eq!(u.role, "user");
        let a = ProviderMessage::assistant_text("hello");
        assert_eq!(a.role, "assistant");
    }

    #[test]
    fn serialize_request_omits_absent_tools_and_system() {
        let req = ProviderRequest {
            model: "claude-sonnet-4-20250514".into(),
            system: None,
            messages: vec![ProviderMessage::user_text("hi")],
            max_tokens: 1024,
            tools: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("tools").is_none());
    }
}
