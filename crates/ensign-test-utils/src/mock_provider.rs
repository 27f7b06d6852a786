// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider for deterministic testing.
//!
//! Responses are popped from a FIFO queue. When the queue is empty, a
//! default text response is returned, so a test never hangs on a missing
//! script entry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use ensign_core::EnsignError;
use ensign_core::traits::provider::{
    ContentBlock, ProviderAdapter, ProviderRequest, ProviderResponse,
};
use ensign_core::types::TokenUsage;

/// A scripted provider returning pre-configured responses in order.
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<ProviderResponse>>>,
    calls: AtomicU32,
}

/// Builds a plain text response.
pub fn text_response(text: impl Into<String>) -> ProviderResponse {
    ProviderResponse {
        id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
        content: vec![ContentBlock::Text { text: text.into() }],
        stop_reason: Some("end_turn".to_string()),
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 20,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        },
    }
}

/// Builds a response containing one tool invocation (plus optional narration).
pub fn tool_response(
    narration: Option<&str>,
    tool_name: &str,
    input: serde_json::Value,
) -> ProviderResponse {
    let mut content = Vec::new();
    if let Some(text) = narration {
        content.push(ContentBlock::Text {
            text: text.to_string(),
        });
    }
    content.push(ContentBlock::ToolUse {
        id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
        name: tool_name.to_string(),
        input,
    });
    ProviderResponse {
        id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
        content,
        stop_reason: Some("tool_use".to_string()),
        usage: TokenUsage {
            input_tokens: 25,
            output_tokens: 15,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        },
    }
}

/// Builds a response from arbitrary content blocks.
pub fn blocks_response(content: Vec<ContentBlock>) -> ProviderResponse {
    ProviderResponse {
        id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
        content,
        stop_reason: Some("tool_use".to_string()),
        usage: TokenUsage {
            input_tokens: 25,
            output_tokens: 15,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        },
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_responses(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            calls: AtomicU32::new(0),
        }
    }

    /// Appends a response to the end of the script.
    pub async fn push(&self, response: ProviderResponse) {
        self.responses.lock().await.push_back(response);
    }

    /// How many completion calls the provider has served.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next_response(&self) -> ProviderResponse {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| text_response("mock response"))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, EnsignError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_response().await)
    }
}
