// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat surface that records everything it is asked to deliver.

use async_trait::async_trait;
use tokio::sync::Mutex;

use ensign_core::EnsignError;
use ensign_core::traits::surface::{ChatSurface, InteractionRequest};
use ensign_core::types::{ChannelId, ConversationId};

/// Records sent messages and interaction requests for assertions.
#[derive(Default)]
pub struct MockSurface {
    messages: Mutex<Vec<String>>,
    interactions: Mutex<Vec<InteractionRequest>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every plain message sent so far, in order.
    pub async fn sent_messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    /// Every interaction request sent so far, in order.
    pub async fn sent_interactions(&self) -> Vec<InteractionRequest> {
        self.interactions.lock().await.clone()
    }

    pub async fn interaction_count(&self) -> usize {
        self.interactions.lock().await.len()
    }

    /// The correlation id of the most recent interaction request.
    pub async fn last_request_id(&self) -> Option<String> {
        self.interactions
            .lock()
            .await
            .last()
            .map(|req| req.id().to_string())
    }
}

#[async_trait]
impl ChatSurface for MockSurface {
    async fn send_message(
        &self,
        _channel: &ChannelId,
        _conversation: &ConversationId,
        text: &str,
    ) -> Result<(), EnsignError> {
        self.messages.lock().await.push(text.to_string());
        Ok(())
    }

    async fn send_interaction(
        &self,
        _channel: &ChannelId,
        _conversation: &ConversationId,
        request: InteractionRequest,
    ) -> Result<(), EnsignError> {
        self.interactions.lock().await.push(request);
        Ok(())
    }
}
