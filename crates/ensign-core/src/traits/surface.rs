// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-surface collaborator contract.
//!
//! The surface delivers plain messages and interaction requests (sign this
//! transaction, answer this form). Both sends are awaited, but their answers
//! arrive later through the agent's resume entry points, never as return
//! values here.

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::EnsignError;
use crate::types::{ChannelId, ConversationId, UserId};

/// A request for the user to sign and submit a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Correlation id echoed back by the signing surface.
    pub id: String,
    pub title: String,
    pub chain_id: u64,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// The wallet expected to sign.
    pub signer: Address,
    pub recipient: UserId,
}

/// A single component of a form request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormComponent {
    pub id: String,
    pub label: String,
    pub options: Vec<String>,
}

/// A request for the user to pick an option or confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRequest {
    pub id: String,
    pub title: String,
    pub components: Vec<FormComponent>,
    pub recipient: UserId,
}

/// An out-of-band interaction request sent through the chat surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionRequest {
    Transaction(TransactionRequest),
    Form(FormRequest),
}

impl InteractionRequest {
    /// The correlation id the surface echoes back with the answer.
    pub fn id(&self) -> &str {
        match self {
            InteractionRequest::Transaction(t) => &t.id,
            InteractionRequest::Form(f) => &f.id,
        }
    }
}

/// Adapter for the chat platform the agent speaks through.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Sends a plain text message into a conversation.
    async fn send_message(
        &self,
        channel: &ChannelId,
        conversation: &ConversationId,
        text: &str,
    ) -> Result<(), EnsignError>;

    /// Sends an interaction request whose answer arrives via a resume entry point.
    async fn send_interaction(
        &self,
        channel: &ChannelId,
        conversation: &ConversationId,
        request: InteractionRequest,
    ) -> Result<(), EnsignError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_request_tagging() {
        let req = InteractionRequest::Form(FormRequest {
            id: "form-1".into(),
            title: "Pick a wallet".into(),
            components: vec![FormComponent {
                id: "wallet".into(),
                label: "Wallet".into(),
                options: vec!["0xabc".into(), "0xdef".into()],
            }],
            recipient: UserId("user-1".into()),
        });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "form");
        assert_eq!(json["id"], "form-1");
        assert_eq!(req.id(), "form-1");
    }

    #[test]
    fn transaction_request_round_trips_value_exactly() {
        let req = InteractionRequest::Transaction(TransactionRequest {
            id: "tx-1".into(),
            title: "Commit".into(),
            chain_id: 1,
            to: Address::zero(),
            data: Bytes::from(vec![0xde, 0xad]),
            value: U256::MAX,
            signer: Address::zero(),
            recipient: UserId("user-1".into()),
        });
        let json = serde_json::to_string(&req).unwrap();
        let back: InteractionRequest = serde_json::from_str(&json).unwrap();
        match back {
            InteractionRequest::Transaction(t) => assert_eq!(t.value, U256::MAX),
            _ => panic!("expected transaction"),
        }
    }
}
