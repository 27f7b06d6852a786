// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The orchestration core talks to the outside world through exactly three
//! seams: the LLM provider, the chat surface, and the chain client. Each is
//! injected as an `Arc<dyn Trait>` at construction.

pub mod chain;
pub mod provider;
pub mod surface;

pub use chain::{
    BridgeQuote, ChainClient, ChainOp, CommitmentParams, EncodedCall, NameOwnership, NameStatus,
};
pub use provider::{
    ContentBlock, ProviderAdapter, ProviderMessage, ProviderRequest, ProviderResponse,
    ToolDefinition,
};
pub use surface::{
    ChatSurface, FormComponent, FormRequest, InteractionRequest, TransactionRequest,
};
