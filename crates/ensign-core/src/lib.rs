// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ensign agent.
//!
//! This crate provides the foundational trait definitions, error type, and
//! common types used throughout the Ensign workspace. The three collaborator
//! seams (LLM provider, chat surface, chain client) are defined here and
//! implemented outside the orchestration core.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::EnsignError;
pub use types::{ChannelId, ConversationId, Identity, TokenUsage, UserId};

pub use traits::{ChainClient, ChatSurface, ProviderAdapter};
