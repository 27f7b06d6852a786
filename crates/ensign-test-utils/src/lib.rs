// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators for deterministic, CI-runnable Ensign tests: a
//! FIFO-scripted LLM provider, a recording chat surface, and a configurable
//! chain client.

pub mod mock_chain;
pub mod mock_provider;
pub mod mock_surface;

pub use mock_chain::{MockChain, NameEntry};
pub use mock_provider::{MockProvider, blocks_response, text_response, tool_response};
pub use mock_surface::MockSurface;
