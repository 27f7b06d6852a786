// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model and loader for the Ensign agent.
//!
//! Configuration is layered: compiled defaults, a local `ensign.toml`, and
//! `ENSIGN_*` environment overrides. Unknown keys are rejected at startup.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AgentConfig, BridgeConfig, ChainConfig, EnsignConfig, StoreConfig};
