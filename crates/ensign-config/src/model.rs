// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ensign agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Ensign configuration.
///
/// Loaded from a TOML file with environment variable overrides. All sections
/// are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnsignConfig {
    /// Agent loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Secure state store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Chain and commit-reveal settings.
    #[serde(default)]
    pub chain: ChainConfig,

    /// Bridge solver settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Agent loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Model identifier sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Hard cap on LLM calls per loop invocation.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Maximum tokens per provider response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// How many stored messages feed the model context window.
    #[serde(default = "default_message_window")]
    pub message_window: usize,

    /// Conversation session idle expiry.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_turns: default_max_turns(),
            max_tokens: default_max_tokens(),
            message_window: default_message_window(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_turns() -> u32 {
    25
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_message_window() -> usize {
    10
}

fn default_session_ttl_secs() -> u64 {
    1800
}

/// Secure state store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database path. `:memory:` for an ephemeral store.
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Keyed-MAC secret for the tamper-evident envelope, usually supplied via
    /// the `ENSIGN_STORE_SIGNING_SECRET` env override. When absent the store
    /// runs unverified and logs a loud warning.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Flow and session record expiry.
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,

    /// Entries older than this are rejected on read even if the backend TTL
    /// has not fired.
    #[serde(default = "default_max_entry_age_secs")]
    pub max_entry_age_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            signing_secret: None,
            entry_ttl_secs: default_entry_ttl_secs(),
            max_entry_age_secs: default_max_entry_age_secs(),
        }
    }
}

fn default_store_path() -> String {
    "ensign.db".to_string()
}

fn default_entry_ttl_secs() -> u64 {
    1800
}

fn default_max_entry_age_secs() -> u64 {
    1800
}

/// Chain and commit-reveal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    /// Primary chain id (where names live).
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Secondary chain id (bridge source).
    #[serde(default = "default_l2_chain_id")]
    pub l2_chain_id: u64,

    /// Floor for the commit-reveal wait, in seconds. The scheduler takes the
    /// max of this and the protocol's reported minimum commitment age.
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: u64,

    /// Safety margin added on top of the wait, in seconds.
    #[serde(default = "default_wait_margin_secs")]
    pub wait_margin_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            l2_chain_id: default_l2_chain_id(),
            min_wait_secs: default_min_wait_secs(),
            wait_margin_secs: default_wait_margin_secs(),
        }
    }
}

fn default_chain_id() -> u64 {
    1
}

fn default_l2_chain_id() -> u64 {
    8453
}

fn default_min_wait_secs() -> u64 {
    60
}

fn default_wait_margin_secs() -> u64 {
    5
}

/// Bridge solver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Percentage inflation applied to the quoted fee before re-quoting.
    /// Clamped to a minimum of 10.
    #[serde(default = "default_fee_margin_percent")]
    pub fee_margin_percent: u64,

    /// Extra wei kept on the destination for gas after bridging.
    #[serde(default = "default_dest_gas_buffer_wei")]
    pub dest_gas_buffer_wei: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fee_margin_percent: default_fee_margin_percent(),
            dest_gas_buffer_wei: default_dest_gas_buffer_wei(),
        }
    }
}

fn default_fee_margin_percent() -> u64 {
    10
}

fn default_dest_gas_buffer_wei() -> u64 {
    1_000_000_000_000_000 // 0.001 ether
}
