// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order: compiled defaults, then `./ensign.toml`, then `ENSIGN_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::EnsignConfig;

/// Load configuration from `./ensign.toml` with env var overrides.
pub fn load_config() -> Result<EnsignConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EnsignConfig::default()))
        .merge(Toml::file("ensign.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from an inline TOML string (no file lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<EnsignConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EnsignConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EnsignConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EnsignConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `ENSIGN_STORE_SIGNING_SECRET` must map to
/// `store.signing_secret`, not `store.signing.secret`.
fn env_provider() -> Env {
    Env::prefixed("ENSIGN_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("store_", "store.", 1)
            .replacen("chain_", "chain.", 1)
            .replacen("bridge_", "bridge.", 1);
        mapped.into()
    })
}
