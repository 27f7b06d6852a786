// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-chain bridge amount solving for the Ensign agent.
//!
//! The solver answers one question: how much must leave the source chain so
//! that, after the bridge's proportional fee, the destination holds at least
//! the target amount -- without exceeding what the user can afford including
//! source-side gas.

pub mod solver;

pub use solver::{BridgePlan, BridgeQuoter, solve_bridge_amount};
