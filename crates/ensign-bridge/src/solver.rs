// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge amount solver.
//!
//! Computes how much to send from the source chain so that, after the
//! bridge's proportional fee, the destination receives at least the target.
//! Two-pass estimate-then-confirm: quote the naive target to learn the fee,
//! inflate the fee by a safety margin, re-quote the candidate, and give up
//! with a precise error if the confirming quote still falls short. Never a
//! fixed-point iteration, never a silently under-funded destination.

use async_trait::async_trait;
use ethers_core::types::U256;
use tracing::debug;

use ensign_core::EnsignError;
use ensign_core::traits::chain::BridgeQuote;
use ensign_core::types::format_ether;

/// Minimum fee inflation applied between the two passes.
const MIN_FEE_MARGIN_PERCENT: u64 = 10;

/// Quote seam the solver drives. Implementations wrap the chain client with
/// a fixed destination.
#[async_trait]
pub trait BridgeQuoter: Send + Sync {
    async fn quote(&self, input_wei: U256) -> Result<BridgeQuote, EnsignError>;
}

/// A solved bridge: how much to send and what the confirming quote promised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgePlan {
    pub input_wei: U256,
    pub quoted_output_wei: U256,
    /// Fee implied by the confirming quote.
    pub fee_wei: U256,
}

/// Solves the source-side input for a destination target.
///
/// `fee_margin_percent` is clamped to at least 10. Errors are domain errors
/// with exact amounts: a shortfall when the source balance cannot cover
/// `input + source_gas`, and a fees-too-high error when even the inflated
/// input under-delivers on the confirming quote.
pub async fn solve_bridge_amount(
    quoter: &dyn BridgeQuoter,
    target_wei: U256,
    source_balance_wei: U256,
    source_gas_wei: U256,
    fee_margin_percent: u64,
) -> Result<BridgePlan, EnsignError> {
    // Pass 1: learn the fee schedule at the naive target.
    let first = quoter.quote(target_wei).await?;
    let fee = first.input_wei.saturating_sub(first.output_wei);

    let margin = fee_margin_percent.max(MIN_FEE_MARGIN_PERCENT);
    let inflated_fee = ceil_percent(fee, 100 + margin);
    let candidate = target_wei + inflated_fee;

    // Pass 2: confirm the candidate actually delivers the target.
    let confirm = quoter.quote(candidate).await?;
    debug!(
        target = %target_wei,
        fee = %fee,
        candidate = %candidate,
        confirmed_output = %confirm.output_wei,
        "bridge solve"
    );
    if confirm.output_wei < target_wei {
        return Err(EnsignError::Domain(format!(
            "bridging {} ETH would deliver only {} ETH of the {} ETH needed; \
             the bridge fee is too high for this amount",
            format_ether(candidate),
            format_ether(confirm.output_wei),
            format_ether(target_wei),
        )));
    }

    let needed = candidate + source_gas_wei;
    if source_balance_wei < needed {
        let shortfall = needed - source_balance_wei;
        return Err(EnsignError::Domain(format!(
            "insufficient balance to bridge: need {} ETH (amount plus gas) but \
             only {} ETH is available; short by {} ETH",
            format_ether(needed),
            format_ether(source_balance_wei),
            format_ether(shortfall),
        )));
    }

    Ok(BridgePlan {
        input_wei: candidate,
        quoted_output_wei: confirm.output_wei,
        fee_wei: candidate - confirm.output_wei,
    })
}

/// `value * percent / 100`, rounded up.
fn ceil_percent(value: U256, percent: u64) -> U256 {
    let numerator = value * U256::from(percent);
    let hundred = U256::from(100u8);
    (numerator + hundred - U256::one()) / hundred
}
