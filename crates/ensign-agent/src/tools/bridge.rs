// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-chain bridge tool.
//!
//! Solves the source-side amount with the two-pass solver, verifies the
//! source balance, and requests the bridge signature. When the bridge is
//! funding a registration, the target is derived from the name's cost plus a
//! destination gas buffer and a `next_action` is recorded on the flow.

use async_trait::async_trait;
use ethers_core::types::U256;
use serde::Deserialize;

use ensign_bridge::{BridgeQuoter, solve_bridge_amount};
use ensign_core::EnsignError;
use ensign_core::traits::chain::{BridgeQuote, ChainClient, ChainOp};
use ensign_core::traits::surface::InteractionRequest;
use ensign_core::types::{format_ether, parse_ether};
use ensign_flow::{BridgeData, Flow, FlowData, FlowStatus, NextAction};

use crate::session::ExpectedAction;

use super::{AgentTool, SECONDS_PER_YEAR, ToolContext, ToolOutcome, parse_args};

pub struct PrepareBridgeTool;

#[derive(Debug, Deserialize)]
struct PrepareBridgeArgs {
    /// Amount needed on the destination chain, in ether (decimal string).
    amount_eth: Option<String>,
    /// When set, bridge enough to afterwards register this name and chain
    /// into the registration once funds land.
    then_register: Option<String>,
    duration_years: Option<u32>,
}

/// Adapts the chain client's quote endpoint to the solver seam.
struct ChainQuoter {
    chain: std::sync::Arc<dyn ChainClient>,
    to_chain_id: u64,
}

#[async_trait]
impl BridgeQuoter for ChainQuoter {
    async fn quote(&self, input_wei: U256) -> Result<BridgeQuote, EnsignError> {
        self.chain.bridge_quote(input_wei, self.to_chain_id).await
    }
}

#[async_trait]
impl AgentTool for PrepareBridgeTool {
    fn name(&self) -> &str {
        "prepare_bridge"
    }

    fn description(&self) -> &str {
        "Bridge funds from the secondary chain to the primary chain so the \
         destination ends up with a target amount after fees. Optionally \
         chains into registering a name once the funds land."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "amount_eth": {
                    "type": "string",
                    "description": "Amount needed on the destination chain, in ETH, e.g. \"0.05\""
                },
                "then_register": {
                    "type": "string",
                    "description": "ENS name to register once bridged funds land; the target amount is derived from its cost"
                },
                "duration_years": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Registration duration for then_register (default 1)"
                }
            }
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError> {
        let args: PrepareBridgeArgs = parse_args(input)?;
        let identity = &ctx.identity;

        if ctx
            .flows
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
            .is_some()
            || ctx.flows.has_any_active_flow(&identity.user_id).await?
        {
            return Ok(ToolOutcome::fail(
                "another operation is already in progress; cancel it before bridging",
            ));
        }

        let wallets = ctx.chain.wallets(&identity.user_id).await?;
        let Some(wallet) = wallets.first().copied() else {
            return Ok(ToolOutcome::fail(
                "no wallet is linked to your account; connect one before bridging",
            ));
        };

        // Derive the destination target: either an explicit amount or the
        // cost of the registration this bridge is funding, plus a gas buffer.
        let (target_wei, next_action) = match (&args.amount_eth, &args.then_register) {
            (_, Some(name)) => {
                let years = args.duration_years.unwrap_or(1).max(1);
                let duration_secs = u64::from(years) * SECONDS_PER_YEAR;
                let status = ctx.chain.name_status(name, duration_secs).await?;
                if !status.available {
                    return Ok(ToolOutcome::fail(format!(
                        "{name} is not available, so there is nothing to bridge for"
                    )));
                }
                let buffer = U256::from(ctx.bridge_config.dest_gas_buffer_wei);
                (
                    status.rent_price_wei + buffer,
                    Some(NextAction::Registration {
                        name: name.clone(),
                        duration_secs,
                    }),
                )
            }
            (Some(amount), None) => (parse_ether(amount)?, None),
            (None, None) => {
                return Ok(ToolOutcome::fail(
                    "specify either an amount to bridge or a name to bridge for",
                ));
            }
        };

        let from_chain_id = ctx.chain_config.l2_chain_id;
        let to_chain_id = ctx.chain_config.chain_id;
        let balance = ctx.chain.balance(wallet, from_chain_id).await?;

        // Estimate source gas against a provisional encoding at the naive
        // target; the final input only changes the value field.
        let provisional_call = ctx
            .chain
            .encode(&ChainOp::Bridge {
                amount_wei: target_wei,
                to_chain_id,
                recipient: wallet,
            })
            .await?;
        let source_gas = ctx.chain.estimate_gas(&provisional_call).await?;

        let quoter = ChainQuoter {
            chain: ctx.chain.clone(),
            to_chain_id,
        };
        let plan = solve_bridge_amount(
            &quoter,
            target_wei,
            balance,
            source_gas,
            ctx.bridge_config.fee_margin_percent,
        )
        .await?;

        let bridge_call = ctx
            .chain
            .encode(&ChainOp::Bridge {
                amount_wei: plan.input_wei,
                to_chain_id,
                recipient: wallet,
            })
            .await?;

        let data = BridgeData {
            target_wei,
            input_wei: plan.input_wei,
            quoted_output_wei: plan.quoted_output_wei,
            from_chain_id,
            to_chain_id,
            tx_hash: None,
            next_action: next_action.clone(),
        };
        ctx.flows
            .set_active_flow(&Flow::new(identity, FlowData::Bridge(data)))
            .await?;
        ctx.flows
            .update_flow_status(
                &identity.user_id,
                &identity.conversation_id,
                FlowStatus::AwaitingBridge,
            )
            .await?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let tx_request = bridge_call.into_transaction_request(
            request_id.clone(),
            format!("Bridge {} ETH", format_ether(plan.input_wei)),
            wallet,
            identity.user_id.clone(),
        );
        ctx.surface
            .send_interaction(
                &identity.channel_id,
                &identity.conversation_id,
                InteractionRequest::Transaction(tx_request),
            )
            .await?;

        let chained = match &next_action {
            Some(NextAction::Registration { name, .. }) => {
                format!(" Once the funds land we'll continue with registering {name}.")
            }
            None => String::new(),
        };
        Ok(ToolOutcome::suspend(
            serde_json::json!({
                "input_eth": format_ether(plan.input_wei),
                "expected_output_eth": format_ether(plan.quoted_output_wei),
                "fee_eth": format_ether(plan.fee_wei),
                "target_eth": format_ether(target_wei),
            }),
            format!(
                "Bridging {} ETH (fee {} ETH) so {} ETH arrives on the destination \
                 chain. Please sign the bridge transaction.{}",
                format_ether(plan.input_wei),
                format_ether(plan.fee_wei),
                format_ether(plan.quoted_output_wei),
                chained,
            ),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}
