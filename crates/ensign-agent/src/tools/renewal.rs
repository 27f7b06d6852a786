// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name renewal tool. Single rent-extension transaction.

use async_trait::async_trait;
use serde::Deserialize;

use ensign_core::EnsignError;
use ensign_core::traits::chain::ChainOp;
use ensign_core::traits::surface::InteractionRequest;
use ensign_core::types::format_ether;
use ensign_flow::{Flow, FlowData, FlowStatus, RenewalData};

use crate::session::ExpectedAction;

use super::{AgentTool, SECONDS_PER_YEAR, ToolContext, ToolOutcome, parse_args};

pub struct PrepareRenewalTool;

#[derive(Debug, Deserialize)]
struct PrepareRenewalArgs {
    name: String,
    duration_years: Option<u32>,
}

#[async_trait]
impl AgentTool for PrepareRenewalTool {
    fn name(&self) -> &str {
        "prepare_renewal"
    }

    fn description(&self) -> &str {
        "Extend the registration of an existing name by paying rent for \
         additional years."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Registered name to renew, e.g. alice.eth"
                },
                "duration_years": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "How many years to extend (default 1)"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError> {
        let args: PrepareRenewalArgs = parse_args(input)?;
        let years = args.duration_years.unwrap_or(1).max(1);
        let duration_secs = u64::from(years) * SECONDS_PER_YEAR;
        let identity = &ctx.identity;

        if ctx
            .flows
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
            .is_some()
            || ctx.flows.has_any_active_flow(&identity.user_id).await?
        {
            return Ok(ToolOutcome::fail(
                "another operation is already in progress; cancel it first",
            ));
        }

        let wallets = ctx.chain.wallets(&identity.user_id).await?;
        let Some(wallet) = wallets.first().copied() else {
            return Ok(ToolOutcome::fail(
                "no wallet is linked to your account; connect one first",
            ));
        };

        let status = ctx.chain.name_status(&args.name, duration_secs).await?;
        if status.available {
            return Ok(ToolOutcome::fail(format!(
                "{} is not registered, so it cannot be renewed",
                args.name
            )));
        }

        let call = ctx
            .chain
            .encode(&ChainOp::Renew {
                name: args.name.clone(),
                duration_secs,
                price_wei: status.rent_price_wei,
            })
            .await?;

        let data = RenewalData {
            name: args.name.clone(),
            duration_secs,
            price_wei: status.rent_price_wei,
            tx_hash: None,
        };
        ctx.flows
            .set_active_flow(&Flow::new(identity, FlowData::Renewal(data)))
            .await?;
        ctx.flows
            .update_flow_status(
                &identity.user_id,
                &identity.conversation_id,
                FlowStatus::Step1Pending,
            )
            .await?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let tx_request = call.into_transaction_request(
            request_id.clone(),
            format!("Renew {}", args.name),
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

        Ok(ToolOutcome::suspend(
            serde_json::json!({
                "name": args.name,
                "duration_years": years,
                "price_eth": format_ether(status.rent_price_wei),
            }),
            format!(
                "Renewing {} for {} year(s) costs {} ETH. Please sign the renewal \
                 transaction.",
                args.name,
                years,
                format_ether(status.rent_price_wei),
            ),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}
