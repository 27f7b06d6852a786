// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subdomain creation tools.
//!
//! When the final owner differs from the creating wallet the flow takes
//! three steps (create with the caller as temporary owner, set the resolved
//! address, transfer ownership), collapsing to two when caller and recipient
//! are the same wallet. `total_steps` is an output of that check.
//! `continue_subdomain` issues each subsequent step after the previous
//! transaction confirms.

use async_trait::async_trait;
use ethers_core::types::Address;
use serde::Deserialize;

use ensign_core::EnsignError;
use ensign_core::traits::chain::ChainOp;
use ensign_core::traits::surface::InteractionRequest;
use ensign_flow::{Flow, FlowData, FlowStatus, SubdomainData};

use crate::session::ExpectedAction;

use super::{AgentTool, ToolContext, ToolOutcome, parse_args};

pub struct PrepareSubdomainTool;

#[derive(Debug, Deserialize)]
struct PrepareSubdomainArgs {
    parent: String,
    label: String,
    /// Final owner address; defaults to the creating wallet.
    recipient: Option<String>,
}

/// The chain op for a given 1-based subdomain step.
pub(crate) fn step_op(data: &SubdomainData, step: u8) -> Result<ChainOp, EnsignError> {
    match step {
        1 => Ok(ChainOp::CreateSubdomain {
            parent: data.parent.clone(),
            label: data.label.clone(),
            owner: data.creator,
        }),
        2 => Ok(ChainOp::SetSubdomainAddress {
            parent: data.parent.clone(),
            label: data.label.clone(),
            target: data.recipient,
        }),
        3 => Ok(ChainOp::TransferSubdomain {
            parent: data.parent.clone(),
            label: data.label.clone(),
            recipient: data.recipient,
        }),
        n => Err(EnsignError::Internal(format!(
            "subdomain flow has no step {n}"
        ))),
    }
}

pub(crate) fn step_title(data: &SubdomainData, step: u8) -> String {
    let name = format!("{}.{}", data.label, data.parent);
    match step {
        1 => format!("Create {name}"),
        2 => format!("Set address for {name}"),
        _ => format!("Transfer {name}"),
    }
}

#[async_trait]
impl AgentTool for PrepareSubdomainTool {
    fn name(&self) -> &str {
        "prepare_subdomain"
    }

    fn description(&self) -> &str {
        "Create a subdomain under a name the user owns, optionally handing \
         ownership to another address. Multi-step: each transaction is signed \
         separately."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "parent": {
                    "type": "string",
                    "description": "Parent name owned by the user, e.g. alice.eth"
                },
                "label": {
                    "type": "string",
                    "description": "Subdomain label, e.g. \"pay\" for pay.alice.eth"
                },
                "recipient": {
                    "type": "string",
                    "description": "Address that should own the subdomain (defaults to the user's wallet)"
                }
            },
            "required": ["parent", "label"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError> {
        let args: PrepareSubdomainArgs = parse_args(input)?;
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

        let ownership = ctx.chain.name_ownership(&args.parent).await?;
        if ownership.owner != wallet {
            return Ok(ToolOutcome::fail(format!(
                "{} is owned by {:?}, not by your wallet {:?}",
                args.parent, ownership.owner, wallet
            )));
        }

        let recipient = match &args.recipient {
            Some(text) => text.parse::<Address>().map_err(|_| {
                EnsignError::InvalidInput(format!("not a valid address: {text:?}"))
            })?,
            None => wallet,
        };

        if ownership.transfer_locked && recipient != wallet {
            return Ok(ToolOutcome::fail(format!(
                "{} has subdomain transfers locked by a burned fuse; the subdomain \
                 can only stay with your own wallet",
                args.parent
            )));
        }

        let total_steps = SubdomainData::steps_for(wallet, recipient);
        let data = SubdomainData {
            parent: args.parent.clone(),
            label: args.label.clone(),
            recipient,
            creator: wallet,
            total_steps,
            current_step: 1,
            tx_hashes: Vec::new(),
        };

        let call = ctx.chain.encode(&step_op(&data, 1)?).await?;
        let title = step_title(&data, 1);

        ctx.flows
            .set_active_flow(&Flow::new(identity, FlowData::Subdomain(data)))
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
            title,
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
                "subdomain": format!("{}.{}", args.label, args.parent),
                "total_steps": total_steps,
                "current_step": 1,
            }),
            format!(
                "Creating {}.{} takes {} transaction(s). Please sign step 1 (create \
                 the subdomain).",
                args.label, args.parent, total_steps
            ),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}

pub struct ContinueSubdomainTool;

#[async_trait]
impl AgentTool for ContinueSubdomainTool {
    fn name(&self) -> &str {
        "continue_subdomain"
    }

    fn description(&self) -> &str {
        "Issue the next transaction of an in-progress subdomain creation \
         after the previous step confirmed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError> {
        let identity = &ctx.identity;
        let Some(flow) = ctx
            .flows
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            return Ok(ToolOutcome::fail("no subdomain creation is in progress"));
        };
        let FlowData::Subdomain(data) = &flow.data else {
            return Ok(ToolOutcome::fail(
                "the operation in progress is not a subdomain creation",
            ));
        };
        if flow.status != FlowStatus::Step1Complete {
            return Ok(ToolOutcome::fail(format!(
                "the previous step has not confirmed yet (status: {})",
                flow.status
            )));
        }

        let next_step = data.current_step + 1;
        if next_step > data.total_steps {
            return Ok(ToolOutcome::fail("all subdomain steps are already done"));
        }

        let call = ctx.chain.encode(&step_op(data, next_step)?).await?;
        let title = step_title(data, next_step);
        let wallet = data.creator;
        let (label, parent, total) = (data.label.clone(), data.parent.clone(), data.total_steps);

        ctx.flows
            .update_flow_data(&identity.user_id, &identity.conversation_id, move |d| {
                if let FlowData::Subdomain(sub) = d {
                    sub.current_step = next_step;
                }
            })
            .await?;
        ctx.flows
            .update_flow_status(
                &identity.user_id,
                &identity.conversation_id,
                FlowStatus::Step2Pending,
            )
            .await?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let tx_request = call.into_transaction_request(
            request_id.clone(),
            title,
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
                "subdomain": format!("{label}.{parent}"),
                "current_step": next_step,
                "total_steps": total,
            }),
            format!("Please sign step {next_step} of {total} for {label}.{parent}."),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}
