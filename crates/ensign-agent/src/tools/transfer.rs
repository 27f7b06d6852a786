// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name transfer tool. Single step, no waiting period, irreversible.

use async_trait::async_trait;
use ethers_core::types::Address;
use serde::Deserialize;

use ensign_core::EnsignError;
use ensign_core::traits::chain::ChainOp;
use ensign_core::traits::surface::InteractionRequest;
use ensign_flow::{Flow, FlowData, FlowStatus, TransferData};

use crate::session::ExpectedAction;

use super::{AgentTool, ToolContext, ToolOutcome, parse_args};

pub struct PrepareTransferTool;

#[derive(Debug, Deserialize)]
struct PrepareTransferArgs {
    name: String,
    recipient: String,
}

#[async_trait]
impl AgentTool for PrepareTransferTool {
    fn name(&self) -> &str {
        "prepare_transfer"
    }

    fn description(&self) -> &str {
        "Transfer ownership of a name the user owns to another address. \
         Irreversible once signed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name to transfer, e.g. alice.eth"
                },
                "recipient": {
                    "type": "string",
                    "description": "Address receiving ownership"
                }
            },
            "required": ["name", "recipient"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError> {
        let args: PrepareTransferArgs = parse_args(input)?;
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

        let ownership = ctx.chain.name_ownership(&args.name).await?;
        if ownership.owner != wallet {
            return Ok(ToolOutcome::fail(format!(
                "{} is owned by {:?}, not by your wallet {:?}",
                args.name, ownership.owner, wallet
            )));
        }

        let recipient = args.recipient.parse::<Address>().map_err(|_| {
            EnsignError::InvalidInput(format!("not a valid address: {:?}", args.recipient))
        })?;
        if recipient == wallet {
            return Ok(ToolOutcome::fail(
                "that address already owns the name; nothing to transfer",
            ));
        }

        let call = ctx
            .chain
            .encode(&ChainOp::TransferName {
                name: args.name.clone(),
                recipient,
            })
            .await?;

        let data = TransferData {
            name: args.name.clone(),
            recipient,
            irreversible: true,
            tx_hash: None,
        };
        ctx.flows
            .set_active_flow(&Flow::new(identity, FlowData::Transfer(data)))
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
            format!("Transfer {}", args.name),
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
                "recipient": format!("{recipient:?}"),
                "irreversible": true,
            }),
            format!(
                "Transferring {} to {:?}. This is IRREVERSIBLE -- once signed, the \
                 name is gone from your wallet. Sign only if you are sure.",
                args.name, recipient
            ),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_name_and_recipient() {
        let schema = PrepareTransferTool.parameters_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["name", "recipient"]);
    }
}
