// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commit-reveal registration tools.
//!
//! `prepare_registration` drives everything up to the commit signature:
//! one-flow-per-user guard, availability check, wallet resolution (with a
//! selection form when the user has several), commitment construction, gas
//! estimation, flow persistence, and the commit signature request.
//!
//! `submit_registration` is the post-wait step: it validates that the
//! mandatory wait has elapsed and that the commitment owner matches the
//! signing wallet, then requests the register signature.

use async_trait::async_trait;
use ethers_core::types::H256;
use serde::Deserialize;
use tracing::warn;

use ensign_core::EnsignError;
use ensign_core::traits::chain::{ChainOp, CommitmentParams};
use ensign_core::traits::surface::{FormComponent, FormRequest, InteractionRequest};
use ensign_core::types::format_ether;
use ensign_flow::{
    Commitment, CostBreakdown, Flow, FlowData, FlowStatus, FlowType, RegistrationData,
};

use crate::session::ExpectedAction;

use super::{AgentTool, SECONDS_PER_YEAR, ToolContext, ToolOutcome, parse_args};

pub struct PrepareRegistrationTool;

#[derive(Debug, Deserialize)]
struct PrepareRegistrationArgs {
    name: String,
    duration_years: Option<u32>,
}

#[async_trait]
impl AgentTool for PrepareRegistrationTool {
    fn name(&self) -> &str {
        "prepare_registration"
    }

    fn description(&self) -> &str {
        "Start registering an available ENS name: builds the commit-reveal \
         commitment, estimates costs, and asks the user to sign the commit \
         transaction. Registration finishes later with submit_registration."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Full ENS name to register, e.g. alice.eth"
                },
                "duration_years": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Registration duration in years (default 1)"
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
        let args: PrepareRegistrationArgs = parse_args(input)?;
        let years = args.duration_years.unwrap_or(1).max(1);
        let duration_secs = u64::from(years) * SECONDS_PER_YEAR;
        let identity = &ctx.identity;

        // One money-moving operation at a time. A flow already parked in
        // wallet selection for this same name is the continuation case.
        let existing = ctx
            .flows
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?;
        let continuing = match &existing {
            Some(flow)
                if flow.flow_type() == FlowType::Registration
                    && matches!(
                        flow.status,
                        FlowStatus::Initiated | FlowStatus::AwaitingWallet
                    )
                    && flow
                        .data
                        .as_registration()
                        .is_some_and(|r| r.name == args.name) =>
            {
                true
            }
            Some(_) => {
                return Ok(ToolOutcome::fail(
                    "another operation is already in progress in this conversation; \
                     cancel it before starting a new one",
                ));
            }
            None => {
                if ctx.flows.has_any_active_flow(&identity.user_id).await? {
                    return Ok(ToolOutcome::fail(
                        "you already have an operation in progress in another \
                         conversation; finish or cancel it first",
                    ));
                }
                false
            }
        };

        let status = ctx.chain.name_status(&args.name, duration_secs).await?;
        if !status.available {
            return Ok(ToolOutcome::fail(format!(
                "{} is not available for registration",
                args.name
            )));
        }

        // Resolve the signing wallet; several linked wallets means the user
        // must pick one first.
        let chosen = existing
            .as_ref()
            .and_then(|f| f.data.as_registration())
            .and_then(|r| r.signer);
        let wallet = match chosen {
            Some(wallet) => wallet,
            None => {
                let wallets = ctx.chain.wallets(&identity.user_id).await?;
                match wallets.len() {
                    0 => {
                        return Ok(ToolOutcome::fail(
                            "no wallet is linked to your account; connect one before registering",
                        ));
                    }
                    1 => wallets[0],
                    _ => {
                        let request_id = uuid::Uuid::new_v4().to_string();
                        if !continuing {
                            let flow = Flow::new(
                                identity,
                                FlowData::Registration(RegistrationData::new(
                                    args.name.as_str(),
                                    duration_secs,
                                )),
                            );
                            ctx.flows.set_active_flow(&flow).await?;
                            ctx.flows
                                .update_flow_status(
                                    &identity.user_id,
                                    &identity.conversation_id,
                                    FlowStatus::AwaitingWallet,
                                )
                                .await?;
                        }
                        let form = InteractionRequest::Form(FormRequest {
                            id: request_id.clone(),
                            title: format!("Choose the wallet to register {}", args.name),
                            components: vec![FormComponent {
                                id: "wallet".into(),
                                label: "Wallet".into(),
                                options: wallets.iter().map(|w| format!("{w:?}")).collect(),
                            }],
                            recipient: identity.user_id.clone(),
                        });
                        ctx.surface
                            .send_interaction(
                                &identity.channel_id,
                                &identity.conversation_id,
                                form,
                            )
                            .await?;
                        return Ok(ToolOutcome::suspend(
                            serde_json::json!({
                                "name": args.name,
                                "awaiting": "wallet_selection",
                            }),
                            format!(
                                "You have several linked wallets -- pick the one that \
                                 should own {}.",
                                args.name
                            ),
                            ExpectedAction::SelectWallet { request_id },
                        ));
                    }
                }
            }
        };

        // Build the hidden commitment. The owner embedded here must be the
        // wallet that will sign the register transaction.
        let secret = H256::from(rand::random::<[u8; 32]>());
        let params = CommitmentParams {
            name: args.name.clone(),
            owner: wallet,
            duration_secs,
            secret,
        };
        let commitment_hash = ctx.chain.commitment_hash(&params).await?;

        let commit_call = ctx
            .chain
            .encode(&ChainOp::Commit {
                commitment_hash,
            })
            .await?;
        let commit_gas = ctx.chain.estimate_gas(&commit_call).await?;

        // The register estimate is provisional until the post-wait
        // re-estimate replaces it.
        let register_call = ctx
            .chain
            .encode(&ChainOp::Register {
                params: params.clone(),
                price_wei: status.rent_price_wei,
            })
            .await?;
        let register_gas = ctx.chain.estimate_gas(&register_call).await?;

        let costs = CostBreakdown {
            commit_gas_wei: commit_gas,
            register_gas_wei: register_gas,
            is_register_estimate: true,
        };
        let total = costs.total_wei(status.rent_price_wei);

        let mut data = RegistrationData::new(args.name.as_str(), duration_secs);
        data.commitment = Some(Commitment {
            params,
            hash: commitment_hash,
            price_wei: status.rent_price_wei,
        });
        data.costs = Some(costs);
        data.signer = Some(wallet);

        if continuing {
            let filled = data.clone();
            ctx.flows
                .update_flow_data(&identity.user_id, &identity.conversation_id, move |d| {
                    *d = FlowData::Registration(filled);
                })
                .await?;
        } else {
            ctx.flows
                .set_active_flow(&Flow::new(identity, FlowData::Registration(data)))
                .await?;
        }
        ctx.flows
            .update_flow_status(
                &identity.user_id,
                &identity.conversation_id,
                FlowStatus::Step1Pending,
            )
            .await?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let tx_request = commit_call.into_transaction_request(
            request_id.clone(),
            format!("Commit for {}", args.name),
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
                "commit_gas_eth": format_ether(commit_gas),
                "register_gas_eth": format_ether(register_gas),
                "register_gas_is_estimate": true,
                "total_eth": format_ether(total),
            }),
            format!(
                "Registering {} for {} year(s) costs about {} ETH total \
                 (rent {} ETH plus gas). Please sign the commit transaction to start.",
                args.name,
                years,
                format_ether(total),
                format_ether(status.rent_price_wei),
            ),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}

pub struct SubmitRegistrationTool;

#[async_trait]
impl AgentTool for SubmitRegistrationTool {
    fn name(&self) -> &str {
        "submit_registration"
    }

    fn description(&self) -> &str {
        "Finish a registration whose commit wait has elapsed: asks the user \
         to sign the final register transaction."
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
            return Ok(ToolOutcome::fail("no registration is in progress"));
        };

        let Some(reg) = flow.data.as_registration() else {
            return Ok(ToolOutcome::fail(
                "the operation in progress is not a registration",
            ));
        };
        if flow.status != FlowStatus::Step1Complete {
            return Ok(ToolOutcome::fail(format!(
                "the registration is not ready to finalize yet (status: {})",
                flow.status
            )));
        }
        let (Some(commitment), Some(costs), Some(signer)) =
            (&reg.commitment, &reg.costs, reg.signer)
        else {
            return Err(EnsignError::Internal(
                "registration flow in step1_complete without commitment data".into(),
            ));
        };

        // The commitment owner must be the wallet signing the register
        // transaction. Never silently correct a mismatch.
        if commitment.params.owner != signer {
            warn!(
                name = reg.name.as_str(),
                owner = ?commitment.params.owner,
                signer = ?signer,
                "commitment owner does not match signing wallet"
            );
            ctx.flows
                .update_flow_status(
                    &identity.user_id,
                    &identity.conversation_id,
                    FlowStatus::Failed,
                )
                .await?;
            ctx.flows
                .clear_active_flow(&identity.user_id, &identity.conversation_id)
                .await?;
            return Ok(ToolOutcome::fail(format!(
                "the commitment was made for owner {:?} but the signing wallet is {:?}; \
                 the registration cannot continue and has been aborted",
                commitment.params.owner, signer
            )));
        }

        let register_call = ctx
            .chain
            .encode(&ChainOp::Register {
                params: commitment.params.clone(),
                price_wei: commitment.price_wei,
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
        let total = costs.total_wei(commitment.price_wei);
        let tx_request = register_call.into_transaction_request(
            request_id.clone(),
            format!("Register {}", reg.name),
            signer,
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
                "name": reg.name,
                "register_gas_eth": format_ether(costs.register_gas_wei),
                "register_gas_is_estimate": costs.is_register_estimate,
                "total_eth": format_ether(total),
            }),
            format!(
                "The wait is over -- sign the register transaction to make {} yours.",
                reg.name
            ),
            ExpectedAction::SignTransaction { request_id },
        ))
    }
}
