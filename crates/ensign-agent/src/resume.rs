// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resume entry points for out-of-band action results.
//!
//! Signature results and form answers arrive here, not as return values of
//! the sends that requested them. Each resume loads the session, applies the
//! flow-side effect of the outcome, synthesizes a plain-language user-role
//! message describing what happened (keeping the model's context
//! self-consistent), clears the pending marker, and re-enters the turn loop.
//!
//! A pending marker whose flow no longer exists fails closed: the marker is
//! cleared, the user is told, nothing is guessed.

use std::collections::HashMap;

use ethers_core::types::Address;
use tracing::warn;

use ensign_core::EnsignError;
use ensign_core::types::{Identity, now_ms};
use ensign_flow::{Flow, FlowData, FlowStatus};

use crate::session::{ExpectedAction, MessageRole, SessionStatus};
use crate::turn::{Agent, RunOutcome};

/// Result of a transaction signature request.
#[derive(Debug, Clone)]
pub enum SignatureOutcome {
    /// Signed, submitted, and confirmed on chain.
    Success { tx_hash: String },
    /// The user declined to sign.
    Rejected { reason: Option<String> },
}

/// Answer to a form interaction request.
#[derive(Debug, Clone)]
pub struct FormResponse {
    pub request_id: String,
    /// Component id -> selected value.
    pub values: HashMap<String, String>,
}

impl Agent {
    /// Resumes the conversation with the result of a signature request.
    pub async fn handle_signature_result(
        &self,
        identity: &Identity,
        outcome: SignatureOutcome,
    ) -> Result<RunOutcome, EnsignError> {
        let _guard = self
            .locks()
            .acquire(&identity.user_id, &identity.conversation_id)
            .await;

        let Some(mut session) = self
            .sessions()
            .load(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "There's no active session to resume -- send a new message to start over.",
                )
                .await?;
            return Ok(RunOutcome::NoSession);
        };
        let Some(pending) = session.pending_tool_call.take() else {
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "Nothing is awaiting a signature right now.",
                )
                .await?;
            return Ok(RunOutcome::NoSession);
        };

        // The pending marker must reference a live flow.
        let Some(flow) = self
            .flows()
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            warn!(
                user = %identity.user_id.0,
                tool = pending.tool_name.as_str(),
                "pending action references a flow that no longer exists"
            );
            session.status = SessionStatus::Active;
            self.sessions().save(&session).await?;
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "That operation is no longer active -- it may have expired. \
                     Please start it again.",
                )
                .await?;
            return Ok(RunOutcome::Failed);
        };

        let synthetic = match outcome {
            SignatureOutcome::Success { tx_hash } => {
                self.apply_signature_success(identity, &flow, &tx_hash).await?
            }
            SignatureOutcome::Rejected { reason } => {
                self.flows()
                    .update_flow_status(
                        &identity.user_id,
                        &identity.conversation_id,
                        FlowStatus::Failed,
                    )
                    .await?;
                self.flows()
                    .clear_active_flow(&identity.user_id, &identity.conversation_id)
                    .await?;
                match reason {
                    Some(reason) => {
                        format!("I declined to sign the transaction: {reason}")
                    }
                    None => "I declined to sign the transaction.".to_string(),
                }
            }
        };

        session.status = SessionStatus::Active;
        session.record(MessageRole::User, synthetic);
        let outcome = self.drive(identity, session).await?;

        // A registration with its commit confirmed sits in the waiting
        // period until the continuation fires.
        if outcome == RunOutcome::Complete {
            self.maybe_enter_waiting_period(identity).await?;
        }
        Ok(outcome)
    }

    /// Resumes the conversation with a form answer (wallet selection).
    pub async fn handle_form_response(
        &self,
        identity: &Identity,
        response: FormResponse,
    ) -> Result<RunOutcome, EnsignError> {
        let _guard = self
            .locks()
            .acquire(&identity.user_id, &identity.conversation_id)
            .await;

        let Some(mut session) = self
            .sessions()
            .load(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "There's no active session to resume -- send a new message to start over.",
                )
                .await?;
            return Ok(RunOutcome::NoSession);
        };
        let Some(pending) = session.pending_tool_call.take() else {
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "No form is awaiting an answer right now.",
                )
                .await?;
            return Ok(RunOutcome::NoSession);
        };

        let ExpectedAction::SelectWallet { request_id } = &pending.expected_action else {
            // Wrong kind of answer; keep the marker and wait for the real one.
            session.pending_tool_call = Some(pending);
            self.sessions().save(&session).await?;
            return Ok(RunOutcome::Failed);
        };
        if *request_id != response.request_id {
            session.pending_tool_call = Some(pending);
            self.sessions().save(&session).await?;
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "That form is no longer active.",
                )
                .await?;
            return Ok(RunOutcome::Failed);
        }

        let Some(flow) = self
            .flows()
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            session.status = SessionStatus::Active;
            self.sessions().save(&session).await?;
            self.surface()
                .send_message(
                    &identity.channel_id,
                    &identity.conversation_id,
                    "That operation is no longer active -- it may have expired. \
                     Please start it again.",
                )
                .await?;
            return Ok(RunOutcome::Failed);
        };

        let synthetic = match (&flow.data, response.values.get("wallet")) {
            (FlowData::Registration(_), Some(selected)) => {
                let wallet = selected.parse::<Address>().map_err(|_| {
                    EnsignError::InvalidInput(format!("not a valid wallet address: {selected:?}"))
                })?;
                self.flows()
                    .update_flow_data(&identity.user_id, &identity.conversation_id, move |d| {
                        if let Some(reg) = d.as_registration_mut() {
                            reg.signer = Some(wallet);
                        }
                    })
                    .await?;
                format!("I'll use wallet {selected} for this registration. Please continue.")
            }
            _ => "I answered the form, but the selection was empty.".to_string(),
        };

        session.status = SessionStatus::Active;
        session.record(MessageRole::User, synthetic);
        self.drive(identity, session).await
    }

    /// Applies the flow-side effect of a confirmed signature and returns the
    /// plain-language account of it for the model.
    async fn apply_signature_success(
        &self,
        identity: &Identity,
        flow: &Flow,
        tx_hash: &str,
    ) -> Result<String, EnsignError> {
        let (user, conv) = (&identity.user_id, &identity.conversation_id);
        match (&flow.data, flow.status) {
            (FlowData::Registration(reg), FlowStatus::Step1Pending) => {
                let hash = tx_hash.to_string();
                let confirmed_at = now_ms();
                self.flows()
                    .update_flow_data(user, conv, move |d| {
                        if let Some(r) = d.as_registration_mut() {
                            r.commit_tx_hash = Some(hash);
                            r.commit_confirmed_at = Some(confirmed_at);
                        }
                    })
                    .await?;
                self.waiter().schedule(identity.clone());
                Ok(format!(
                    "The commit transaction for {} was signed and confirmed ({tx_hash}). \
                     The mandatory wait before the final step has started.",
                    reg.name
                ))
            }
            (FlowData::Registration(reg), FlowStatus::Step2Pending) => {
                let hash = tx_hash.to_string();
                self.flows()
                    .update_flow_data(user, conv, move |d| {
                        if let Some(r) = d.as_registration_mut() {
                            r.register_tx_hash = Some(hash);
                        }
                    })
                    .await?;
                self.flows()
                    .update_flow_status(user, conv, FlowStatus::Complete)
                    .await?;
                self.flows().clear_active_flow(user, conv).await?;
                Ok(format!(
                    "The register transaction confirmed ({tx_hash}). {} is now registered to me.",
                    reg.name
                ))
            }
            (FlowData::Bridge(bridge), FlowStatus::AwaitingBridge) => {
                let hash = tx_hash.to_string();
                self.flows()
                    .update_flow_data(user, conv, move |d| {
                        if let FlowData::Bridge(b) = d {
                            b.tx_hash = Some(hash);
                        }
                    })
                    .await?;
                self.flows()
                    .update_flow_status(user, conv, FlowStatus::Complete)
                    .await?;
                self.flows().clear_active_flow(user, conv).await?;
                let chained = match &bridge.next_action {
                    Some(ensign_flow::NextAction::Registration { name, .. }) => {
                        format!(" Now continue with registering {name}.")
                    }
                    None => String::new(),
                };
                Ok(format!(
                    "The bridge transaction confirmed ({tx_hash}); the funds are on \
                     their way to the destination chain.{chained}"
                ))
            }
            (FlowData::Subdomain(sub), FlowStatus::Step1Pending | FlowStatus::Step2Pending) => {
                let hash = tx_hash.to_string();
                self.flows()
                    .update_flow_data(user, conv, move |d| {
                        if let FlowData::Subdomain(s) = d {
                            s.tx_hashes.push(hash);
                        }
                    })
                    .await?;
                let subdomain = format!("{}.{}", sub.label, sub.parent);
                if sub.current_step >= sub.total_steps {
                    self.flows()
                        .update_flow_status(user, conv, FlowStatus::Complete)
                        .await?;
                    self.flows().clear_active_flow(user, conv).await?;
                    Ok(format!(
                        "Step {} of {} confirmed ({tx_hash}). {subdomain} is fully set up.",
                        sub.current_step, sub.total_steps
                    ))
                } else {
                    self.flows()
                        .update_flow_status(user, conv, FlowStatus::Step1Complete)
                        .await?;
                    Ok(format!(
                        "Step {} of {} for {subdomain} confirmed ({tx_hash}). \
                         Ready for the next step.",
                        sub.current_step, sub.total_steps
                    ))
                }
            }
            (FlowData::Transfer(transfer), FlowStatus::Step1Pending) => {
                let hash = tx_hash.to_string();
                self.flows()
                    .update_flow_data(user, conv, move |d| {
                        if let FlowData::Transfer(t) = d {
                            t.tx_hash = Some(hash);
                        }
                    })
                    .await?;
                self.flows()
                    .update_flow_status(user, conv, FlowStatus::Complete)
                    .await?;
                self.flows().clear_active_flow(user, conv).await?;
                Ok(format!(
                    "The transfer confirmed ({tx_hash}). {} now belongs to {:?}.",
                    transfer.name, transfer.recipient
                ))
            }
            (FlowData::Renewal(renewal), FlowStatus::Step1Pending) => {
                let hash = tx_hash.to_string();
                self.flows()
                    .update_flow_data(user, conv, move |d| {
                        if let FlowData::Renewal(r) = d {
                            r.tx_hash = Some(hash);
                        }
                    })
                    .await?;
                self.flows()
                    .update_flow_status(user, conv, FlowStatus::Complete)
                    .await?;
                self.flows().clear_active_flow(user, conv).await?;
                Ok(format!(
                    "The renewal confirmed ({tx_hash}). {} is extended.",
                    renewal.name
                ))
            }
            (_, status) => {
                warn!(
                    user = %identity.user_id.0,
                    status = %status,
                    "signature result arrived in an unexpected flow status; ignoring"
                );
                Ok(
                    "A signature result arrived, but the operation was not expecting \
                     one; I left everything as it was."
                        .to_string(),
                )
            }
        }
    }

    /// Holds the session in `waiting_period` while a confirmed commit waits
    /// for its continuation.
    async fn maybe_enter_waiting_period(&self, identity: &Identity) -> Result<(), EnsignError> {
        let Some(flow) = self
            .flows()
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            return Ok(());
        };
        let waiting = flow.status == FlowStatus::Step1Pending
            && flow
                .data
                .as_registration()
                .is_some_and(|r| r.commit_confirmed_at.is_some());
        if waiting {
            if let Some(mut session) = self
                .sessions()
                .load(&identity.user_id, &identity.conversation_id)
                .await?
            {
                session.status = SessionStatus::WaitingPeriod;
                self.sessions().save(&session).await?;
            }
        }
        Ok(())
    }
}
