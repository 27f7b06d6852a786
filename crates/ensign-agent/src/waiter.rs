// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commit-reveal waiter.
//!
//! After a commit transaction confirms, a single-shot continuation fires at
//! `max(protocol minimum, configured floor) + safety margin`. On firing it
//! revalidates the flow (the user may have cancelled, or the record expired
//! -- both are silent no-ops), replaces the provisional register gas
//! estimate with a real post-wait one, advances the flow to the
//! ready-for-final-confirmation status, and notifies the chat surface with
//! the updated total.
//!
//! The deadline is re-derivable from the flow's persisted
//! `commit_confirmed_at`, so a restarted process can recover every pending
//! wait by scanning flows instead of trusting in-memory timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ensign_config::ChainConfig;
use ensign_core::traits::chain::ChainOp;
use ensign_core::types::{Identity, format_ether, now_ms};
use ensign_core::{ChainClient, ChatSurface, EnsignError};
use ensign_flow::{FlowRepository, FlowStatus, parse_flow_key};

use crate::keylock::KeyedLocks;
use crate::session::{SessionStatus, SessionStore};

/// Schedules and fires post-commit continuations.
pub struct CommitWaiter {
    flows: Arc<FlowRepository>,
    sessions: Arc<SessionStore>,
    chain: Arc<dyn ChainClient>,
    surface: Arc<dyn ChatSurface>,
    /// Shared with the agent so a firing continuation serializes with any
    /// in-flight turn for the same key.
    locks: Arc<KeyedLocks>,
    config: ChainConfig,
}

impl CommitWaiter {
    pub fn new(
        flows: Arc<FlowRepository>,
        sessions: Arc<SessionStore>,
        chain: Arc<dyn ChainClient>,
        surface: Arc<dyn ChatSurface>,
        locks: Arc<KeyedLocks>,
        config: ChainConfig,
    ) -> Self {
        Self {
            flows,
            sessions,
            chain,
            surface,
            locks,
            config,
        }
    }

    /// The full wait: the larger of the protocol minimum and the configured
    /// floor, plus the safety margin.
    pub fn wait_delay(&self) -> Duration {
        let protocol = self.chain.min_commitment_age();
        let floor = Duration::from_secs(self.config.min_wait_secs);
        protocol.max(floor) + Duration::from_secs(self.config.wait_margin_secs)
    }

    /// Schedules the continuation for a freshly confirmed commit.
    pub fn schedule(self: &Arc<Self>, identity: Identity) -> JoinHandle<()> {
        self.schedule_after(identity, self.wait_delay())
    }

    /// Schedules the continuation with an explicit remaining delay (used by
    /// restart recovery).
    pub fn schedule_after(self: &Arc<Self>, identity: Identity, delay: Duration) -> JoinHandle<()> {
        let waiter = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            waiter.fire(&identity).await;
        })
    }

    /// Runs the continuation once. All failures are logged and swallowed --
    /// this is a background task with nobody to report to.
    pub async fn fire(&self, identity: &Identity) {
        let _guard = self
            .locks
            .acquire(&identity.user_id, &identity.conversation_id)
            .await;
        match self.try_fire(identity).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    user = %identity.user_id.0,
                    "commit wait fired with no matching flow; nothing to do"
                );
            }
            Err(e) => {
                warn!(error = %e, user = %identity.user_id.0, "commit wait continuation failed");
            }
        }
    }

    async fn try_fire(&self, identity: &Identity) -> Result<bool, EnsignError> {
        let Some(flow) = self
            .flows
            .get_active_flow(&identity.user_id, &identity.conversation_id)
            .await?
        else {
            return Ok(false);
        };
        let Some(reg) = flow.data.as_registration() else {
            return Ok(false);
        };
        if flow.status != FlowStatus::Step1Pending || reg.commit_confirmed_at.is_none() {
            return Ok(false);
        }
        let Some(commitment) = reg.commitment.clone() else {
            return Ok(false);
        };
        let name = reg.name.clone();

        // Replace the provisional register estimate with a post-wait one.
        let register_call = self
            .chain
            .encode(&ChainOp::Register {
                params: commitment.params.clone(),
                price_wei: commitment.price_wei,
            })
            .await?;
        let register_gas = self.chain.estimate_gas(&register_call).await?;

        let updated = self
            .flows
            .update_flow_data(&identity.user_id, &identity.conversation_id, move |d| {
                if let Some(r) = d.as_registration_mut() {
                    if let Some(costs) = r.costs.as_mut() {
                        costs.register_gas_wei = register_gas;
                        costs.is_register_estimate = false;
                    }
                }
            })
            .await?;
        self.flows
            .update_flow_status(
                &identity.user_id,
                &identity.conversation_id,
                FlowStatus::Step1Complete,
            )
            .await?;

        // Release the session from its waiting period.
        if let Some(mut session) = self
            .sessions
            .load(&identity.user_id, &identity.conversation_id)
            .await?
        {
            if session.status == SessionStatus::WaitingPeriod {
                session.status = SessionStatus::Active;
                self.sessions.save(&session).await?;
            }
        }

        let total = updated
            .data
            .as_registration()
            .and_then(|r| r.costs.as_ref().map(|c| c.total_wei(commitment.price_wei)));
        let total_text = total
            .map(|t| format!(" Updated total cost: {} ETH.", format_ether(t)))
            .unwrap_or_default();
        self.surface
            .send_message(
                &identity.channel_id,
                &identity.conversation_id,
                &format!(
                    "The commitment wait for {name} is over.{total_text} Say \
                     \"finish the registration\" and I'll prepare the final transaction."
                ),
            )
            .await?;
        Ok(true)
    }

    /// Restart recovery: scan every live flow and re-schedule continuations
    /// for registrations whose commit confirmed but whose wait has not been
    /// consumed. Returns how many were scheduled.
    pub async fn recover_pending_waits(self: &Arc<Self>) -> Result<usize, EnsignError> {
        let keys = self.flows.all_flow_keys().await?;
        let delay = self.wait_delay();
        let mut scheduled = 0usize;
        for key in keys {
            let Some((user, conversation)) = parse_flow_key(&key) else {
                continue;
            };
            let Some(flow) = self.flows.get_active_flow(&user, &conversation).await? else {
                continue;
            };
            let Some(reg) = flow.data.as_registration() else {
                continue;
            };
            let Some(confirmed_at) = reg.commit_confirmed_at else {
                continue;
            };
            if flow.status != FlowStatus::Step1Pending {
                continue;
            }
            let deadline = confirmed_at + delay.as_millis() as i64;
            let remaining_ms = (deadline - now_ms()).max(0) as u64;
            let identity = Identity {
                user_id: flow.user_id.clone(),
                conversation_id: flow.conversation_id.clone(),
                channel_id: flow.channel_id.clone(),
            };
            debug!(
                user = %identity.user_id.0,
                remaining_ms,
                "recovering pending commit wait"
            );
            self.schedule_after(identity, Duration::from_millis(remaining_ms));
            scheduled += 1;
        }
        Ok(scheduled)
    }
}
