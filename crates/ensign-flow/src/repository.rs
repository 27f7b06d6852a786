// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow CRUD over the secure state store.
//!
//! One active flow per `(user, conversation)`; a new write replaces any
//! existing record. Every mutation bumps `updated_at` and refreshes the TTL.
//! Callers are expected to hold the per-key lock around read-modify-write
//! sequences; the repository itself is not atomic across calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use ensign_core::types::{ConversationId, UserId, now_ms};
use ensign_core::EnsignError;
use ensign_store::SecureStateStore;

use crate::model::{Flow, FlowData};
use crate::status::FlowStatus;

const FLOW_NAMESPACE: &str = "flow";

/// Storage key for a flow record.
pub fn flow_key(user: &UserId, conversation: &ConversationId) -> String {
    format!("{FLOW_NAMESPACE}:{}:{}", user.0, conversation.0)
}

fn user_prefix(user: &UserId) -> String {
    format!("{FLOW_NAMESPACE}:{}:", user.0)
}

/// Splits a flow key back into its identity pair.
///
/// Platform ids never contain `:`; the first two separators are structural.
pub fn parse_flow_key(key: &str) -> Option<(UserId, ConversationId)> {
    let mut parts = key.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(FLOW_NAMESPACE), Some(user), Some(conv)) if !user.is_empty() && !conv.is_empty() => {
            Some((UserId(user.to_string()), ConversationId(conv.to_string())))
        }
        _ => None,
    }
}

/// CRUD over flow records, specialized from the secure store.
pub struct FlowRepository {
    store: Arc<SecureStateStore>,
    ttl: Duration,
}

impl FlowRepository {
    pub fn new(store: Arc<SecureStateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// The active flow for this key, if any.
    pub async fn get_active_flow(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> Result<Option<Flow>, EnsignError> {
        let read = self.store.get::<Flow>(&flow_key(user, conversation)).await?;
        Ok(read.map(|r| {
            if !r.verified {
                debug!(user = %user.0, "flow read without signature verification");
            }
            r.value
        }))
    }

    /// Upserts the flow, replacing any existing record for the key.
    pub async fn set_active_flow(&self, flow: &Flow) -> Result<(), EnsignError> {
        let mut flow = flow.clone();
        flow.updated_at = now_ms();
        self.store
            .set(
                &flow_key(&flow.user_id, &flow.conversation_id),
                &flow,
                self.ttl,
            )
            .await
    }

    /// Mutates the data payload of the existing flow.
    ///
    /// Fails with [`EnsignError::FlowNotFound`] (and performs no write) when
    /// no flow exists for the key. Returns the updated flow.
    pub async fn update_flow_data<F>(
        &self,
        user: &UserId,
        conversation: &ConversationId,
        mutate: F,
    ) -> Result<Flow, EnsignError>
    where
        F: FnOnce(&mut FlowData) + Send,
    {
        let mut flow = self.require_flow(user, conversation).await?;
        mutate(&mut flow.data);
        flow.updated_at = now_ms();
        self.store
            .set(&flow_key(user, conversation), &flow, self.ttl)
            .await?;
        Ok(flow)
    }

    /// Advances the flow status, validating the transition against the
    /// operation type's documented machine.
    pub async fn update_flow_status(
        &self,
        user: &UserId,
        conversation: &ConversationId,
        status: FlowStatus,
    ) -> Result<Flow, EnsignError> {
        let mut flow = self.require_flow(user, conversation).await?;
        let flow_type = flow.flow_type();
        if !flow_type.is_legal_transition(flow.status, status) {
            return Err(EnsignError::IllegalTransition {
                flow_type: flow_type.to_string(),
                from: flow.status.to_string(),
                to: status.to_string(),
            });
        }
        debug!(
            user = %user.0,
            flow_type = %flow_type,
            from = %flow.status,
            to = %status,
            "flow status transition"
        );
        flow.status = status;
        flow.updated_at = now_ms();
        self.store
            .set(&flow_key(user, conversation), &flow, self.ttl)
            .await?;
        Ok(flow)
    }

    /// Removes the active flow for the key, if any.
    pub async fn clear_active_flow(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> Result<(), EnsignError> {
        self.store.delete(&flow_key(user, conversation)).await
    }

    /// Whether the user has an active flow in any conversation. Used to stop
    /// a user from starting two money-moving operations at once.
    pub async fn has_any_active_flow(&self, user: &UserId) -> Result<bool, EnsignError> {
        let keys = self.store.scan_prefix(&user_prefix(user)).await?;
        Ok(!keys.is_empty())
    }

    /// Removes every flow the user has, across conversations. Returns the
    /// number of records removed.
    pub async fn clear_all_user_flows(&self, user: &UserId) -> Result<usize, EnsignError> {
        let keys = self.store.scan_prefix(&user_prefix(user)).await?;
        let count = keys.len();
        for key in keys {
            self.store.delete(&key).await?;
        }
        Ok(count)
    }

    /// Every live flow key, across all users. Used by the wait-recovery scan.
    pub async fn all_flow_keys(&self) -> Result<Vec<String>, EnsignError> {
        self.store.scan_prefix(&format!("{FLOW_NAMESPACE}:")).await
    }

    async fn require_flow(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> Result<Flow, EnsignError> {
        self.get_active_flow(user, conversation)
            .await?
            .ok_or_else(|| EnsignError::FlowNotFound {
                user: user.0.clone(),
                conversation: conversation.0.clone(),
            })
    }
}
