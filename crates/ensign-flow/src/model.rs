// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable record of one in-flight multi-step operation.
//!
//! `Flow` is what survives between request/response cycles: identity,
//! status, per-type payload, and timestamps. Payload fields fill in
//! progressively as steps complete (commitment after wallet selection,
//! transaction hashes as signatures land).

use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use ensign_core::traits::chain::CommitmentParams;
use ensign_core::types::{ChannelId, ConversationId, Identity, UserId, now_ms};

use crate::status::{FlowStatus, FlowType};

/// One in-flight multi-step operation, keyed by `(user, conversation)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub channel_id: ChannelId,
    pub status: FlowStatus,
    pub data: FlowData,
    /// Creation time, ms since epoch.
    pub started_at: i64,
    /// Last mutation time, ms since epoch. Always >= `started_at`.
    pub updated_at: i64,
}

impl Flow {
    /// Creates a flow in the initial status with fresh timestamps.
    pub fn new(identity: &Identity, data: FlowData) -> Self {
        let now = now_ms();
        Self {
            user_id: identity.user_id.clone(),
            conversation_id: identity.conversation_id.clone(),
            channel_id: identity.channel_id.clone(),
            status: data.flow_type().initial(),
            data,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn flow_type(&self) -> FlowType {
        self.data.flow_type()
    }
}

/// Per-type payload, discriminated by the `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowData {
    Registration(RegistrationData),
    Bridge(BridgeData),
    Subdomain(SubdomainData),
    Transfer(TransferData),
    Renewal(RenewalData),
}

impl FlowData {
    pub fn flow_type(&self) -> FlowType {
        match self {
            FlowData::Registration(_) => FlowType::Registration,
            FlowData::Bridge(_) => FlowType::Bridge,
            FlowData::Subdomain(_) => FlowType::Subdomain,
            FlowData::Transfer(_) => FlowType::Transfer,
            FlowData::Renewal(_) => FlowType::Renewal,
        }
    }

    pub fn as_registration(&self) -> Option<&RegistrationData> {
        match self {
            FlowData::Registration(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_registration_mut(&mut self) -> Option<&mut RegistrationData> {
        match self {
            FlowData::Registration(d) => Some(d),
            _ => None,
        }
    }
}

/// The hidden commitment of a commit-reveal registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commitment {
    /// Parameters that must be revealed verbatim by the register call.
    pub params: CommitmentParams,
    /// Protocol commitment hash sent in the commit transaction.
    pub hash: H256,
    /// Domain rent for the requested duration.
    pub price_wei: U256,
}

/// Cost breakdown shown to the user before each signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub commit_gas_wei: U256,
    pub register_gas_wei: U256,
    /// True while `register_gas_wei` is the provisional pre-wait estimate;
    /// flipped to false when the post-wait re-estimate replaces it.
    pub is_register_estimate: bool,
}

impl CostBreakdown {
    /// Total outlay: rent plus both gas legs.
    pub fn total_wei(&self, price_wei: U256) -> U256 {
        price_wei + self.commit_gas_wei + self.register_gas_wei
    }
}

/// Registration flow payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationData {
    pub name: String,
    pub duration_secs: u64,
    /// Set once a signing wallet is known and the commitment is built.
    pub commitment: Option<Commitment>,
    pub costs: Option<CostBreakdown>,
    /// The wallet that signs both transactions. Must equal the commitment
    /// owner; a mismatch is fatal.
    pub signer: Option<Address>,
    pub commit_tx_hash: Option<String>,
    pub register_tx_hash: Option<String>,
    /// When the commit transaction confirmed, ms since epoch. The
    /// commit-reveal wait deadline is re-derivable from this.
    pub commit_confirmed_at: Option<i64>,
}

impl RegistrationData {
    pub fn new(name: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            name: name.into(),
            duration_secs,
            commitment: None,
            costs: None,
            signer: None,
            commit_tx_hash: None,
            register_tx_hash: None,
            commit_confirmed_at: None,
        }
    }
}

/// What to do once bridged funds land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextAction {
    Registration { name: String, duration_secs: u64 },
}

/// Bridge flow payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeData {
    /// Amount that must arrive on the destination chain.
    pub target_wei: U256,
    /// Solver-computed source-side input.
    pub input_wei: U256,
    /// Output promised by the confirming quote.
    pub quoted_output_wei: U256,
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub tx_hash: Option<String>,
    pub next_action: Option<NextAction>,
}

/// Subdomain flow payload.
///
/// `total_steps` is computed from the ownership check: three steps when the
/// final owner differs from the creating wallet (create with caller as
/// temporary owner, set the resolved address, transfer ownership), two when
/// they are the same.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainData {
    pub parent: String,
    pub label: String,
    pub recipient: Address,
    /// The wallet creating the subdomain (parent owner).
    pub creator: Address,
    pub total_steps: u8,
    /// 1-based index of the step currently in flight.
    pub current_step: u8,
    pub tx_hashes: Vec<String>,
}

impl SubdomainData {
    /// Step count is an output of the recipient check, not an input.
    pub fn steps_for(creator: Address, recipient: Address) -> u8 {
        if creator == recipient { 2 } else { 3 }
    }
}

/// Transfer flow payload. Single step, always irreversible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferData {
    pub name: String,
    pub recipient: Address,
    /// Always true; surfaced to the user before signing.
    pub irreversible: bool,
    pub tx_hash: Option<String>,
}

/// Renewal flow payload. Single rent-extension transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalData {
    pub name: String,
    pub duration_secs: u64,
    pub price_wei: U256,
    pub tx_hash: Option<String>,
}
