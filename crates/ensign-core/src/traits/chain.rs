// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chain collaborator contract.
//!
//! All chain access is behind this trait as pure typed reads and call
//! encoding. The RPC transport, contract addresses, and ABIs live outside the
//! orchestration core; the trait only fixes the shapes the flows depend on.

use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::error::EnsignError;
use crate::traits::surface::TransactionRequest;
use crate::types::UserId;

/// Availability and pricing for a name over a requested duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameStatus {
    pub available: bool,
    /// Total rent for the requested duration, in wei.
    pub rent_price_wei: U256,
    /// Expiry of the current registration, if registered (ms since epoch).
    pub expires_at: Option<i64>,
    /// Current registrant, if registered.
    pub owner: Option<Address>,
}

/// Resolved ownership of a name.
///
/// The collaborator resolves wrapped-name indirection: `owner` is always the
/// actual controlling wallet, and `wrapped` records whether an intermediary
/// contract holds the name in the base registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameOwnership {
    pub owner: Address,
    pub wrapped: bool,
    /// True when a burned fuse forbids transferring subnames.
    pub transfer_locked: bool,
}

/// Parameters of a commit-reveal registration commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentParams {
    pub name: String,
    pub owner: Address,
    pub duration_secs: u64,
    pub secret: H256,
}

/// A quote for bridging `input_wei` from the secondary chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub input_wei: U256,
    /// Amount arriving on the destination chain after the proportional fee.
    pub output_wei: U256,
}

/// An on-chain operation the core asks the collaborator to encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChainOp {
    Commit {
        commitment_hash: H256,
    },
    Register {
        params: CommitmentParams,
        price_wei: U256,
    },
    Renew {
        name: String,
        duration_secs: u64,
        price_wei: U256,
    },
    CreateSubdomain {
        parent: String,
        label: String,
        owner: Address,
    },
    SetSubdomainAddress {
        parent: String,
        label: String,
        target: Address,
    },
    TransferSubdomain {
        parent: String,
        label: String,
        recipient: Address,
    },
    TransferName {
        name: String,
        recipient: Address,
    },
    Bridge {
        amount_wei: U256,
        to_chain_id: u64,
        recipient: Address,
    },
}

/// An encoded contract call ready to be wrapped in a signature request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedCall {
    pub chain_id: u64,
    pub to: Address,
    pub data: ethers_core::types::Bytes,
    pub value: U256,
}

impl EncodedCall {
    /// Wraps this call in a transaction signature request for the chat surface.
    pub fn into_transaction_request(
        self,
        id: String,
        title: String,
        signer: Address,
        recipient: UserId,
    ) -> TransactionRequest {
        TransactionRequest {
            id,
            title,
            chain_id: self.chain_id,
            to: self.to,
            data: self.data,
            value: self.value,
            signer,
            recipient,
        }
    }
}

/// Adapter for chain reads, estimates, and call encoding.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Availability plus total rent for the requested duration.
    async fn name_status(&self, name: &str, duration_secs: u64) -> Result<NameStatus, EnsignError>;

    /// Actual ownership of a registered name, wrapped-name aware.
    async fn name_ownership(&self, name: &str) -> Result<NameOwnership, EnsignError>;

    /// The wallets linked to a platform user for signing. Empty when none is
    /// linked; more than one means the user must pick.
    async fn wallets(&self, user: &UserId) -> Result<Vec<Address>, EnsignError>;

    /// Native balance of a wallet on the given chain.
    async fn balance(&self, wallet: Address, chain_id: u64) -> Result<U256, EnsignError>;

    /// The protocol commitment hash for the given parameters.
    async fn commitment_hash(&self, params: &CommitmentParams) -> Result<H256, EnsignError>;

    /// Encodes an operation into a contract call.
    async fn encode(&self, op: &ChainOp) -> Result<EncodedCall, EnsignError>;

    /// Estimated total fee for a call, in wei.
    async fn estimate_gas(&self, call: &EncodedCall) -> Result<U256, EnsignError>;

    /// Quote for bridging `input_wei` to the destination chain.
    async fn bridge_quote(&self, input_wei: U256, to_chain_id: u64) -> Result<BridgeQuote, EnsignError>;

    /// The protocol-mandated minimum wait between commit and register.
    fn min_commitment_age(&self) -> Duration;
}
