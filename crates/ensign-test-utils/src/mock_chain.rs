// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configurable mock chain client.
//!
//! Prices, ownership, balances, gas, and the bridge fee are fixed at
//! construction; call counters let tests assert how often the loop touched
//! the chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::{Address, H256, U256};

use ensign_core::EnsignError;
use ensign_core::traits::chain::{
    BridgeQuote, ChainClient, ChainOp, CommitmentParams, EncodedCall, NameOwnership, NameStatus,
};
use ensign_core::types::UserId;

/// Per-name configuration entry.
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub available: bool,
    /// Rent per year in wei; `name_status` scales it by the duration.
    pub rent_per_year_wei: U256,
    pub owner: Address,
    pub wrapped: bool,
    pub transfer_locked: bool,
    pub expires_at: Option<i64>,
}

impl Default for NameEntry {
    fn default() -> Self {
        Self {
            available: true,
            // 0.0042 ETH per year.
            rent_per_year_wei: U256::from(4_200_000_000_000_000u64),
            owner: Address::zero(),
            wrapped: false,
            transfer_locked: false,
            expires_at: None,
        }
    }
}

/// Mock chain client with fixed answers and call counters.
pub struct MockChain {
    names: HashMap<String, NameEntry>,
    wallets: Vec<Address>,
    /// Balance per chain id.
    balances: HashMap<u64, U256>,
    /// Flat total-fee estimate for every call.
    gas_wei: U256,
    /// Proportional bridge fee in percent.
    bridge_fee_percent: u64,
    min_commitment_age: Duration,
    name_status_calls: AtomicU32,
    estimate_calls: AtomicU32,
    quote_calls: AtomicU32,
}

impl MockChain {
    pub fn new() -> Self {
        let mut balances = HashMap::new();
        let ten_eth = U256::from(10_000_000_000_000_000_000u128);
        balances.insert(1, ten_eth);
        balances.insert(8453, ten_eth);
        Self {
            names: HashMap::new(),
            wallets: vec![Address::repeat_byte(0x11)],
            balances,
            // 0.001 ETH.
            gas_wei: U256::from(1_000_000_000_000_000u64),
            bridge_fee_percent: 2,
            min_commitment_age: Duration::from_secs(0),
            name_status_calls: AtomicU32::new(0),
            estimate_calls: AtomicU32::new(0),
            quote_calls: AtomicU32::new(0),
        }
    }

    pub fn with_name(mut self, name: &str, entry: NameEntry) -> Self {
        self.names.insert(name.to_string(), entry);
        self
    }

    pub fn with_wallets(mut self, wallets: Vec<Address>) -> Self {
        self.wallets = wallets;
        self
    }

    pub fn with_balance(mut self, chain_id: u64, balance: U256) -> Self {
        self.balances.insert(chain_id, balance);
        self
    }

    pub fn with_min_commitment_age(mut self, age: Duration) -> Self {
        self.min_commitment_age = age;
        self
    }

    pub fn with_bridge_fee_percent(mut self, percent: u64) -> Self {
        self.bridge_fee_percent = percent;
        self
    }

    pub fn name_status_calls(&self) -> u32 {
        self.name_status_calls.load(Ordering::SeqCst)
    }

    pub fn estimate_calls(&self) -> u32 {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub fn quote_calls(&self) -> u32 {
        self.quote_calls.load(Ordering::SeqCst)
    }

    fn entry(&self, name: &str) -> NameEntry {
        self.names.get(name).cloned().unwrap_or_default()
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn name_status(&self, name: &str, duration_secs: u64) -> Result<NameStatus, EnsignError> {
        self.name_status_calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.entry(name);
        let years = U256::from(duration_secs.div_ceil(31_536_000).max(1));
        Ok(NameStatus {
            available: entry.available,
            rent_price_wei: entry.rent_per_year_wei * years,
            expires_at: entry.expires_at,
            owner: (!entry.available).then_some(entry.owner),
        })
    }

    async fn name_ownership(&self, name: &str) -> Result<NameOwnership, EnsignError> {
        let entry = self.entry(name);
        Ok(NameOwnership {
            owner: entry.owner,
            wrapped: entry.wrapped,
            transfer_locked: entry.transfer_locked,
        })
    }

    async fn wallets(&self, _user: &UserId) -> Result<Vec<Address>, EnsignError> {
        Ok(self.wallets.clone())
    }

    async fn balance(&self, _wallet: Address, chain_id: u64) -> Result<U256, EnsignError> {
        Ok(self.balances.get(&chain_id).copied().unwrap_or_default())
    }

    async fn commitment_hash(&self, params: &CommitmentParams) -> Result<H256, EnsignError> {
        // Deterministic but parameter-sensitive.
        let mut bytes = [0u8; 32];
        for (i, b) in params.name.bytes().enumerate() {
            bytes[i % 32] ^= b;
        }
        for (i, b) in params.secret.as_bytes().iter().enumerate() {
            bytes[i % 32] ^= b;
        }
        Ok(H256::from(bytes))
    }

    async fn encode(&self, op: &ChainOp) -> Result<EncodedCall, EnsignError> {
        let (chain_id, value) = match op {
            ChainOp::Register { price_wei, .. } | ChainOp::Renew { price_wei, .. } => {
                (1, *price_wei)
            }
            ChainOp::Bridge { amount_wei, .. } => (8453, *amount_wei),
            _ => (1, U256::zero()),
        };
        let data = serde_json::to_vec(op).map_err(|e| EnsignError::Internal(e.to_string()))?;
        Ok(EncodedCall {
            chain_id,
            to: Address::repeat_byte(0xee),
            data: data.into(),
            value,
        })
    }

    async fn estimate_gas(&self, _call: &EncodedCall) -> Result<U256, EnsignError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.gas_wei)
    }

    async fn bridge_quote(
        &self,
        input_wei: U256,
        _to_chain_id: u64,
    ) -> Result<BridgeQuote, EnsignError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let fee = input_wei * U256::from(self.bridge_fee_percent) / U256::from(100u8);
        Ok(BridgeQuote {
            input_wei,
            output_wei: input_wei - fee,
        })
    }

    fn min_commitment_age(&self) -> Duration {
        self.min_commitment_age
    }
}
