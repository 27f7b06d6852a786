// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow model, per-operation state machines, and the flow repository.
//!
//! A `Flow` is the durable record of one in-flight multi-step operation
//! (registration, bridge, subdomain, transfer, renewal), persisted through
//! the tamper-evident state store and keyed by `(user, conversation)`.

pub mod model;
pub mod repository;
pub mod status;

pub use model::{
    BridgeData, Commitment, CostBreakdown, Flow, FlowData, NextAction, RegistrationData,
    RenewalData, SubdomainData, TransferData,
};
pub use repository::{FlowRepository, flow_key, parse_flow_key};
pub use status::{FlowStatus, FlowType};
