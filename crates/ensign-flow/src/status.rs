// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow status enum and per-type transition tables.
//!
//! One shared status vocabulary covers every operation type; legality is
//! per-type. Every flow starts in `initiated`, the only terminal statuses are
//! `complete` and `failed`, and any non-terminal status may fail.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The operation type a flow drives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Registration,
    Bridge,
    Subdomain,
    Transfer,
    Renewal,
}

/// Status of an in-flight flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Freshly created, no side effect issued yet.
    Initiated,
    /// Waiting for the user to pick a signing wallet.
    AwaitingWallet,
    /// A step-one transaction was sent for signing.
    Step1Pending,
    /// Step one confirmed and, for registrations, the mandatory wait has
    /// elapsed -- ready for final confirmation.
    Step1Complete,
    /// The final transaction was sent for signing.
    Step2Pending,
    /// Bridge transaction sent; waiting for cross-chain settlement.
    AwaitingBridge,
    Complete,
    Failed,
}

impl FlowStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStatus::Complete | FlowStatus::Failed)
    }
}

impl FlowType {
    /// The status every new flow starts in.
    pub fn initial(self) -> FlowStatus {
        FlowStatus::Initiated
    }

    /// Documented successors of `from` for this operation type, not counting
    /// the always-legal failure transition.
    pub fn successors(self, from: FlowStatus) -> &'static [FlowStatus] {
        use FlowStatus::*;
        match self {
            FlowType::Registration => match from {
                Initiated => &[AwaitingWallet, Step1Pending],
                AwaitingWallet => &[Step1Pending],
                Step1Pending => &[Step1Complete],
                Step1Complete => &[Step2Pending],
                Step2Pending => &[Complete],
                _ => &[],
            },
            FlowType::Bridge => match from {
                Initiated => &[AwaitingBridge],
                AwaitingBridge => &[Complete],
                _ => &[],
            },
            // Subdomain steps cycle through the pending/complete pair; the
            // step counter lives in the flow data.
            FlowType::Subdomain => match from {
                Initiated => &[Step1Pending],
                Step1Pending => &[Step1Complete],
                Step1Complete => &[Step2Pending],
                Step2Pending => &[Complete, Step1Complete],
                _ => &[],
            },
            FlowType::Transfer | FlowType::Renewal => match from {
                Initiated => &[Step1Pending],
                Step1Pending => &[Complete],
                _ => &[],
            },
        }
    }

    /// Whether `from -> to` is a legal single-step transition for this type.
    pub fn is_legal_transition(self, from: FlowStatus, to: FlowStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        if to == FlowStatus::Failed {
            return true;
        }
        self.successors(from).contains(&to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_display_and_parse_round_trip() {
        for status in [
            FlowStatus::Initiated,
            FlowStatus::AwaitingWallet,
            FlowStatus::Step1Pending,
            FlowStatus::Step1Complete,
            FlowStatus::Step2Pending,
            FlowStatus::AwaitingBridge,
            FlowStatus::Complete,
            FlowStatus::Failed,
        ] {
            let s = status.to_string();
            assert_eq!(FlowStatus::from_str(&s).unwrap(), status);
        }
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&FlowStatus::Step1Pending).unwrap();
        assert_eq!(json, "\"step1_pending\"");
        let json = serde_json::to_string(&FlowStatus::AwaitingWallet).unwrap();
        assert_eq!(json, "\"awaiting_wallet\"");
    }

    #[test]
    fn registration_happy_path_is_legal() {
        use FlowStatus::*;
        let t = FlowType::Registration;
        assert!(t.is_legal_transition(Initiated, AwaitingWallet));
        assert!(t.is_legal_transition(AwaitingWallet, Step1Pending));
        assert!(t.is_legal_transition(Initiated, Step1Pending));
        assert!(t.is_legal_transition(Step1Pending, Step1Complete));
        assert!(t.is_legal_transition(Step1Complete, Step2Pending));
        assert!(t.is_legal_transition(Step2Pending, Complete));
    }

    #[test]
    fn registration_cannot_skip_the_wait() {
        use FlowStatus::*;
        let t = FlowType::Registration;
        assert!(!t.is_legal_transition(Step1Pending, Step2Pending));
        assert!(!t.is_legal_transition(Step1Pending, Complete));
        assert!(!t.is_legal_transition(Initiated, Complete));
    }

    #[test]
    fn any_non_terminal_status_may_fail() {
        use FlowStatus::*;
        for t in [
            FlowType::Registration,
            FlowType::Bridge,
            FlowType::Subdomain,
            FlowType::Transfer,
            FlowType::Renewal,
        ] {
            assert!(t.is_legal_transition(Initiated, Failed));
            assert!(t.is_legal_transition(Step1Pending, Failed));
        }
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        use FlowStatus::*;
        let t = FlowType::Registration;
        assert!(!t.is_legal_transition(Complete, Failed));
        assert!(!t.is_legal_transition(Failed, Initiated));
        assert!(!t.is_legal_transition(Complete, Step1Pending));
    }

    #[test]
    fn bridge_machine_shape() {
        use FlowStatus::*;
        let t = FlowType::Bridge;
        assert!(t.is_legal_transition(Initiated, AwaitingBridge));
        assert!(t.is_legal_transition(AwaitingBridge, Complete));
        assert!(!t.is_legal_transition(Initiated, Complete));
        assert!(!t.is_legal_transition(Initiated, Step1Pending));
    }

    #[test]
    fn subdomain_middle_step_cycles_back() {
        use FlowStatus::*;
        let t = FlowType::Subdomain;
        assert!(t.is_legal_transition(Step2Pending, Step1Complete));
        assert!(t.is_legal_transition(Step2Pending, Complete));
    }

    #[test]
    fn transfer_is_single_step() {
        use FlowStatus::*;
        let t = FlowType::Transfer;
        assert!(t.is_legal_transition(Initiated, Step1Pending));
        assert!(t.is_legal_transition(Step1Pending, Complete));
        assert!(!t.is_legal_transition(Step1Pending, Step1Complete));
    }
}
