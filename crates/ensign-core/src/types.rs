// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Ensign workspace.

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

/// Unique identifier for a user on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Unique identifier for a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

/// Unique identifier for a channel on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

/// The identity triple every flow and session is keyed by.
///
/// `(user_id, conversation_id)` forms the storage key; `channel_id` rides
/// along so the agent can address replies without a separate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub channel_id: ChannelId,
}

impl Identity {
    pub fn new(user: impl Into<String>, conversation: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user.into()),
            conversation_id: ConversationId(conversation.into()),
            channel_id: ChannelId(channel.into()),
        }
    }
}

/// Token usage statistics reported by the LLM provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_read_tokens: u32,
    #[serde(default)]
    pub cache_creation_tokens: u32,
}

/// Current wall-clock time as integer milliseconds since the Unix epoch.
///
/// All persisted timestamps use this representation.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

/// Formats a wei amount as an ether string with exactly four decimal places.
///
/// Uses integer arithmetic only; the fractional part is truncated, never
/// rounded through a float.
pub fn format_ether(wei: U256) -> String {
    let divisor = U256::from(WEI_PER_ETHER);
    let whole = wei / divisor;
    // Four decimal places: wei per 0.0001 ether.
    let frac = (wei % divisor) / U256::from(WEI_PER_ETHER / 10_000);
    format!("{whole}.{:04}", frac.as_u64())
}

/// Parses a decimal ether string ("1", "0.25", "1.5") into wei.
///
/// At most 18 fractional digits are accepted; anything else is an input
/// error. Integer arithmetic only.
pub fn parse_ether(text: &str) -> Result<U256, crate::error::EnsignError> {
    let text = text.trim();
    let invalid = || {
        crate::error::EnsignError::InvalidInput(format!("not a valid ether amount: {text:?}"))
    };

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 18 {
        return Err(invalid());
    }
    let whole_part = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| invalid())?
    };
    let frac_part = if frac.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{frac:0<18}");
        U256::from_dec_str(&padded).map_err(|_| invalid())?
    };
    Ok(whole_part * U256::from(WEI_PER_ETHER) + frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_ether_whole_amount() {
        let wei = U256::from(WEI_PER_ETHER) * U256::from(3u8);
        assert_eq!(format_ether(wei), "3.0000");
    }

    #[test]
    fn format_ether_fractional_truncates() {
        // 0.12345 ether -> "0.1234" (truncated, not rounded)
        let wei = U256::from(123_450_000_000_000_000u64);
        assert_eq!(format_ether(wei), "0.1234");
    }

    #[test]
    fn format_ether_small_amount_pads_zeroes() {
        // 0.0001 ether exactly
        let wei = U256::from(100_000_000_000_000u64);
        assert_eq!(format_ether(wei), "0.0001");
    }

    #[test]
    fn format_ether_zero() {
        assert_eq!(format_ether(U256::zero()), "0.0000");
    }

    #[test]
    fn format_ether_large_amount() {
        // 2^200 wei still formats without panicking.
        let wei = U256::from(2u8).pow(U256::from(200u8));
        let s = format_ether(wei);
        assert!(s.ends_with(|c: char| c.is_ascii_digit()));
        assert_eq!(s.split('.').nth(1).unwrap().len(), 4);
    }

    #[test]
    fn parse_ether_whole_and_fraction() {
        assert_eq!(parse_ether("1").unwrap(), U256::from(WEI_PER_ETHER));
        assert_eq!(
            parse_ether("0.5").unwrap(),
            U256::from(WEI_PER_ETHER / 2)
        );
        assert_eq!(
            parse_ether("2.25").unwrap(),
            U256::from(WEI_PER_ETHER) * U256::from(2u8) + U256::from(WEI_PER_ETHER / 4)
        );
        assert_eq!(parse_ether(".1").unwrap(), U256::from(WEI_PER_ETHER / 10));
    }

    #[test]
    fn parse_ether_rejects_garbage() {
        assert!(parse_ether("").is_err());
        assert!(parse_ether(".").is_err());
        assert!(parse_ether("abc").is_err());
        assert!(parse_ether("1.0000000000000000001").is_err());
        assert!(parse_ether("-1").is_err());
    }

    #[test]
    fn parse_format_round_trip() {
        let wei = parse_ether("3.1415").unwrap();
        assert_eq!(format_ether(wei), "3.1415");
    }

    #[test]
    fn identity_round_trips_through_serde() {
        let id = Identity::new("user-1", "conv-1", "chan-1");
        let json = serde_json::to_string(&id).unwrap();
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn token_usage_defaults_cache_fields() {
        let json = r#"{"input_tokens": 10, "output_tokens": 5}"#;
        let usage: TokenUsage = serde_json::from_str(json).unwrap();
        assert_eq!(usage.cache_read_tokens, 0);
        assert_eq!(usage.cache_creation_tokens, 0);
    }
}
