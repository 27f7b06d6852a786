// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model pricing tables and per-call cost estimation.
//!
//! Claude Haiku 3.5:  input=$0.80/MTok, output=$4.00/MTok
//! Claude Sonnet 4:   input=$3.00/MTok, output=$15.00/MTok
//! Claude Opus 4:     input=$15.00/MTok, output=$75.00/MTok
//! Cache read = 10% of input price, cache write = 25% premium over input price.

use ensign_core::TokenUsage;

/// Per-model pricing in USD per million tokens.
#[derive(Debug, Clone)]
pub struct ModelPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
    pub cache_read_per_mtok: f64,
    pub cache_write_per_mtok: f64,
}

/// Look up pricing for a given model identifier.
///
/// Matches on substrings: "opus", "haiku", "sonnet". Falls back to Sonnet
/// pricing for unknown models so cost accrual never silently drops to zero.
pub fn get_pricing(model: &str) -> ModelPricing {
    let lower = model.to_lowercase();

    if lower.contains("opus") {
        ModelPricing {
            input_per_mtok: 15.0,
            output_per_mtok: 75.0,
            cache_read_per_mtok: 1.50,
            cache_write_per_mtok: 18.75,
        }
    } else if lower.contains("haiku") {
        ModelPricing {
            input_per_mtok: 0.80,
            output_per_mtok: 4.0,
            cache_read_per_mtok: 0.08,
            cache_write_per_mtok: 1.0,
        }
    } else {
        ModelPricing {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
            cache_read_per_mtok: 0.30,
            cache_write_per_mtok: 3.75,
        }
    }
}

/// Estimated cost in USD for one call's reported token usage.
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let pricing = get_pricing(model);
    let input = (usage.input_tokens as f64 / 1_000_000.0) * pricing.input_per_mtok;
    let output = (usage.output_tokens as f64 / 1_000_000.0) * pricing.output_per_mtok;
    let cache_read = (usage.cache_read_tokens as f64 / 1_000_000.0) * pricing.cache_read_per_mtok;
    let cache_write =
        (usage.cache_creation_tokens as f64 / 1_000_000.0) * pricing.cache_write_per_mtok;
    input + output + cache_read + cache_write
}
