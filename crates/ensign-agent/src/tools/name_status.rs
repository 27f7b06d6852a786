// SPDX-FileCopyrightText: 2026 Ensign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only name lookup: availability, rent price, expiry, current owner.

use async_trait::async_trait;
use serde::Deserialize;

use ensign_core::EnsignError;
use ensign_core::types::format_ether;

use super::{AgentTool, SECONDS_PER_YEAR, ToolContext, ToolOutcome, parse_args};

pub struct NameStatusTool;

#[derive(Debug, Deserialize)]
struct NameStatusArgs {
    name: String,
    duration_years: Option<u32>,
}

#[async_trait]
impl AgentTool for NameStatusTool {
    fn name(&self) -> &str {
        "name_status"
    }

    fn description(&self) -> &str {
        "Check whether an ENS name is available, its registration price for a \
         given duration, and -- if registered -- its current owner and expiry."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Full ENS name, e.g. alice.eth"
                },
                "duration_years": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Registration duration in years (default 1)"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, EnsignError> {
        let args: NameStatusArgs = parse_args(input)?;
        let years = args.duration_years.unwrap_or(1).max(1);
        let duration_secs = u64::from(years) * SECONDS_PER_YEAR;

        let status = ctx.chain.name_status(&args.name, duration_secs).await?;

        if status.available {
            let price = format_ether(status.rent_price_wei);
            Ok(ToolOutcome::ok(serde_json::json!({
                "name": args.name,
                "available": true,
                "duration_years": years,
                "price_eth": price,
                "price_wei": status.rent_price_wei,
            })))
        } else {
            let ownership = ctx.chain.name_ownership(&args.name).await?;
            Ok(ToolOutcome::ok(serde_json::json!({
                "name": args.name,
                "available": false,
                "owner": format!("{:?}", ownership.owner),
                "wrapped": ownership.wrapped,
                "expires_at": status.expires_at,
            })))
        }
    }
}
