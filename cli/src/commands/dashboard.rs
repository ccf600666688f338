// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Health worker dashboard: users whose latest high-risk signal needs a visit

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::embedded::EmbeddedHealthMemory;

#[derive(Args, Debug)]
pub struct DashboardArgs {
    /// Minimum risk score (default: the configured high-risk threshold)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Maximum number of users
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

pub async fn execute(args: DashboardArgs, config_path: Option<PathBuf>) -> Result<()> {
    let memory = EmbeddedHealthMemory::new(config_path)?;
    let threshold = args
        .threshold
        .unwrap_or(memory.config.spec.risk.high_threshold);

    let signals = memory
        .service
        .high_risk_users(threshold, args.limit)
        .await
        .context("Failed to query high-risk users")?;

    println!(
        "{}",
        format!("High-risk users (risk >= {:.2})", threshold).bold()
    );
    if signals.is_empty() {
        println!("  {}", "(none)".dimmed());
        return Ok(());
    }

    let now = Utc::now();
    for signal in signals {
        let district = signal.context.district.as_deref().unwrap_or("-");
        println!(
            "  {}  {}  {:>3}d ago  {}  {}",
            signal.user_id.short().bold(),
            format!("{:.2}", signal.risk_score.value()).red(),
            signal.age_days(now),
            district.dimmed(),
            signal.text
        );
    }

    Ok(())
}
