// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Show a user's stored history and the deterioration check over it

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use asha_cortex::application::{AlertLevel, RiskCategory};

use super::{colored_risk, UserArgs};
use crate::embedded::EmbeddedHealthMemory;

#[derive(Args, Debug)]
pub struct TrendArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Maximum number of signals to list
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

pub async fn execute(args: TrendArgs, config_path: Option<PathBuf>) -> Result<()> {
    let user_id = args.user.resolve()?;
    let memory = EmbeddedHealthMemory::new(config_path)?;
    let risk = &memory.config.spec.risk;

    let trend = memory
        .service
        .trend(&user_id)
        .await
        .context("Failed to load history")?;

    println!("{} {}", "History for".bold(), user_id.short());
    if trend.history.is_empty() {
        println!("  {}", "(no signals)".dimmed());
    }

    let now = Utc::now();
    for signal in trend.history.iter().take(args.limit) {
        let category = RiskCategory::from_score_with(
            signal.risk_score,
            risk.high_threshold,
            risk.medium_threshold,
        );
        println!(
            "  {:>4}d  {}  w={:.3}  {}",
            signal.age_days(now),
            colored_risk(signal.risk_score.value(), category),
            signal.weight.value(),
            signal.text
        );
    }
    println!();

    let report = &trend.report;
    println!("{}", "Trend:".bold());
    println!(
        "  Recent:   {} ({} signals)",
        report.recent_avg.map_or("-".to_string(), |v| format!("{:.2}", v)),
        report.recent_count
    );
    println!(
        "  Baseline: {} ({} signals)",
        report.baseline_avg.map_or("-".to_string(), |v| format!("{:.2}", v)),
        report.baseline_count
    );

    let status = match report.alert_level {
        AlertLevel::HighPriority => "high_priority".red().bold(),
        AlertLevel::Monitor => "monitor".yellow(),
        AlertLevel::None => "stable".green(),
    };
    println!("  Status:   {}", status);

    Ok(())
}
