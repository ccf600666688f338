// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Record a health statement
//!
//! Runs the full write path: sanitize, embed, retrieve, score, evolve and
//! check for deterioration.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use asha_cortex::application::{AlertLevel, InteractionOutcome};
use asha_cortex::domain::SignalType;

use super::{colored_risk, ContextArgs, UserArgs};
use crate::embedded::{parse_signal_type, EmbeddedHealthMemory};

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// The statement, as transcribed
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Signal type (symptom, nutrition, vitals)
    #[arg(short = 't', long = "type", default_value = "symptom", value_parser = parse_signal_type)]
    pub signal_type: SignalType,

    #[command(flatten)]
    pub context: ContextArgs,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RecordArgs, config_path: Option<PathBuf>) -> Result<()> {
    let user_id = args.user.resolve()?;
    let memory = EmbeddedHealthMemory::new(config_path)?;

    let outcome = memory
        .service
        .record_interaction(&user_id, &args.text, args.signal_type, args.context.into_context())
        .await
        .context("Failed to record statement")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&outcome))?);
        return Ok(());
    }

    print_outcome(&outcome);
    Ok(())
}

fn to_json(outcome: &InteractionOutcome) -> serde_json::Value {
    serde_json::json!({
        "signal_id": outcome.signal.id.to_string(),
        "user_id": outcome.signal.user_id.as_str(),
        "text": outcome.signal.text,
        "base_risk": outcome.base_risk.value(),
        "risk_score": outcome.signal.risk_score.value(),
        "category": outcome.category,
        "reinforced": outcome.reinforced,
        "evidence_found": outcome.evidence.evidence_found,
        "sufficient_evidence": outcome.evidence.is_sufficient(),
        "deterioration": outcome.report,
        "dashboard": outcome.dashboard,
        "events": outcome.events,
    })
}

fn print_outcome(outcome: &InteractionOutcome) {
    println!(
        "{}",
        format!("✓ Signal recorded: {}", outcome.signal.id).green()
    );
    println!("  User: {}", outcome.signal.user_id.short());
    println!("  Text: {}", outcome.signal.text);
    println!(
        "  Risk: {}",
        colored_risk(outcome.signal.risk_score.value(), outcome.category)
    );
    if outcome.reinforced {
        println!(
            "  {} base risk {:.2} reinforced by repeated similar reports",
            "↑".yellow(),
            outcome.base_risk.value()
        );
    }

    let persisted = outcome.weight_updates.iter().filter(|u| u.persisted).count();
    if !outcome.weight_updates.is_empty() {
        println!(
            "  Decayed {} old signal(s) ({} persisted)",
            outcome.weight_updates.len(),
            persisted
        );
    }
    println!();

    println!("{}", "Evidence:".bold());
    if !outcome.evidence.evidence_found {
        println!("  {}", "(none found)".dimmed());
    }
    for candidate in &outcome.evidence.candidates {
        println!(
            "  [{:.2}] {} {}",
            candidate.score,
            candidate.source.as_str().dimmed(),
            candidate.text()
        );
    }
    println!();

    let report = &outcome.report;
    match report.alert_level {
        AlertLevel::HighPriority => println!(
            "{}",
            "⚠ HIGH PRIORITY: risk is rising, notify the ASHA worker".red().bold()
        ),
        AlertLevel::Monitor => println!("{}", "⚠ Risk is rising, monitor closely".yellow()),
        AlertLevel::None => println!("{}", "No deterioration detected".green()),
    }
    if let (Some(recent), Some(baseline)) = (report.recent_avg, report.baseline_avg) {
        println!("  Recent avg: {:.2}  Baseline avg: {:.2}", recent, baseline);
    }
}
