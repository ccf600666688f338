// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Retrieve ranked evidence without recording anything

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::{ContextArgs, UserArgs};
use crate::embedded::EmbeddedHealthMemory;

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    #[command(flatten)]
    pub context: ContextArgs,

    /// Print the candidates as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SearchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let user_id = args.user.resolve()?;
    let memory = EmbeddedHealthMemory::new(config_path)?;

    let context = args.context.into_context();
    let bundle = memory.service.search(&user_id, &args.query, &context).await;

    if args.json {
        let value = serde_json::json!({
            "evidence_found": bundle.evidence_found,
            "sufficient": bundle.is_sufficient(),
            "candidates": bundle.candidates,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !bundle.evidence_found {
        println!("{}", "No evidence found".yellow());
        return Ok(());
    }

    println!(
        "{} ({} user memories, {} knowledge, {} nutrition)",
        "Evidence:".bold(),
        bundle.user_memory_count,
        bundle.knowledge_count,
        bundle.nutrition_count
    );
    for (rank, candidate) in bundle.candidates.iter().enumerate() {
        let sub = &candidate.sub_scores;
        println!(
            "  {}. [{:.2}] {} {}",
            rank + 1,
            candidate.score,
            candidate.source.as_str().dimmed(),
            candidate.text()
        );
        println!(
            "     {}",
            format!(
                "similarity {:.2}  risk {}  recency {}",
                sub.similarity,
                sub.risk.map_or("-".to_string(), |r| format!("{:.2}", r)),
                sub.recency.map_or("-".to_string(), |r| format!("{:.2}", r)),
            )
            .dimmed()
        );
    }

    if !bundle.is_sufficient() {
        println!();
        println!("{}", "Evidence is thin; treat the answer with care.".yellow());
    }

    Ok(())
}
