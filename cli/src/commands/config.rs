// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use asha_cortex::domain::HealthMemoryConfig;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./asha-config.yaml)
        #[arg(short, long, default_value = "./asha-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = HealthMemoryConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. ASHA_CONFIG_PATH: {}",
            std::env::var("ASHA_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        for (i, path) in HealthMemoryConfig::search_paths().iter().enumerate() {
            println!("  {}. {}", i + 3, path.display());
        }
        println!();
    }

    let spec = &config.spec;
    println!("{} {}", "Current configuration:".bold(), config.metadata.name);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    println!("  URL: {}", spec.storage.url);
    println!(
        "  API key: {}",
        if spec.storage.api_key.is_some() { "(set)" } else { "(none)" }
    );
    println!();

    println!("{}", "Embedding:".bold());
    println!("  Provider: {:?}", spec.embedding.provider);
    println!("  Endpoint: {}", spec.embedding.endpoint);
    println!("  Model: {}", spec.embedding.model);
    println!("  Dimension: {}", spec.embedding.dimension);
    println!();

    println!("{}", "Collections:".bold());
    for name in spec.collections.all() {
        println!("  - {}", name);
    }
    println!();

    println!("{}", "Risk:".bold());
    println!("  Default: {}", spec.risk.default_risk);
    println!(
        "  Thresholds: high >= {}, medium >= {}",
        spec.risk.high_threshold, spec.risk.medium_threshold
    );
    println!(
        "  Age multiplier: x{} (age < {} or > {})",
        spec.risk.age_multiplier, spec.risk.young_age, spec.risk.old_age
    );
    println!();

    let evolution = &spec.evolution;
    println!("{}", "Evolution:".bold());
    println!(
        "  Reinforcement: x{} when more than {} similar (> {}) within {} days",
        evolution.reinforcement_factor,
        evolution.reinforcement_min_similar,
        evolution.similarity_threshold,
        evolution.reinforcement_window_days
    );
    println!(
        "  Decay: x{} after {} days for risk < {}",
        evolution.decay_factor, evolution.decay_min_age_days, evolution.decay_risk_ceiling
    );
    println!();

    println!("{}", "Deterioration:".bold());
    println!(
        "  Recent {} days vs baseline {} days, delta > {}",
        spec.deterioration.recent_days,
        spec.deterioration.baseline_days,
        spec.deterioration.trigger_delta
    );
    println!();

    let weights = &spec.ranking.weights;
    println!("{}", "Ranking:".bold());
    println!(
        "  Weights: recency {}, risk {}, similarity {}",
        weights.recency, weights.risk, weights.similarity
    );
    println!(
        "  Limits: {} per collection, {} results",
        spec.ranking.per_collection_limit, spec.ranking.max_results
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = HealthMemoryConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
