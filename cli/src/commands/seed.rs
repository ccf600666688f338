// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Collection bootstrap and reference data seeding
//!
//! Commands: init, seed

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use asha_cortex::domain::ReferenceSeed;

use crate::embedded::EmbeddedHealthMemory;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// YAML file with `knowledge` and `nutrition` lists
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,
}

pub async fn init(config_path: Option<PathBuf>) -> Result<()> {
    let memory = EmbeddedHealthMemory::new(config_path)?;

    memory
        .service
        .initialize()
        .await
        .context("Failed to initialize collections")?;

    println!("{}", "✓ Collections ready".green());
    for name in memory.config.spec.collections.all() {
        println!("  - {}", name);
    }

    Ok(())
}

pub async fn execute(args: SeedArgs, config_path: Option<PathBuf>) -> Result<()> {
    let seed = ReferenceSeed::from_yaml_file(&args.file)
        .with_context(|| format!("Failed to read seed file {:?}", args.file))?;

    if seed.is_empty() {
        println!("{}", "Seed file has no entries".yellow());
        return Ok(());
    }

    let memory = EmbeddedHealthMemory::new(config_path)?;
    memory
        .service
        .initialize()
        .await
        .context("Failed to initialize collections")?;

    let knowledge = memory
        .service
        .seed_knowledge(&seed.knowledge)
        .await
        .context("Failed to seed knowledge")?;
    let nutrition = memory
        .service
        .seed_nutrition(&seed.nutrition)
        .await
        .context("Failed to seed nutrition patterns")?;

    println!(
        "{}",
        format!(
            "✓ Seeded {} knowledge entries and {} nutrition patterns",
            knowledge, nutrition
        )
        .green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_seed_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.yaml");
        std::fs::write(&path, include_str!("../../templates/reference-seed.yaml")).unwrap();

        let seed = ReferenceSeed::from_yaml_file(&path).unwrap();
        assert_eq!(seed.knowledge.len(), 5);
        assert_eq!(seed.nutrition.len(), 4);
        assert!(seed.nutrition.iter().all(|n| n.local_name.is_some()));
    }

    #[tokio::test]
    async fn test_seed_command_runs_against_in_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.yaml");
        std::fs::write(&seed_path, include_str!("../../templates/reference-seed.yaml")).unwrap();
        let config_path = dir.path().join("asha-config.yaml");
        std::fs::write(&config_path, include_str!("../../templates/config-minimal.yaml")).unwrap();

        execute(SeedArgs { file: seed_path }, Some(config_path))
            .await
            .unwrap();
    }
}
