// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the ASHA CLI

pub mod config;
pub mod record;
pub mod search;
pub mod trend;
pub mod dashboard;
pub mod seed;

pub use self::config::ConfigCommand;
pub use self::record::RecordArgs;
pub use self::search::SearchArgs;
pub use self::trend::TrendArgs;
pub use self::dashboard::DashboardArgs;
pub use self::seed::SeedArgs;

use anyhow::Result;
use clap::Args;
use colored::{ColoredString, Colorize};

use asha_cortex::application::RiskCategory;
use asha_cortex::domain::{PregnancyStage, SignalContext, UserId};

use crate::embedded::{build_context, parse_pregnancy_stage, resolve_user};

/// Who the command is about
#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    /// Raw identifier (phone number or device id), anonymized before use
    #[arg(short, long, value_name = "ID", conflicts_with = "user_id")]
    pub user: Option<String>,

    /// Already anonymized user id
    #[arg(long, value_name = "HASH")]
    pub user_id: Option<String>,
}

impl UserArgs {
    pub fn resolve(&self) -> Result<UserId> {
        resolve_user(self.user.as_deref(), self.user_id.as_deref())
    }
}

/// Context snapshot captured with a statement
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,

    /// Pregnancy stage (1st_trimester, 2nd_trimester, 3rd_trimester, postpartum)
    #[arg(long, value_parser = parse_pregnancy_stage)]
    pub stage: Option<PregnancyStage>,

    /// Language code of the statement (default: hi)
    #[arg(long)]
    pub language: Option<String>,

    /// District
    #[arg(long)]
    pub district: Option<String>,
}

impl ContextArgs {
    pub fn into_context(self) -> SignalContext {
        build_context(self.age, self.stage, self.language, self.district)
    }
}

pub(crate) fn colored_risk(value: f64, category: RiskCategory) -> ColoredString {
    let label = format!("{:.2} ({})", value, category);
    match category {
        RiskCategory::High => label.red().bold(),
        RiskCategory::Medium => label.yellow(),
        RiskCategory::Low => label.green(),
    }
}
