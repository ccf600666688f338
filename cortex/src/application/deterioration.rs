// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deterioration Detector
//!
//! Compares a user's recent risk level with their own baseline.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements trend comparison over a user's signal history
//!
//! Signals are split by age into a recent window (`age <= recent_days`) and a
//! baseline window (`recent_days < age <= baseline_days`); anything older is
//! ignored. Both averages are means of `risk_score` weighted by `weight`, so
//! decayed signals count less in both windows. An empty window never
//! triggers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DeteriorationConfig, HealthSignal, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    None,
    Monitor,
    HighPriority,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Monitor => "monitor",
            AlertLevel::HighPriority => "high_priority",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeteriorationReport {
    pub triggered: bool,
    /// `None` when the recent window is empty
    pub recent_avg: Option<f64>,
    /// `None` when the baseline window is empty
    pub baseline_avg: Option<f64>,
    pub recent_count: usize,
    pub baseline_count: usize,
    pub alert_level: AlertLevel,
}

impl DeteriorationReport {
    /// Rise of the recent average over the baseline, when both exist
    pub fn delta(&self) -> Option<f64> {
        Some(self.recent_avg? - self.baseline_avg?)
    }
}

/// Value handed to the health worker dashboard. Returned, never pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSignal {
    pub user_id: UserId,
    pub risk_score: f64,
    pub triggered: bool,
}

pub struct DeteriorationDetector {
    config: DeteriorationConfig,
    high_risk_threshold: f64,
}

impl DeteriorationDetector {
    /// `high_risk_threshold` separates `Monitor` from `HighPriority` alerts
    pub fn new(config: DeteriorationConfig, high_risk_threshold: f64) -> Self {
        Self {
            config,
            high_risk_threshold,
        }
    }

    pub fn detect(&self, history: &[HealthSignal]) -> DeteriorationReport {
        self.detect_at(Utc::now(), history)
    }

    pub fn detect_at(&self, now: DateTime<Utc>, history: &[HealthSignal]) -> DeteriorationReport {
        let recent_limit = Duration::days(self.config.recent_days);
        let baseline_limit = Duration::days(self.config.baseline_days);

        let (recent, baseline): (Vec<&HealthSignal>, Vec<&HealthSignal>) = history
            .iter()
            .filter(|s| now - s.timestamp <= baseline_limit)
            .partition(|s| now - s.timestamp <= recent_limit);

        let recent_avg = weighted_mean(&recent);
        let baseline_avg = weighted_mean(&baseline);

        let triggered = match (recent_avg, baseline_avg) {
            (Some(r), Some(b)) => r > b + self.config.trigger_delta,
            _ => false,
        };

        let alert_level = match recent_avg {
            Some(r) if triggered && r > self.high_risk_threshold => AlertLevel::HighPriority,
            _ if triggered => AlertLevel::Monitor,
            _ => AlertLevel::None,
        };

        DeteriorationReport {
            triggered,
            recent_avg,
            baseline_avg,
            recent_count: recent.len(),
            baseline_count: baseline.len(),
            alert_level,
        }
    }
}

fn weighted_mean(signals: &[&HealthSignal]) -> Option<f64> {
    let total_weight: f64 = signals.iter().map(|s| s.weight.value()).sum();
    if signals.is_empty() || total_weight <= 0.0 {
        return None;
    }
    let weighted: f64 = signals
        .iter()
        .map(|s| s.risk_score.value() * s.weight.value())
        .sum();
    Some(weighted / total_weight)
}
