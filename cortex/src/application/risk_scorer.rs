// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Risk Scorer
//!
//! Maps a symptom statement and its context snapshot to a base risk in [0, 1].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements risk scoring
//!
//! The rule is a keyword lexicon (English and Hindi) followed by context
//! multipliers. Base risk is the highest severity of any matched keyword,
//! or `default_risk` when nothing matches. Stateless and deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::domain::{PregnancyStage, RiskConfig, RiskScore, SignalContext};

/// Symptom keyword to severity
const SEVERITY_LEXICON: &[(&str, f64)] = &[
    // High risk
    ("unconscious", 1.0),
    ("बेहोश", 1.0),
    ("convulsion", 0.95),
    ("दौरा", 0.95),
    ("bleeding", 0.9),
    ("खून", 0.9),
    ("severe pain", 0.8),
    ("बहुत दर्द", 0.8),
    ("blurred vision", 0.75),
    ("धुंधला दिखना", 0.75),
    ("swelling", 0.6),
    ("सूजन", 0.6),
    // Medium risk
    ("fever", 0.6),
    ("बुखार", 0.6),
    ("vomiting", 0.55),
    ("उल्टी", 0.55),
    ("headache", 0.5),
    ("सिरदर्द", 0.5),
    ("dizziness", 0.5),
    ("चक्कर", 0.5),
    ("weakness", 0.4),
    ("कमजोरी", 0.4),
    // Low risk
    ("nausea", 0.3),
    ("मतली", 0.3),
    ("back pain", 0.3),
    ("पीठ दर्द", 0.3),
    ("tired", 0.25),
    ("थकान", 0.25),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Category with the default thresholds (high >= 0.7, medium >= 0.4)
    pub fn from_score(score: RiskScore) -> Self {
        Self::from_score_with(score, 0.7, 0.4)
    }

    pub fn from_score_with(score: RiskScore, high: f64, medium: f64) -> Self {
        let value = score.value();
        if value >= high {
            RiskCategory::High
        } else if value >= medium {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: RiskConfig,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Score a statement in its context snapshot. Never fails.
    pub fn score(&self, text: &str, context: &SignalContext) -> RiskScore {
        let base = self.keyword_severity(text);

        let mut adjusted = base * Self::pregnancy_multiplier(context.pregnancy_stage);

        if let Some(age) = context.age {
            if age < self.config.young_age || age > self.config.old_age {
                adjusted *= self.config.age_multiplier;
            }
        }

        let score = RiskScore::new(adjusted);
        debug!(base, score = score.value(), "Risk score calculated");
        score
    }

    pub fn category(&self, score: RiskScore) -> RiskCategory {
        RiskCategory::from_score_with(
            score,
            self.config.high_threshold,
            self.config.medium_threshold,
        )
    }

    /// Highest severity among matched keywords
    fn keyword_severity(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();

        SEVERITY_LEXICON
            .iter()
            .filter(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, severity)| *severity)
            .fold(None, |max: Option<f64>, s| Some(max.map_or(s, |m| m.max(s))))
            .unwrap_or(self.config.default_risk)
    }

    fn pregnancy_multiplier(stage: Option<PregnancyStage>) -> f64 {
        match stage {
            Some(PregnancyStage::FirstTrimester) => 1.1,
            Some(PregnancyStage::SecondTrimester) => 1.0,
            Some(PregnancyStage::ThirdTrimester) => 1.2,
            Some(PregnancyStage::Postpartum) => 1.15,
            None => 1.0,
        }
    }
}
