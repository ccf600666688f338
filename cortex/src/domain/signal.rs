// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Health Signals
//!
//! A [`HealthSignal`] is one recorded user statement (symptom, nutrition or
//! vitals) together with its derived risk and influence weight. Signals are
//! append-only: once written, only the `weight` payload field may change, and
//! only through lazy decay in the memory evolution engine.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Signal aggregate, value objects and payload mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId(pub Uuid);

impl SignalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque, irreversible identifier of a physical person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identifier that is already anonymized.
    pub fn from_anonymized(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the stable anonymous id for a raw identifier (phone number,
    /// device id). First 16 hex chars of its SHA-256 digest.
    pub fn anonymize(raw: &str) -> Self {
        let digest = Sha256::digest(raw.trim().as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(16);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    #[default]
    Symptom,
    Nutrition,
    Vitals,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Symptom => "symptom",
            SignalType::Nutrition => "nutrition",
            SignalType::Vitals => "vitals",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "symptom" => Some(SignalType::Symptom),
            "nutrition" => Some(SignalType::Nutrition),
            "vitals" => Some(SignalType::Vitals),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PregnancyStage {
    #[serde(rename = "1st_trimester")]
    FirstTrimester,
    #[serde(rename = "2nd_trimester")]
    SecondTrimester,
    #[serde(rename = "3rd_trimester")]
    ThirdTrimester,
    #[serde(rename = "postpartum")]
    Postpartum,
}

impl PregnancyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PregnancyStage::FirstTrimester => "1st_trimester",
            PregnancyStage::SecondTrimester => "2nd_trimester",
            PregnancyStage::ThirdTrimester => "3rd_trimester",
            PregnancyStage::Postpartum => "postpartum",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "1st_trimester" | "first" | "1" => Some(PregnancyStage::FirstTrimester),
            "2nd_trimester" | "second" | "2" => Some(PregnancyStage::SecondTrimester),
            "3rd_trimester" | "third" | "3" => Some(PregnancyStage::ThirdTrimester),
            "postpartum" => Some(PregnancyStage::Postpartum),
            _ => None,
        }
    }
}

/// Structured attributes captured with a signal. Every field is optional so
/// malformed or partial input degrades to defaults instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_stage: Option<PregnancyStage>,

    #[serde(default = "default_language")]
    pub language: String,

    /// District-level geography only, never an address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

impl Default for SignalContext {
    fn default() -> Self {
        Self {
            age: None,
            pregnancy_stage: None,
            language: default_language(),
            district: None,
        }
    }
}

impl SignalContext {
    /// Text used for embedding: the statement prefixed with the context that
    /// changes its clinical meaning.
    pub fn enrich(&self, text: &str) -> String {
        let mut enriched = match self.pregnancy_stage {
            Some(stage) => format!("Pregnancy {}: {}", stage.as_str(), text),
            None => text.to_string(),
        };
        if let Some(age) = self.age {
            enriched = format!("Age {} {}", age, enriched);
        }
        enriched
    }
}

fn default_language() -> String {
    "hi".to_string()
}

/// Risk value that can never leave [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(f64);

impl RiskScore {
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Influence weight in (0, 1]. Multiplicative decay can approach but never
/// reach zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(f64);

impl Weight {
    pub const FULL: Weight = Weight(1.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::FULL;
        }
        Self(value.clamp(f64::MIN_POSITIVE, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn decayed(&self, factor: f64) -> Self {
        Self::new(self.0 * factor)
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSignal {
    pub id: SignalId,
    pub user_id: UserId,
    pub text: String,
    pub signal_type: SignalType,
    pub timestamp: DateTime<Utc>,
    pub risk_score: RiskScore,
    pub weight: Weight,
    pub context: SignalContext,
    /// Point vector; not part of the payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl HealthSignal {
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_days()
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(self.id.0.to_string()));
        payload.insert("user_id".to_string(), json!(self.user_id.as_str()));
        payload.insert("text".to_string(), json!(self.text));
        payload.insert("signal_type".to_string(), json!(self.signal_type.as_str()));
        payload.insert("timestamp".to_string(), json!(self.timestamp.timestamp()));
        payload.insert("risk_score".to_string(), json!(self.risk_score.value()));
        payload.insert("weight".to_string(), json!(self.weight.value()));
        payload.insert("language".to_string(), json!(self.context.language));

        if let Some(age) = self.context.age {
            payload.insert("age".to_string(), json!(age));
        }
        if let Some(stage) = self.context.pregnancy_stage {
            payload.insert("pregnancy_stage".to_string(), json!(stage.as_str()));
        }
        if let Some(ref district) = self.context.district {
            payload.insert("district".to_string(), json!(district));
        }

        payload
    }

    /// Rebuild a signal from a stored payload. Missing optional fields fall
    /// back to defaults; missing identity fields are an error.
    pub fn from_payload(
        payload: &Map<String, Value>,
        embedding: Vec<f32>,
    ) -> Result<Self, PayloadError> {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or(PayloadError::Missing("id"))?;
        let id = Uuid::parse_str(id).map_err(|_| PayloadError::Invalid("id"))?;

        let user_id = payload
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or(PayloadError::Missing("user_id"))?;

        let timestamp = payload
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or(PayloadError::Missing("timestamp"))?;
        let timestamp =
            DateTime::from_timestamp(timestamp, 0).ok_or(PayloadError::Invalid("timestamp"))?;

        let risk_score = payload
            .get("risk_score")
            .and_then(Value::as_f64)
            .ok_or(PayloadError::Missing("risk_score"))?;

        let weight = payload.get("weight").and_then(Value::as_f64).unwrap_or(1.0);

        let signal_type = payload
            .get("signal_type")
            .and_then(Value::as_str)
            .and_then(SignalType::parse)
            .unwrap_or_default();

        let context = SignalContext {
            age: payload.get("age").and_then(Value::as_u64).map(|a| a as u32),
            pregnancy_stage: payload
                .get("pregnancy_stage")
                .and_then(Value::as_str)
                .and_then(PregnancyStage::parse),
            language: payload
                .get("language")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(default_language),
            district: payload
                .get("district")
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        Ok(Self {
            id: SignalId(id),
            user_id: UserId::from_anonymized(user_id),
            text: payload
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            signal_type,
            timestamp,
            risk_score: RiskScore::new(risk_score),
            weight: Weight::new(weight),
            context,
            embedding,
        })
    }
}

/// Input to the evolution engine: everything about a new utterance except
/// the values the engine derives (id, risk, weight, timestamp).
#[derive(Debug, Clone)]
pub struct SignalDraft {
    pub user_id: UserId,
    pub text: String,
    pub signal_type: SignalType,
    pub context: SignalContext,
    pub embedding: Vec<f32>,
}

/// A prior signal of the same user returned by similarity search.
#[derive(Debug, Clone)]
pub struct SimilarMemory {
    pub signal: HealthSignal,
    pub similarity: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PayloadError {
    #[error("Missing payload field: {0}")]
    Missing(&'static str),

    #[error("Invalid payload field: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal() -> HealthSignal {
        HealthSignal {
            id: SignalId::new(),
            user_id: UserId::anonymize("9876543210"),
            text: "headache since morning".to_string(),
            signal_type: SignalType::Symptom,
            timestamp: DateTime::from_timestamp(1_760_000_000, 0).unwrap(),
            risk_score: RiskScore::new(0.5),
            weight: Weight::new(0.95),
            context: SignalContext {
                age: Some(24),
                pregnancy_stage: Some(PregnancyStage::ThirdTrimester),
                language: "hi".to_string(),
                district: Some("Sitapur".to_string()),
            },
            embedding: vec![],
        }
    }

    #[test]
    fn test_risk_score_is_clamped() {
        assert_eq!(RiskScore::new(1.7).value(), 1.0);
        assert_eq!(RiskScore::new(-0.2).value(), 0.0);
        assert_eq!(RiskScore::new(f64::NAN).value(), 0.0);
        assert_eq!(RiskScore::new(0.42).value(), 0.42);
    }

    #[test]
    fn test_weight_stays_positive() {
        assert_eq!(Weight::new(3.0).value(), 1.0);
        assert!(Weight::new(0.0).value() > 0.0);
        assert!(Weight::new(-1.0).value() > 0.0);

        let mut weight = Weight::FULL;
        for _ in 0..20_000 {
            weight = weight.decayed(0.95);
        }
        assert!(weight.value() > 0.0);
    }

    #[test]
    fn test_anonymize_is_stable_and_opaque() {
        let a = UserId::anonymize("9876543210");
        let b = UserId::anonymize(" 9876543210 ");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert!(!a.as_str().contains("9876543210"));
        assert_ne!(a, UserId::anonymize("9876543211"));
    }

    #[test]
    fn test_payload_preserves_signal_fields() {
        let signal = sample_signal();
        let payload = signal.to_payload();

        assert_eq!(payload["timestamp"], json!(1_760_000_000i64));
        assert_eq!(payload["pregnancy_stage"], json!("3rd_trimester"));

        let restored = HealthSignal::from_payload(&payload, vec![]).unwrap();
        assert_eq!(restored, signal);
    }

    #[test]
    fn test_payload_missing_identity_is_rejected() {
        let mut payload = sample_signal().to_payload();
        payload.remove("user_id");
        assert_eq!(
            HealthSignal::from_payload(&payload, vec![]).unwrap_err(),
            PayloadError::Missing("user_id")
        );
    }

    #[test]
    fn test_context_enrichment() {
        let context = SignalContext {
            age: Some(19),
            pregnancy_stage: Some(PregnancyStage::FirstTrimester),
            ..Default::default()
        };
        assert_eq!(
            context.enrich("feeling dizzy"),
            "Age 19 Pregnancy 1st_trimester: feeling dizzy"
        );
        assert_eq!(SignalContext::default().enrich("fever"), "fever");
    }
}
