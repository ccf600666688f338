// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Memory Evolution Engine
//!
//! Turns a new utterance into a persisted [`HealthSignal`] and evolves the
//! user's existing memory around it.
//!
//! ## Reinforcement
//!
//! When the user reported something similar (similarity above
//! `similarity_threshold`) more than `reinforcement_min_similar` times within
//! the trailing `reinforcement_window_days`, the base risk is multiplied by
//! `reinforcement_factor` once. The rule is a step function: three repeats
//! and thirty repeats get the same boost.
//!
//! ## Lazy decay
//!
//! There is no background sweep. Each call decays the history it was handed:
//! signals older than `decay_min_age_days` with risk below
//! `decay_risk_ceiling` get `weight *= decay_factor`. Only `weight` ever
//! changes on a stored signal; `risk_score` is immutable. A record seen by
//! several calls decays once per call.
//!
//! ## Failure policy
//!
//! Persisting the new signal must succeed, otherwise the call fails and no
//! weight update is attempted. Weight updates are best effort: a failed
//! update is logged and reported with `persisted: false`.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::risk_scorer::RiskScorer;
use crate::domain::privacy::payload_contains_pii;
use crate::domain::{
    EvolutionConfig, HealthMemoryEvent, HealthSignal, RiskScore, SignalDraft, SignalId,
    SimilarMemory, Weight,
};
use crate::infrastructure::{Payload, StoreError, VectorStore};

#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Failed to persist signal: {0}")]
    Persist(#[source] StoreError),

    #[error("Refusing to persist signal: payload contains personal identifiers")]
    PiiDetected,

    #[error("Signal draft has no embedding")]
    MissingEmbedding,
}

/// Result of persisting one decayed weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightUpdate {
    pub signal_id: SignalId,
    pub old_weight: Weight,
    pub new_weight: Weight,
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    /// The newly persisted signal (weight 1.0)
    pub signal: HealthSignal,
    /// Risk before reinforcement
    pub base_risk: RiskScore,
    /// Similar memories that counted towards reinforcement
    pub similar_count: usize,
    pub reinforced: bool,
    pub weight_updates: Vec<WeightUpdate>,
    pub events: Vec<HealthMemoryEvent>,
}

impl EvolutionOutcome {
    /// Reflect the decayed weights in an in-memory copy of the history
    pub fn apply_to(&self, history: &mut [HealthSignal]) {
        for update in &self.weight_updates {
            if let Some(signal) = history.iter_mut().find(|s| s.id == update.signal_id) {
                signal.weight = update.new_weight;
            }
        }
    }
}

pub struct MemoryEvolutionEngine {
    store: Arc<dyn VectorStore>,
    scorer: RiskScorer,
    config: EvolutionConfig,
    collection: String,
}

impl MemoryEvolutionEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        scorer: RiskScorer,
        config: EvolutionConfig,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scorer,
            config,
            collection: collection.into(),
        }
    }

    pub async fn evolve(
        &self,
        draft: SignalDraft,
        history: &[HealthSignal],
        similar: &[SimilarMemory],
    ) -> Result<EvolutionOutcome, EvolutionError> {
        self.evolve_at(Utc::now(), draft, history, similar).await
    }

    pub async fn evolve_at(
        &self,
        now: DateTime<Utc>,
        draft: SignalDraft,
        history: &[HealthSignal],
        similar: &[SimilarMemory],
    ) -> Result<EvolutionOutcome, EvolutionError> {
        if draft.embedding.is_empty() {
            return Err(EvolutionError::MissingEmbedding);
        }

        let base_risk = self.scorer.score(&draft.text, &draft.context);

        let similar_count = self.count_reinforcing(now, &draft, similar);
        let reinforced = similar_count > self.config.reinforcement_min_similar;
        let final_risk = if reinforced {
            RiskScore::new(base_risk.value() * self.config.reinforcement_factor)
        } else {
            base_risk
        };

        let decayed = self.decay_candidates(now, &draft, history);

        let signal = HealthSignal {
            id: SignalId::new(),
            user_id: draft.user_id,
            text: draft.text,
            signal_type: draft.signal_type,
            timestamp: now,
            risk_score: final_risk,
            weight: Weight::FULL,
            context: draft.context,
            embedding: draft.embedding,
        };

        let payload = signal.to_payload();
        if payload_contains_pii(&payload) {
            warn!(signal_id = %signal.id, "Signal payload still contains PII, not persisting");
            return Err(EvolutionError::PiiDetected);
        }

        self.store
            .upsert(
                &self.collection,
                &signal.id.to_string(),
                signal.embedding.clone(),
                payload,
            )
            .await
            .map_err(EvolutionError::Persist)?;

        metrics::counter!("asha_signals_recorded_total").increment(1);
        info!(
            signal_id = %signal.id,
            user = signal.user_id.short(),
            base_risk = base_risk.value(),
            final_risk = final_risk.value(),
            similar_count,
            reinforced,
            "Recorded health signal"
        );

        let mut events = vec![HealthMemoryEvent::SignalRecorded {
            signal_id: signal.id,
            user_id: signal.user_id.clone(),
            base_risk: base_risk.value(),
            final_risk: final_risk.value(),
            timestamp: now,
        }];
        if reinforced {
            events.push(HealthMemoryEvent::SignalReinforced {
                signal_id: signal.id,
                similar_count,
                factor: self.config.reinforcement_factor,
                timestamp: now,
            });
        }

        let mut weight_updates = Vec::with_capacity(decayed.len());
        for (signal_id, old_weight, new_weight) in decayed {
            let persisted = self.persist_weight(signal_id, new_weight).await;
            events.push(HealthMemoryEvent::WeightDecayed {
                signal_id,
                old_weight: old_weight.value(),
                new_weight: new_weight.value(),
                persisted,
                timestamp: now,
            });
            weight_updates.push(WeightUpdate {
                signal_id,
                old_weight,
                new_weight,
                persisted,
            });
        }

        Ok(EvolutionOutcome {
            signal,
            base_risk,
            similar_count,
            reinforced,
            weight_updates,
            events,
        })
    }

    /// Similar memories of the same user inside the reinforcement window
    fn count_reinforcing(
        &self,
        now: DateTime<Utc>,
        draft: &SignalDraft,
        similar: &[SimilarMemory],
    ) -> usize {
        let window = Duration::days(self.config.reinforcement_window_days);
        similar
            .iter()
            .filter(|m| m.signal.user_id == draft.user_id)
            .filter(|m| now - m.signal.timestamp <= window)
            .filter(|m| m.similarity > self.config.similarity_threshold)
            .count()
    }

    fn decay_candidates(
        &self,
        now: DateTime<Utc>,
        draft: &SignalDraft,
        history: &[HealthSignal],
    ) -> Vec<(SignalId, Weight, Weight)> {
        let min_age = Duration::days(self.config.decay_min_age_days);
        history
            .iter()
            .filter(|s| s.user_id == draft.user_id)
            .filter(|s| now - s.timestamp > min_age)
            .filter(|s| s.risk_score.value() < self.config.decay_risk_ceiling)
            .map(|s| (s.id, s.weight, s.weight.decayed(self.config.decay_factor)))
            .collect()
    }

    async fn persist_weight(&self, signal_id: SignalId, weight: Weight) -> bool {
        let mut payload = Payload::new();
        payload.insert("weight".to_string(), serde_json::json!(weight.value()));

        match self
            .store
            .set_payload(&self.collection, &signal_id.to_string(), payload)
            .await
        {
            Ok(()) => {
                debug!(signal_id = %signal_id, weight = weight.value(), "Persisted decayed weight");
                true
            }
            Err(e) => {
                warn!(signal_id = %signal_id, error = %e, "Failed to persist decayed weight");
                false
            }
        }
    }
}
