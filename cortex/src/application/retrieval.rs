// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Retrieval Engine
//!
//! Fetches evidence for a query from the user's own memory and the two
//! reference collections, then merges everything into one ranked list.
//!
//! ## Ranking
//!
//! Every candidate gets up to three sub-scores in [0, 1]:
//!
//! - **similarity**: the store's score, clamped;
//! - **risk**: the payload `risk_score` (user memories only);
//! - **recency**: `1 - age_days / recency_horizon_days`, clamped.
//!
//! The final score is the weighted sum over the sub-scores that exist,
//! divided by the sum of their weights. Ties go to the newer item; items
//! without a timestamp count as oldest.
//!
//! The read path never fails: embedding or search errors are logged and the
//! bundle comes back with `evidence_found = false`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{
    CollectionNames, HealthSignal, RankingConfig, RankingWeights, SignalContext, SimilarMemory,
    UserId,
};
use crate::infrastructure::{
    Condition, EmbeddingProvider, Filter, Payload, ScoredPoint, StoreError, VectorStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    UserMemory,
    Knowledge,
    Nutrition,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::UserMemory => "user_memory",
            CandidateSource::Knowledge => "knowledge",
            CandidateSource::Nutrition => "nutrition",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub similarity: f64,
    pub risk: Option<f64>,
    pub recency: Option<f64>,
}

impl SubScores {
    /// Weighted sum renormalized over the sub-scores that are present
    pub fn weighted(&self, weights: &RankingWeights) -> f64 {
        let mut total = weights.similarity * self.similarity;
        let mut weight_sum = weights.similarity;

        if let Some(risk) = self.risk {
            total += weights.risk * risk;
            weight_sum += weights.risk;
        }
        if let Some(recency) = self.recency {
            total += weights.recency * recency;
            weight_sum += weights.recency;
        }

        if weight_sum <= 0.0 {
            return 0.0;
        }
        total / weight_sum
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub id: String,
    pub source: CandidateSource,
    pub score: f64,
    pub sub_scores: SubScores,
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: Payload,
}

impl RankedCandidate {
    /// Human-readable text of the candidate, whatever collection it came from
    pub fn text(&self) -> &str {
        let key = match self.source {
            CandidateSource::UserMemory => "text",
            CandidateSource::Knowledge => "content",
            CandidateSource::Nutrition => "food_item",
        };
        self.payload.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvidenceBundle {
    /// Merged and truncated ranking
    pub candidates: Vec<RankedCandidate>,
    pub evidence_found: bool,
    pub user_memory_count: usize,
    pub knowledge_count: usize,
    pub nutrition_count: usize,
    similar: Vec<SimilarMemory>,
}

impl EvidenceBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    /// User memories with their similarity, best first
    pub fn similar_memories(&self) -> &[SimilarMemory] {
        &self.similar
    }

    /// At least one knowledge entry, or at least two user memories
    pub fn is_sufficient(&self) -> bool {
        self.knowledge_count >= 1 || self.user_memory_count >= 2
    }
}

pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collections: CollectionNames,
    config: RankingConfig,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        collections: CollectionNames,
        config: RankingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            collections,
            config,
        }
    }

    pub async fn retrieve(
        &self,
        query_text: &str,
        user_id: &UserId,
        context: &SignalContext,
    ) -> EvidenceBundle {
        let vector = match self.embedder.embed(&context.enrich(query_text)).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Embedding failed, continuing without evidence");
                return EvidenceBundle::empty();
            }
        };
        self.retrieve_with_vector(&vector, user_id).await
    }

    pub async fn retrieve_with_vector(&self, vector: &[f32], user_id: &UserId) -> EvidenceBundle {
        self.retrieve_with_vector_at(Utc::now(), vector, user_id).await
    }

    pub async fn retrieve_with_vector_at(
        &self,
        now: DateTime<Utc>,
        vector: &[f32],
        user_id: &UserId,
    ) -> EvidenceBundle {
        let limit = self.config.per_collection_limit;

        let user_hits = self
            .soft_search(&self.collections.user_memory, vector, Some(user_filter(user_id)), limit)
            .await;
        let knowledge_hits = self
            .soft_search(&self.collections.knowledge, vector, None, limit)
            .await;
        let nutrition_hits = self
            .soft_search(&self.collections.nutrition, vector, None, limit)
            .await;

        let similar: Vec<SimilarMemory> = user_hits.iter().filter_map(to_similar_memory).collect();

        let mut bundle = EvidenceBundle {
            evidence_found: !(user_hits.is_empty()
                && knowledge_hits.is_empty()
                && nutrition_hits.is_empty()),
            user_memory_count: user_hits.len(),
            knowledge_count: knowledge_hits.len(),
            nutrition_count: nutrition_hits.len(),
            similar,
            candidates: Vec::new(),
        };

        let candidates = user_hits
            .into_iter()
            .map(|p| self.rank(now, p, CandidateSource::UserMemory))
            .chain(
                knowledge_hits
                    .into_iter()
                    .map(|p| self.rank(now, p, CandidateSource::Knowledge)),
            )
            .chain(
                nutrition_hits
                    .into_iter()
                    .map(|p| self.rank(now, p, CandidateSource::Nutrition)),
            )
            .collect();

        bundle.candidates = merge(candidates, self.config.max_results);

        metrics::histogram!("asha_retrieval_candidates").record(bundle.candidates.len() as f64);
        debug!(
            user = user_id.short(),
            user_memories = bundle.user_memory_count,
            knowledge = bundle.knowledge_count,
            nutrition = bundle.nutrition_count,
            evidence_found = bundle.evidence_found,
            "Retrieved evidence"
        );

        bundle
    }

    /// Similar memories of one user; errors propagate (write path)
    pub async fn search_user_memories(
        &self,
        vector: &[f32],
        user_id: &UserId,
    ) -> Result<Vec<SimilarMemory>, StoreError> {
        let hits = self
            .store
            .search(
                &self.collections.user_memory,
                vector,
                Some(user_filter(user_id)),
                self.config.per_collection_limit,
            )
            .await?;
        Ok(hits.iter().filter_map(to_similar_memory).collect())
    }

    async fn soft_search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Filter>,
        limit: usize,
    ) -> Vec<ScoredPoint> {
        match self.store.search(collection, vector, filter, limit).await {
            Ok(points) => points,
            Err(e) => {
                warn!(collection, error = %e, "Search failed, treating collection as empty");
                Vec::new()
            }
        }
    }

    fn rank(&self, now: DateTime<Utc>, point: ScoredPoint, source: CandidateSource) -> RankedCandidate {
        let timestamp = point
            .payload
            .get("timestamp")
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        let sub_scores = SubScores {
            similarity: unit_score(point.score),
            risk: point
                .payload
                .get("risk_score")
                .and_then(Value::as_f64)
                .map(unit_score),
            recency: timestamp.map(|ts| self.recency(now, ts)),
        };

        RankedCandidate {
            id: point.id,
            source,
            score: sub_scores.weighted(&self.config.weights),
            sub_scores,
            timestamp,
            payload: point.payload,
        }
    }

    fn recency(&self, now: DateTime<Utc>, timestamp: DateTime<Utc>) -> f64 {
        let horizon = self.config.recency_horizon_days;
        if horizon <= 0.0 {
            return 0.0;
        }
        let age_days = (now - timestamp).num_seconds() as f64 / 86_400.0;
        (1.0 - age_days / horizon).clamp(0.0, 1.0)
    }
}

fn user_filter(user_id: &UserId) -> Filter {
    Filter::must([Condition::keyword("user_id", user_id.as_str())])
}

fn to_similar_memory(point: &ScoredPoint) -> Option<SimilarMemory> {
    match HealthSignal::from_payload(&point.payload, Vec::new()) {
        Ok(signal) => Some(SimilarMemory {
            signal,
            similarity: unit_score(point.score),
        }),
        Err(e) => {
            warn!(point = %point.id, error = %e, "Skipping malformed memory payload");
            None
        }
    }
}

/// Clamp to [0, 1]; a non-finite store score counts as no match
fn unit_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Sort by score, newer first on ties, and keep the best `max_results`
fn merge(mut candidates: Vec<RankedCandidate>, max_results: usize) -> Vec<RankedCandidate> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    candidates.truncate(max_results);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskScore, SignalId, SignalType, Weight};
    use crate::infrastructure::{
        EmbeddingError, HashEmbeddingProvider, InMemoryVectorStore, ScrollPage,
    };
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn ensure_collection(&self, _: &str, _: usize) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn upsert(&self, _: &str, _: &str, _: Vec<f32>, _: Payload) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn search(
            &self,
            _: &str,
            _: &[f32],
            _: Option<Filter>,
            _: usize,
        ) -> Result<Vec<ScoredPoint>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn scroll(
            &self,
            _: &str,
            _: Option<Filter>,
            _: usize,
            _: Option<String>,
        ) -> Result<ScrollPage, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn set_payload(&self, _: &str, _: &str, _: Payload) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Request("connection refused".to_string()))
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn candidate(score: f64, timestamp: Option<DateTime<Utc>>, id: &str) -> RankedCandidate {
        RankedCandidate {
            id: id.to_string(),
            source: CandidateSource::UserMemory,
            score,
            sub_scores: SubScores {
                similarity: score,
                risk: None,
                recency: None,
            },
            timestamp,
            payload: Payload::new(),
        }
    }

    fn engine(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> RetrievalEngine {
        RetrievalEngine::new(
            store,
            embedder,
            CollectionNames::default(),
            RankingConfig::default(),
        )
    }

    fn stored_signal(user: &UserId, now: DateTime<Utc>, days_ago: i64, risk: f64) -> HealthSignal {
        HealthSignal {
            id: SignalId::new(),
            user_id: user.clone(),
            text: "swelling in feet".to_string(),
            signal_type: SignalType::Symptom,
            timestamp: now - Duration::days(days_ago),
            risk_score: RiskScore::new(risk),
            weight: Weight::FULL,
            context: SignalContext::default(),
            embedding: vec![1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn test_weighted_sum_orders_risk_and_recency_over_similarity() {
        let weights = RankingWeights::default();
        let a = SubScores {
            similarity: 0.9,
            risk: Some(0.1),
            recency: Some(0.1),
        };
        let b = SubScores {
            similarity: 0.5,
            risk: Some(0.9),
            recency: Some(0.9),
        };

        assert!((a.weighted(&weights) - 0.34).abs() < 1e-9);
        assert!((b.weighted(&weights) - 0.78).abs() < 1e-9);

        let ranked = merge(
            vec![
                candidate(a.weighted(&weights), None, "a"),
                candidate(b.weighted(&weights), None, "b"),
            ],
            5,
        );
        assert_eq!(ranked[0].id, "b");
        assert_eq!(ranked[1].id, "a");
    }

    #[test]
    fn test_non_finite_store_scores_rank_last() {
        let engine = engine(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashEmbeddingProvider::new(3)),
        );
        let now = Utc::now();
        let point = |id: &str, score: f64| ScoredPoint {
            id: id.to_string(),
            score,
            payload: Payload::new(),
        };

        let nan = engine.rank(now, point("nan", f64::NAN), CandidateSource::Knowledge);
        let inf = engine.rank(now, point("inf", f64::INFINITY), CandidateSource::Knowledge);
        let good = engine.rank(now, point("good", 0.4), CandidateSource::Knowledge);

        assert_eq!(nan.sub_scores.similarity, 0.0);
        assert_eq!(nan.score, 0.0);
        assert_eq!(inf.score, 0.0);

        let ranked = merge(vec![nan, good, inf], 5);
        assert_eq!(ranked[0].id, "good");
        assert!(ranked.iter().all(|c| c.score.is_finite()));
    }

    #[test]
    fn test_missing_terms_are_renormalized() {
        let weights = RankingWeights::default();
        let similarity_only = SubScores {
            similarity: 0.8,
            risk: None,
            recency: None,
        };
        assert!((similarity_only.weighted(&weights) - 0.8).abs() < 1e-9);

        // (0.3 * 0.5 + 0.4 * 1.0) / 0.7
        let no_recency = SubScores {
            similarity: 0.5,
            risk: Some(1.0),
            recency: None,
        };
        assert!((no_recency.weighted(&weights) - 0.55 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_ties_prefer_newer_and_truncate() {
        let now = Utc::now();
        let ranked = merge(
            vec![
                candidate(0.5, None, "undated"),
                candidate(0.5, Some(now - Duration::days(10)), "older"),
                candidate(0.5, Some(now), "newer"),
                candidate(0.9, None, "best"),
            ],
            3,
        );

        let ids: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "newer", "older"]);
    }

    #[tokio::test]
    async fn test_retrieve_merges_collections_for_one_user() {
        let now = Utc::now();
        let store = Arc::new(InMemoryVectorStore::new());
        let user = UserId::anonymize("device-42");
        let other = UserId::anonymize("device-99");

        for signal in [
            stored_signal(&user, now, 2, 0.6),
            stored_signal(&user, now, 40, 0.2),
            stored_signal(&other, now, 1, 0.9),
        ] {
            store
                .upsert(
                    "user_health_memory",
                    &signal.id.to_string(),
                    signal.embedding.clone(),
                    signal.to_payload(),
                )
                .await
                .unwrap();
        }

        let mut knowledge = Payload::new();
        knowledge.insert("content".to_string(), json!("Swelling of feet can signal pre-eclampsia"));
        store
            .upsert("verified_medical_knowledge", "k1", vec![0.5, 0.5, 0.7], knowledge)
            .await
            .unwrap();

        let engine = engine(store, Arc::new(HashEmbeddingProvider::new(3)));
        let bundle = engine
            .retrieve_with_vector_at(now, &[1.0, 0.0, 0.0], &user)
            .await;

        assert!(bundle.evidence_found);
        assert_eq!(bundle.user_memory_count, 2);
        assert_eq!(bundle.knowledge_count, 1);
        assert_eq!(bundle.nutrition_count, 0);
        assert!(bundle.is_sufficient());
        assert!(bundle
            .similar_memories()
            .iter()
            .all(|m| m.signal.user_id == user));

        // Recent higher-risk memory beats the reference entry and the old one
        assert_eq!(bundle.candidates[0].source, CandidateSource::UserMemory);
        assert_eq!(bundle.candidates[0].payload["risk_score"], json!(0.6));
        assert_eq!(bundle.candidates.len(), 3);
        assert!(bundle
            .candidates
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_failures_mean_no_evidence() {
        let user = UserId::anonymize("device-1");

        let engine_down = engine(Arc::new(FailingStore), Arc::new(HashEmbeddingProvider::new(3)));
        let bundle = engine_down
            .retrieve("bukhar", &user, &SignalContext::default())
            .await;
        assert!(!bundle.evidence_found);
        assert!(bundle.candidates.is_empty());

        let embed_down = engine(Arc::new(InMemoryVectorStore::new()), Arc::new(FailingEmbedder));
        let bundle = embed_down
            .retrieve("bukhar", &user, &SignalContext::default())
            .await;
        assert!(!bundle.evidence_found);
        assert!(!bundle.is_sufficient());

        assert!(engine_down
            .search_user_memories(&[1.0, 0.0, 0.0], &user)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_store_has_no_evidence() {
        let engine = engine(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashEmbeddingProvider::new(3)),
        );
        let bundle = engine
            .retrieve("chakkar", &UserId::anonymize("x"), &SignalContext::default())
            .await;
        assert!(!bundle.evidence_found);
    }
}
