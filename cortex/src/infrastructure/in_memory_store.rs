// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory vector store for development and tests
//! Exact cosine search over every point of a collection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::infrastructure::repository::{
    Filter, Payload, ScoredPoint, ScrollPage, StoreError, StoredPoint, VectorStore,
};

#[derive(Debug, Clone)]
struct Point {
    vector: Vec<f32>,
    payload: Payload,
}

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    points: HashMap<String, Point>,
}

pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Calculate cosine similarity between two vectors
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if magnitude_a == 0.0 || magnitude_b == 0.0 {
            return 0.0;
        }

        (dot_product / (magnitude_a * magnitude_b)) as f64
    }

    /// Number of points in a collection (0 when it does not exist)
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Payload> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.points.get(id))
            .map(|p| p.payload.clone())
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dimension,
                points: HashMap::new(),
            });
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        // Collections are created lazily; the first point fixes the dimension
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dimension: vector.len(),
                points: HashMap::new(),
            });

        if entry.dimension != vector.len() {
            return Err(StoreError::InvalidDimension {
                expected: entry.dimension,
                got: vector.len(),
            });
        }

        entry.points.insert(id.to_string(), Point { vector, payload });
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<ScoredPoint> = entry
            .points
            .iter()
            .filter(|(_, point)| filter.as_ref().map_or(true, |f| f.matches(&point.payload)))
            .map(|(id, point)| ScoredPoint {
                id: id.clone(),
                score: Self::cosine_similarity(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();

        // Sort by similarity descending
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        Ok(results)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<Filter>,
        limit: usize,
        offset: Option<String>,
    ) -> Result<ScrollPage, StoreError> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(ScrollPage::default());
        };

        // Id order makes the offset a stable cursor, as in Qdrant
        let mut ids: Vec<&String> = entry
            .points
            .iter()
            .filter(|(_, point)| filter.as_ref().map_or(true, |f| f.matches(&point.payload)))
            .map(|(id, _)| id)
            .collect();
        ids.sort();

        let start = offset
            .as_ref()
            .map_or(0, |o| ids.partition_point(|id| id.as_str() < o.as_str()));
        let remaining = ids.get(start..).unwrap_or_default();
        let limit = limit.max(1);

        let points = remaining
            .iter()
            .take(limit)
            .filter_map(|id| {
                entry.points.get(*id).map(|point| StoredPoint {
                    id: (*id).clone(),
                    payload: point.payload.clone(),
                })
            })
            .collect();
        let next_offset = remaining.get(limit).map(|id| (*id).clone());

        Ok(ScrollPage {
            points,
            next_offset,
        })
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        payload: Payload,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let point = entry
            .points
            .get_mut(id)
            .ok_or_else(|| StoreError::PointNotFound(id.to_string()))?;

        for (key, value) in payload {
            point.payload.insert(key, value);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
