// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Vector store contract for the health memory bounded context
//!
//! The core only needs upsert / search / scroll / set_payload over named
//! collections. Nearest-neighbour search, consistency and retries belong to
//! the implementation behind this trait.

use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Payload = Map<String, Value>;

/// A search hit with the store's similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f64,
    pub payload: Payload,
}

/// A point returned by a filtered scroll (no score, no ordering guarantee)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: String,
    pub payload: Payload,
}

/// One page of a filtered scroll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    /// Cursor for the next page, `None` once the scan is exhausted
    pub next_offset: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    Keyword(String),
    Integer(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact match on a payload field
    Match { key: String, value: MatchValue },
    /// Numeric range on a payload field: `gte <= v < lt`
    Range {
        key: String,
        gte: Option<f64>,
        lt: Option<f64>,
    },
}

impl Condition {
    pub fn keyword(key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Match {
            key: key.into(),
            value: MatchValue::Keyword(value.into()),
        }
    }

    pub fn range(key: impl Into<String>, gte: Option<f64>, lt: Option<f64>) -> Self {
        Condition::Range {
            key: key.into(),
            gte,
            lt,
        }
    }

    /// Evaluate the condition against a payload (used by the in-memory store)
    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Condition::Match { key, value } => match (payload.get(key), value) {
                (Some(Value::String(s)), MatchValue::Keyword(k)) => s == k,
                (Some(Value::Number(n)), MatchValue::Integer(i)) => n.as_i64() == Some(*i),
                (Some(Value::Bool(b)), MatchValue::Bool(expected)) => b == expected,
                _ => false,
            },
            Condition::Range { key, gte, lt } => {
                let Some(v) = payload.get(key).and_then(Value::as_f64) else {
                    return false;
                };
                gte.map_or(true, |g| v >= g) && lt.map_or(true, |l| v < l)
            }
        }
    }
}

/// Conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub must: Vec<Condition>,
}

impl Filter {
    pub fn must(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            must: conditions.into_iter().collect(),
        }
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| c.matches(payload))
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Point not found: {0}")]
    PointNotFound(String),

    #[error("Invalid vector dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage for embedded points grouped in named collections
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection (cosine distance) when it does not exist yet
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<(), StoreError>;

    /// Insert or replace a point
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<(), StoreError>;

    /// Nearest neighbours of `vector`, best first
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// One page of points matching `filter`, starting at `offset`.
    /// Order within and across pages is store-defined.
    async fn scroll(
        &self,
        collection: &str,
        filter: Option<Filter>,
        limit: usize,
        offset: Option<String>,
    ) -> Result<ScrollPage, StoreError>;

    /// Every point matching `filter`, fetched `page_size` at a time
    async fn scroll_all(
        &self,
        collection: &str,
        filter: Option<Filter>,
        page_size: usize,
    ) -> Result<Vec<StoredPoint>, StoreError> {
        let page_size = page_size.max(1);
        let mut points = Vec::new();
        let mut offset = None;

        loop {
            let page = self
                .scroll(collection, filter.clone(), page_size, offset.take())
                .await?;
            points.extend(page.points);
            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(points)
    }

    /// Merge `payload` into an existing point without touching its vector
    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        payload: Payload,
    ) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
