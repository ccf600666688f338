// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Qdrant production implementation of the vector store
//!
//! Holds the user health memory and the read-only reference collections.
//! Payloads travel as JSON maps inside the core and are converted to Qdrant
//! values at this boundary.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements internal responsibilities for qdrant repository

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, Condition as QdrantCondition,
        CreateCollectionBuilder, Distance, Filter as QdrantFilter, ListValue, PointId,
        PointStruct, Range, ScrollPointsBuilder, SearchPointsBuilder, SetPayloadPointsBuilder,
        Struct, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    },
    Qdrant,
};
use serde_json::{Number, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::infrastructure::repository::{
    Condition, Filter, MatchValue, Payload, ScoredPoint, ScrollPage, StoreError, StoredPoint,
    VectorStore,
};

pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store client
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self { client })
    }

    fn to_qdrant_filter(filter: &Filter) -> QdrantFilter {
        let conditions: Vec<QdrantCondition> = filter
            .must
            .iter()
            .map(|condition| match condition {
                Condition::Match { key, value } => match value {
                    MatchValue::Keyword(s) => QdrantCondition::matches(key.as_str(), s.clone()),
                    MatchValue::Integer(i) => QdrantCondition::matches(key.as_str(), *i),
                    MatchValue::Bool(b) => QdrantCondition::matches(key.as_str(), *b),
                },
                Condition::Range { key, gte, lt } => QdrantCondition::range(
                    key.as_str(),
                    Range {
                        gte: *gte,
                        lt: *lt,
                        ..Default::default()
                    },
                ),
            })
            .collect();

        QdrantFilter::must(conditions)
    }

    fn to_qdrant_payload(payload: Payload) -> HashMap<String, QdrantValue> {
        payload
            .into_iter()
            .map(|(key, value)| (key, Self::to_qdrant_value(value)))
            .collect()
    }

    fn to_qdrant_value(value: Value) -> QdrantValue {
        let kind = match value {
            Value::Null => Kind::NullValue(0),
            Value::Bool(b) => Kind::BoolValue(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Kind::IntegerValue(i),
                None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Kind::StringValue(s),
            Value::Array(items) => Kind::ListValue(ListValue {
                values: items.into_iter().map(Self::to_qdrant_value).collect(),
            }),
            Value::Object(map) => Kind::StructValue(Struct {
                fields: Self::to_qdrant_payload(map),
            }),
        };
        QdrantValue { kind: Some(kind) }
    }

    fn from_qdrant_payload(payload: HashMap<String, QdrantValue>) -> Payload {
        payload
            .into_iter()
            .map(|(key, value)| (key, Self::from_qdrant_value(value)))
            .collect()
    }

    fn from_qdrant_value(value: QdrantValue) -> Value {
        match value.kind {
            None | Some(Kind::NullValue(_)) => Value::Null,
            Some(Kind::BoolValue(b)) => Value::Bool(b),
            Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
            Some(Kind::DoubleValue(d)) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
            Some(Kind::StringValue(s)) => Value::String(s),
            Some(Kind::ListValue(list)) => {
                Value::Array(list.values.into_iter().map(Self::from_qdrant_value).collect())
            }
            Some(Kind::StructValue(s)) => Value::Object(Self::from_qdrant_payload(s.fields)),
        }
    }

    /// Prefer the id copied into the payload; fall back to the point id
    fn point_id(id: Option<PointId>, payload: &Payload) -> String {
        if let Some(Value::String(s)) = payload.get("id") {
            return s.clone();
        }
        match id.and_then(|p| p.point_id_options) {
            Some(PointIdOptions::Uuid(s)) => s,
            Some(PointIdOptions::Num(n)) => n.to_string(),
            None => String::new(),
        }
    }
}

impl QdrantVectorStore {
    /// Numeric ids round-trip as numbers, everything else as a UUID string
    fn parse_point_id(id: String) -> PointId {
        match id.parse::<u64>() {
            Ok(n) => PointId::from(n),
            Err(_) => PointId::from(id),
        }
    }
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", context, e))
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<(), StoreError> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| unavailable("Failed to check collection existence", e))?;

        if exists {
            debug!(collection, "Collection exists");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| unavailable("Failed to create Qdrant collection", e))?;

        info!(collection, dimension, "Created collection");
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<(), StoreError> {
        let point = PointStruct::new(id.to_string(), vector, Self::to_qdrant_payload(payload));

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(|e| unavailable("Failed to upsert point in Qdrant", e))?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let mut builder = SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
            .with_payload(true);

        if let Some(ref filter) = filter {
            if !filter.is_empty() {
                builder = builder.filter(Self::to_qdrant_filter(filter));
            }
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| unavailable("Failed to search Qdrant", e))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let payload = Self::from_qdrant_payload(point.payload);
                ScoredPoint {
                    id: Self::point_id(point.id, &payload),
                    score: point.score as f64,
                    payload,
                }
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<Filter>,
        limit: usize,
        offset: Option<String>,
    ) -> Result<ScrollPage, StoreError> {
        let mut builder = ScrollPointsBuilder::new(collection)
            .with_payload(true)
            .limit(limit.max(1) as u32);

        if let Some(ref filter) = filter {
            if !filter.is_empty() {
                builder = builder.filter(Self::to_qdrant_filter(filter));
            }
        }
        if let Some(offset) = offset {
            builder = builder.offset(Self::parse_point_id(offset));
        }

        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| unavailable("Failed to scroll Qdrant", e))?;

        let next_offset = response
            .next_page_offset
            .and_then(|id| id.point_id_options)
            .map(|options| match options {
                PointIdOptions::Uuid(s) => s,
                PointIdOptions::Num(n) => n.to_string(),
            });

        let points = response
            .result
            .into_iter()
            .map(|point| {
                let payload = Self::from_qdrant_payload(point.payload);
                StoredPoint {
                    id: Self::point_id(point.id, &payload),
                    payload,
                }
            })
            .collect();

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
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(collection, Self::to_qdrant_payload(payload))
                    .points_selector(vec![PointId::from(id.to_string())])
                    .wait(true),
            )
            .await
            .map_err(|e| unavailable("Failed to update payload in Qdrant", e))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .health_check()
            .await
            .map_err(|e| unavailable("Qdrant health check failed", e))?;
        Ok(())
    }
}
