// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the health memory bounded context

pub mod repository;
pub mod in_memory_store;
pub mod qdrant_repository;
pub mod embedding_client;

pub use repository::{
    Condition, Filter, MatchValue, Payload, ScoredPoint, ScrollPage, StoreError, StoredPoint,
    VectorStore,
};
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_repository::QdrantVectorStore;
pub use embedding_client::{
    EmbeddingError, EmbeddingProvider, HashEmbeddingProvider, OllamaEmbeddingProvider,
};
