// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedded mode execution
//!
//! Creates the health memory services in-process from configuration and
//! hands them to the commands.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use asha_cortex::application::HealthMemoryService;
use asha_cortex::domain::{
    EmbeddingProviderKind, HealthMemoryConfig, PregnancyStage, SignalContext, SignalType,
    StorageBackend, UserId,
};
use asha_cortex::infrastructure::{
    EmbeddingProvider, HashEmbeddingProvider, InMemoryVectorStore, OllamaEmbeddingProvider,
    QdrantVectorStore, VectorStore,
};

pub struct EmbeddedHealthMemory {
    pub config: HealthMemoryConfig,
    pub service: HealthMemoryService,
}

impl EmbeddedHealthMemory {
    /// Load, validate and wire everything the commands need
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = load_config(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: HealthMemoryConfig) -> Result<Self> {
        let store = build_store(&config)?;
        let embedder = build_embedder(&config);
        let service = HealthMemoryService::new(store, embedder, &config);

        if config.spec.storage.backend == StorageBackend::InMemory {
            eprintln!(
                "{}",
                "Using the in-memory store: nothing is kept after this command exits.".dimmed()
            );
        }

        Ok(Self { config, service })
    }
}

pub fn load_config(config_path: Option<PathBuf>) -> Result<HealthMemoryConfig> {
    let config =
        HealthMemoryConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

pub fn build_store(config: &HealthMemoryConfig) -> Result<Arc<dyn VectorStore>> {
    let storage = &config.spec.storage;
    match storage.backend {
        StorageBackend::InMemory => {
            info!("Using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        StorageBackend::Qdrant => {
            info!(url = %storage.url, "Connecting to Qdrant");
            let store = QdrantVectorStore::new(&storage.url, config.resolved_api_key())
                .context("Failed to create Qdrant client")?;
            Ok(Arc::new(store))
        }
    }
}

pub fn build_embedder(config: &HealthMemoryConfig) -> Arc<dyn EmbeddingProvider> {
    let embedding = &config.spec.embedding;
    match embedding.provider {
        EmbeddingProviderKind::Hash => Arc::new(HashEmbeddingProvider::new(embedding.dimension)),
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingProvider::new(
            embedding.endpoint.clone(),
            embedding.model.clone(),
            embedding.dimension,
        )),
    }
}

/// Resolve the user from either a raw identifier (anonymized here) or an
/// already anonymized id
pub fn resolve_user(raw: Option<&str>, anonymized: Option<&str>) -> Result<UserId> {
    match (raw, anonymized) {
        (Some(raw), _) => Ok(UserId::anonymize(raw)),
        (None, Some(id)) => Ok(UserId::from_anonymized(id)),
        (None, None) => anyhow::bail!("Either --user or --user-id is required"),
    }
}

pub fn parse_signal_type(value: &str) -> Result<SignalType, String> {
    SignalType::parse(value)
        .ok_or_else(|| format!("unknown signal type '{}' (symptom, nutrition, vitals)", value))
}

pub fn parse_pregnancy_stage(value: &str) -> Result<PregnancyStage, String> {
    PregnancyStage::parse(value).ok_or_else(|| {
        format!(
            "unknown pregnancy stage '{}' (1st_trimester, 2nd_trimester, 3rd_trimester, postpartum)",
            value
        )
    })
}

pub fn build_context(
    age: Option<u32>,
    stage: Option<PregnancyStage>,
    language: Option<String>,
    district: Option<String>,
) -> SignalContext {
    let mut context = SignalContext {
        age,
        pregnancy_stage: stage,
        district,
        ..Default::default()
    };
    if let Some(language) = language {
        context.language = language;
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user() {
        let raw = resolve_user(Some("9876543210"), None).unwrap();
        assert_eq!(raw, UserId::anonymize("9876543210"));

        let hashed = resolve_user(None, Some("abcdef0123456789")).unwrap();
        assert_eq!(hashed.as_str(), "abcdef0123456789");

        assert!(resolve_user(None, None).is_err());
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_signal_type("nutrition").unwrap(), SignalType::Nutrition);
        assert!(parse_signal_type("mood").is_err());
        assert_eq!(
            parse_pregnancy_stage("3rd_trimester").unwrap(),
            PregnancyStage::ThirdTrimester
        );
        assert!(parse_pregnancy_stage("fourth").is_err());
    }

    #[test]
    fn test_build_context_keeps_default_language() {
        let context = build_context(Some(22), None, None, Some("Bahraich".to_string()));
        assert_eq!(context.language, "hi");
        assert_eq!(context.district.as_deref(), Some("Bahraich"));

        let context = build_context(None, None, Some("en".to_string()), None);
        assert_eq!(context.language, "en");
    }

    #[tokio::test]
    async fn test_default_config_wires_in_memory_service() {
        let memory = EmbeddedHealthMemory::from_config(HealthMemoryConfig::default()).unwrap();
        memory.service.initialize().await.unwrap();

        let user = UserId::anonymize("device-1");
        let outcome = memory
            .service
            .record_interaction(&user, "fever", SignalType::Symptom, SignalContext::default())
            .await
            .unwrap();
        assert!((outcome.signal.risk_score.value() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_new_loads_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asha-config.yaml");
        let mut config = HealthMemoryConfig::default();
        config.spec.embedding.dimension = 48;
        config.to_yaml_file(&path).unwrap();

        let memory = EmbeddedHealthMemory::new(Some(path)).unwrap();
        assert_eq!(memory.config.spec.embedding.dimension, 48);

        let missing = EmbeddedHealthMemory::new(Some(dir.path().join("missing.yaml")));
        assert!(missing.is_err());
    }

    #[test]
    fn test_embedder_follows_config() {
        let mut config = HealthMemoryConfig::default();
        config.spec.embedding.dimension = 32;
        assert_eq!(build_embedder(&config).dimension(), 32);

        config.spec.embedding.provider = EmbeddingProviderKind::Ollama;
        assert_eq!(build_embedder(&config).dimension(), 32);
    }
}
