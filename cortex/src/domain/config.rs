// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Health Memory Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) holding every
// tunable of the memory subsystem:
// - Vector store and embedding provider endpoints
// - Risk scoring defaults and category thresholds
// - Reinforcement and decay factors
// - Deterioration windows and trigger threshold
// - Retrieval ranking weights and limits

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "asha.health/v1";
pub const KIND: &str = "HealthMemoryConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMemoryConfig {
    /// API version (must be "asha.health/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "HealthMemoryConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: HealthMemorySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Deployment name (e.g. district or pilot site)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthMemorySpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub collections: CollectionNames,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub evolution: EvolutionConfig,

    #[serde(default)]
    pub deterioration: DeteriorationConfig,

    #[serde(default)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    InMemory,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// Qdrant gRPC endpoint
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Points fetched per scroll request; scans page until exhausted
    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Deterministic offline feature hashing
    Hash,
    /// Ollama `/api/embeddings`
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionNames {
    #[serde(default = "default_user_memory_collection")]
    pub user_memory: String,

    #[serde(default = "default_knowledge_collection")]
    pub knowledge: String,

    #[serde(default = "default_nutrition_collection")]
    pub nutrition: String,

    #[serde(default = "default_insights_collection")]
    pub population_insights: String,
}

impl CollectionNames {
    pub fn all(&self) -> [&str; 4] {
        [
            self.user_memory.as_str(),
            self.knowledge.as_str(),
            self.nutrition.as_str(),
            self.population_insights.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Score for empty or unrecognized statements
    #[serde(default = "default_risk")]
    pub default_risk: f64,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,

    /// Multiplier for mothers younger than `young_age` or older than `old_age`
    #[serde(default = "default_age_multiplier")]
    pub age_multiplier: f64,

    #[serde(default = "default_young_age")]
    pub young_age: u32,

    #[serde(default = "default_old_age")]
    pub old_age: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "default_reinforcement_factor")]
    pub reinforcement_factor: f64,

    /// Reinforce only when the similar count is strictly greater than this
    #[serde(default = "default_reinforcement_min_similar")]
    pub reinforcement_min_similar: usize,

    #[serde(default = "default_reinforcement_window_days")]
    pub reinforcement_window_days: i64,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,

    #[serde(default = "default_decay_min_age_days")]
    pub decay_min_age_days: i64,

    /// Only signals with risk strictly below this decay
    #[serde(default = "default_decay_risk_ceiling")]
    pub decay_risk_ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeteriorationConfig {
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,

    #[serde(default = "default_baseline_days")]
    pub baseline_days: i64,

    #[serde(default = "default_trigger_delta")]
    pub trigger_delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub recency: f64,
    pub risk: f64,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub weights: RankingWeights,

    #[serde(default = "default_per_collection_limit")]
    pub per_collection_limit: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_recency_horizon_days")]
    pub recency_horizon_days: f64,
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::InMemory
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_embedding_provider() -> EmbeddingProviderKind {
    EmbeddingProviderKind::Hash
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimension() -> usize {
    768
}

fn default_user_memory_collection() -> String {
    "user_health_memory".to_string()
}

fn default_knowledge_collection() -> String {
    "verified_medical_knowledge".to_string()
}

fn default_nutrition_collection() -> String {
    "nutrition_patterns".to_string()
}

fn default_insights_collection() -> String {
    "asha_population_insights".to_string()
}

fn default_risk() -> f64 {
    0.5
}

fn default_high_threshold() -> f64 {
    0.7
}

fn default_medium_threshold() -> f64 {
    0.4
}

fn default_age_multiplier() -> f64 {
    1.15
}

fn default_young_age() -> u32 {
    18
}

fn default_old_age() -> u32 {
    35
}

fn default_reinforcement_factor() -> f64 {
    1.5
}

fn default_reinforcement_min_similar() -> usize {
    2
}

fn default_reinforcement_window_days() -> i64 {
    90
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_decay_factor() -> f64 {
    0.95
}

fn default_decay_min_age_days() -> i64 {
    30
}

fn default_decay_risk_ceiling() -> f64 {
    0.3
}

fn default_scroll_page_size() -> usize {
    256
}

fn default_recent_days() -> i64 {
    7
}

fn default_baseline_days() -> i64 {
    30
}

fn default_trigger_delta() -> f64 {
    0.2
}

fn default_per_collection_limit() -> usize {
    10
}

fn default_max_results() -> usize {
    5
}

fn default_recency_horizon_days() -> f64 {
    365.0
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            url: default_qdrant_url(),
            api_key: None,
            scroll_page_size: default_scroll_page_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            user_memory: default_user_memory_collection(),
            knowledge: default_knowledge_collection(),
            nutrition: default_nutrition_collection(),
            population_insights: default_insights_collection(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_risk: default_risk(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            age_multiplier: default_age_multiplier(),
            young_age: default_young_age(),
            old_age: default_old_age(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            reinforcement_factor: default_reinforcement_factor(),
            reinforcement_min_similar: default_reinforcement_min_similar(),
            reinforcement_window_days: default_reinforcement_window_days(),
            similarity_threshold: default_similarity_threshold(),
            decay_factor: default_decay_factor(),
            decay_min_age_days: default_decay_min_age_days(),
            decay_risk_ceiling: default_decay_risk_ceiling(),
        }
    }
}

impl Default for DeteriorationConfig {
    fn default() -> Self {
        Self {
            recent_days: default_recent_days(),
            baseline_days: default_baseline_days(),
            trigger_delta: default_trigger_delta(),
        }
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            recency: 0.3,
            risk: 0.4,
            similarity: 0.3,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            per_collection_limit: default_per_collection_limit(),
            max_results: default_max_results(),
            recency_horizon_days: default_recency_horizon_days(),
        }
    }
}

impl Default for HealthMemoryConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "asha-local".to_string(),
                labels: None,
            },
            spec: HealthMemorySpec::default(),
        }
    }
}

impl HealthMemoryConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Standard locations, in precedence order, after `ASHA_CONFIG_PATH`
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./asha-config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".asha").join("config.yaml"));
        }
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/asha/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\Asha\\config.yaml"));
        paths
    }

    /// Discover configuration file using precedence order
    /// 1. ASHA_CONFIG_PATH environment variable
    /// 2. ./asha-config.yaml
    /// 3. ~/.asha/config.yaml
    /// 4. /etc/asha/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ASHA_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        Self::search_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ASHA_QDRANT_URL") {
            tracing::info!("Environment override: ASHA_QDRANT_URL={}", val);
            self.spec.storage.url = val;
            self.spec.storage.backend = StorageBackend::Qdrant;
        }

        if let Ok(val) = std::env::var("ASHA_QDRANT_API_KEY") {
            tracing::info!("Environment override: ASHA_QDRANT_API_KEY=<redacted>");
            self.spec.storage.api_key = Some(val);
        }

        if let Ok(val) = std::env::var("ASHA_EMBEDDING_ENDPOINT") {
            tracing::info!("Environment override: ASHA_EMBEDDING_ENDPOINT={}", val);
            self.spec.embedding.endpoint = val;
            self.spec.embedding.provider = EmbeddingProviderKind::Ollama;
        }
    }

    /// Resolve the storage API key, following an "env:VAR_NAME" indirection
    pub fn resolved_api_key(&self) -> Option<String> {
        let key = self.spec.storage.api_key.as_ref()?;
        match key.strip_prefix("env:") {
            Some(var) => std::env::var(var).ok(),
            None => Some(key.clone()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.storage.scroll_page_size == 0 {
            anyhow::bail!("spec.storage.scroll_page_size must be greater than zero");
        }

        if self.spec.embedding.dimension == 0 {
            anyhow::bail!("spec.embedding.dimension must be greater than zero");
        }

        for name in self.spec.collections.all() {
            if name.is_empty() {
                anyhow::bail!("Collection names cannot be empty");
            }
        }

        let risk = &self.spec.risk;
        for (field, value) in [
            ("risk.default_risk", risk.default_risk),
            ("risk.high_threshold", risk.high_threshold),
            ("risk.medium_threshold", risk.medium_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("spec.{} must be within [0, 1], got {}", field, value);
            }
        }
        if risk.medium_threshold > risk.high_threshold {
            anyhow::bail!("spec.risk.medium_threshold cannot exceed spec.risk.high_threshold");
        }

        let evolution = &self.spec.evolution;
        if evolution.reinforcement_factor < 1.0 {
            anyhow::bail!(
                "spec.evolution.reinforcement_factor must be >= 1.0, got {}",
                evolution.reinforcement_factor
            );
        }
        if !(evolution.decay_factor > 0.0 && evolution.decay_factor <= 1.0) {
            anyhow::bail!(
                "spec.evolution.decay_factor must be within (0, 1], got {}",
                evolution.decay_factor
            );
        }
        if !(0.0..=1.0).contains(&evolution.similarity_threshold) {
            anyhow::bail!("spec.evolution.similarity_threshold must be within [0, 1]");
        }

        let deterioration = &self.spec.deterioration;
        if deterioration.recent_days <= 0 || deterioration.baseline_days <= deterioration.recent_days
        {
            anyhow::bail!(
                "spec.deterioration windows invalid: recent_days={} baseline_days={}",
                deterioration.recent_days,
                deterioration.baseline_days
            );
        }

        let weights = &self.spec.ranking.weights;
        if weights.recency < 0.0 || weights.risk < 0.0 || weights.similarity < 0.0 {
            anyhow::bail!("spec.ranking.weights cannot be negative");
        }
        let sum = weights.recency + weights.risk + weights.similarity;
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("spec.ranking.weights must sum to 1.0, got {}", sum);
        }
        if self.spec.ranking.max_results == 0 {
            anyhow::bail!("spec.ranking.max_results must be greater than zero");
        }
        if self.spec.ranking.recency_horizon_days <= 0.0 {
            anyhow::bail!("spec.ranking.recency_horizon_days must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let config = HealthMemoryConfig::default();
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.spec.evolution.reinforcement_factor, 1.5);
        assert_eq!(config.spec.evolution.decay_factor, 0.95);
        assert_eq!(config.spec.deterioration.trigger_delta, 0.2);
        assert_eq!(config.spec.ranking.weights, RankingWeights { recency: 0.3, risk: 0.4, similarity: 0.3 });
        assert_eq!(config.spec.ranking.max_results, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
apiVersion: asha.health/v1
kind: HealthMemoryConfig
metadata:
  name: sitapur-pilot
spec:
  storage:
    backend: qdrant
    url: http://qdrant:6334
    api_key: env:QDRANT_KEY
  evolution:
    similarity_threshold: 0.9
"#;
        let config = HealthMemoryConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "sitapur-pilot");
        assert_eq!(config.spec.storage.backend, StorageBackend::Qdrant);
        assert_eq!(config.spec.evolution.similarity_threshold, 0.9);
        assert_eq!(config.spec.evolution.reinforcement_factor, 1.5);
        assert_eq!(config.spec.collections.user_memory, "user_health_memory");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asha-config.yaml");

        let mut config = HealthMemoryConfig::default();
        config.spec.ranking.max_results = 3;
        config.to_yaml_file(&path).unwrap();

        let loaded = HealthMemoryConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.ranking.max_results, 3);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = HealthMemoryConfig::load_or_default(Some(dir.path().join("missing.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = HealthMemoryConfig::default();
        config.spec.ranking.weights.risk = 0.5;
        assert!(config.validate().is_err());

        let mut config = HealthMemoryConfig::default();
        config.spec.evolution.decay_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = HealthMemoryConfig::default();
        config.kind = "NodeConfig".to_string();
        assert!(config.validate().is_err());

        let mut config = HealthMemoryConfig::default();
        config.spec.deterioration.baseline_days = 5;
        assert!(config.validate().is_err());

        let mut config = HealthMemoryConfig::default();
        config.spec.storage.scroll_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_literal() {
        let mut config = HealthMemoryConfig::default();
        assert_eq!(config.resolved_api_key(), None);
        config.spec.storage.api_key = Some("secret".to_string());
        assert_eq!(config.resolved_api_key().as_deref(), Some("secret"));
    }
}
