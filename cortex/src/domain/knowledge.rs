// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-only reference data: verified medical guidance and nutrition
//! patterns. Seeded externally, never mutated by the core.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

/// Namespace for deterministic reference ids, so re-seeding the same entry
/// overwrites instead of duplicating.
const REFERENCE_NAMESPACE: Uuid = Uuid::from_u128(0x6a2f_41c3_9b1e_4d7a_8c55_0e3b_7f19_a2d4);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hi: Option<String>,
    pub topic: String,
    pub source: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl KnowledgeEntry {
    pub fn point_id(&self) -> Uuid {
        self.id
            .unwrap_or_else(|| Uuid::new_v5(&REFERENCE_NAMESPACE, self.content.as_bytes()))
    }

    /// Text that gets embedded for retrieval.
    pub fn embedding_text(&self) -> &str {
        &self.content
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.insert("id".to_string(), Value::String(self.point_id().to_string()));
                map
            }
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub food_item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    /// mg of iron per 100 g
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iron_content: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NutritionEntry {
    pub fn point_id(&self) -> Uuid {
        self.id
            .unwrap_or_else(|| Uuid::new_v5(&REFERENCE_NAMESPACE, self.food_item.as_bytes()))
    }

    pub fn embedding_text(&self) -> String {
        let mut text = self.food_item.clone();
        if let Some(ref local) = self.local_name {
            text.push_str(&format!(" ({})", local));
        }
        if let Some(ref notes) = self.notes {
            text.push_str(": ");
            text.push_str(notes);
        }
        text
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.insert("id".to_string(), Value::String(self.point_id().to_string()));
                map
            }
            _ => Map::new(),
        }
    }
}

/// Seed file layout used by `asha seed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSeed {
    #[serde(default)]
    pub knowledge: Vec<KnowledgeEntry>,
    #[serde(default)]
    pub nutrition: Vec<NutritionEntry>,
}

impl ReferenceSeed {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seed = serde_yaml::from_str(&content)?;
        Ok(seed)
    }

    pub fn is_empty(&self) -> bool {
        self.knowledge.is_empty() && self.nutrition.is_empty()
    }
}

fn default_confidence() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_ids_are_deterministic() {
        let entry = KnowledgeEntry {
            id: None,
            content: "Severe bleeding during pregnancy is an emergency.".to_string(),
            content_hi: None,
            topic: "danger_signs".to_string(),
            source: "WHO".to_string(),
            confidence: 1.0,
        };
        assert_eq!(entry.point_id(), entry.clone().point_id());
        assert_eq!(entry.to_payload()["id"], Value::String(entry.point_id().to_string()));
    }

    #[test]
    fn test_seed_from_yaml() {
        let yaml = r#"
knowledge:
  - content: "Take 1 IFA tablet daily from the 4th month of pregnancy."
    topic: anemia
    source: Anemia Mukt Bharat
nutrition:
  - food_item: Spinach
    local_name: Palak
    iron_content: 2.7
"#;
        let seed: ReferenceSeed = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(seed.knowledge.len(), 1);
        assert_eq!(seed.knowledge[0].confidence, 1.0);
        assert_eq!(seed.nutrition[0].embedding_text(), "Spinach (Palak)");
        assert!(!seed.is_empty());
    }
}
