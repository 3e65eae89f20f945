//! # Personality Matrix - The Trait Space Being Sampled
//!
//! A personality has three axes, each of which becomes one chromosome
//! in a [`PersonalityGenome`](crate::genome::PersonalityGenome):
//!
//! ```text
//! identity   goals, methods, self-image, world-view, thoughts
//! memory     short-term, long-term, archival segments
//! structure  input format, tools, output format
//! ```
//!
//! The matrix is a plain value type: cloning it never aliases the goal
//! list. Conversions to loosely-typed trait maps only happen at the
//! generator boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who the model thinks it is
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub goals: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    pub self_image: String,
    pub world_view: String,
    #[serde(default)]
    pub thoughts: Vec<String>,
}

/// Context the model carries between turns
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySegments {
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
    pub archival: Vec<String>,
}

/// How input and output are shaped
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub input_format: String,
    pub tools: Vec<String>,
    pub output_format: String,
}

/// A complete personality
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityMatrix {
    pub identity: Identity,
    #[serde(default)]
    pub memory: MemorySegments,
    #[serde(default)]
    pub structure: Structure,
}

/// The persisted subset of a personality
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityRecord {
    pub goals: Vec<String>,
    pub self_image: String,
    pub world_view: String,
}

/// Trait-map keys used by generator adapters
pub const KEY_GOALS: &str = "I_G";
pub const KEY_SELF_IMAGE: &str = "I_S";
pub const KEY_WORLD_VIEW: &str = "I_W";

impl PersonalityMatrix {
    /// Personality with only the identity core filled in
    pub fn new(goals: Vec<String>, self_image: impl Into<String>, world_view: impl Into<String>) -> Self {
        Self {
            identity: Identity {
                goals,
                self_image: self_image.into(),
                world_view: world_view.into(),
                ..Identity::default()
            },
            ..Self::default()
        }
    }

    pub fn goals(&self) -> &[String] {
        &self.identity.goals
    }

    pub fn self_image(&self) -> &str {
        &self.identity.self_image
    }

    pub fn world_view(&self) -> &str {
        &self.identity.world_view
    }

    pub fn to_record(&self) -> PersonalityRecord {
        PersonalityRecord {
            goals: self.identity.goals.clone(),
            self_image: self.identity.self_image.clone(),
            world_view: self.identity.world_view.clone(),
        }
    }

    pub fn from_record(record: &PersonalityRecord) -> Self {
        Self::new(record.goals.clone(), record.self_image.clone(), record.world_view.clone())
    }

    /// Flatten into the `I_G / I_S / I_W` map generator prompts use
    pub fn to_trait_map(&self) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert(KEY_GOALS.to_string(), serde_json::json!(self.identity.goals));
        map.insert(KEY_SELF_IMAGE.to_string(), serde_json::json!(self.identity.self_image));
        map.insert(KEY_WORLD_VIEW.to_string(), serde_json::json!(self.identity.world_view));
        map
    }

    /// Rebuild from a trait map; a bare string goal becomes a one-item list
    pub fn from_trait_map(map: &BTreeMap<String, serde_json::Value>) -> Self {
        let goals = match map.get(KEY_GOALS) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(goal)) => vec![goal.clone()],
            _ => Vec::new(),
        };
        let text = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self::new(goals, text(KEY_SELF_IMAGE), text(KEY_WORLD_VIEW))
    }

    /// Render as system context for a generation request
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from("Please respond with the following personality traits in mind:\n");
        for (key, value) in self.to_trait_map() {
            let rendered = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            prompt.push_str(&format!("- {}: {}\n", key, rendered));
        }
        prompt
    }
}
