//! Profile facts collected during onboarding.

use serde::{Deserialize, Serialize};

/// The fixed set of fact keys a script step may save into.
///
/// `as_str` is the placeholder name used in prompt templates (`{focusArea}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactKey {
    Name,
    FocusArea,
    Obstacles,
    KnowledgePath,
}

impl FactKey {
    pub const ALL: [FactKey; 4] = [
        FactKey::Name,
        FactKey::FocusArea,
        FactKey::Obstacles,
        FactKey::KnowledgePath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::FocusArea => "focusArea",
            Self::Obstacles => "obstacles",
            Self::KnowledgePath => "knowledgePath",
        }
    }

    /// Look up a key by its placeholder name.
    pub fn from_placeholder(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for FactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value produced by a script step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactValue {
    Text(String),
    List(Vec<String>),
}

impl FactValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::List(items) => items.join(", "),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text],
            Self::List(items) => items,
        }
    }
}

/// Facts about the user, injected into later prompts.
///
/// Persisted as JSON under the `user-data` session key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_path: Option<String>,
}

impl ProfileFacts {
    pub fn is_set(&self, key: FactKey) -> bool {
        match key {
            FactKey::Name => self.name.is_some(),
            FactKey::FocusArea => self.focus_area.is_some(),
            FactKey::Obstacles => !self.obstacles.is_empty(),
            FactKey::KnowledgePath => self.knowledge_path.is_some(),
        }
    }

    /// The value of a fact as template text. Lists render comma-separated.
    pub fn value(&self, key: FactKey) -> Option<String> {
        match key {
            FactKey::Name => self.name.clone(),
            FactKey::FocusArea => self.focus_area.clone(),
            FactKey::Obstacles if self.obstacles.is_empty() => None,
            FactKey::Obstacles => Some(self.obstacles.join(", ")),
            FactKey::KnowledgePath => self.knowledge_path.clone(),
        }
    }

    /// Write a fact once. Returns `false` (and keeps the old value) if the
    /// key already holds a value.
    pub fn record(&mut self, key: FactKey, value: FactValue) -> bool {
        if self.is_set(key) {
            return false;
        }
        match key {
            FactKey::Name => self.name = Some(value.into_text()),
            FactKey::FocusArea => self.focus_area = Some(value.into_text()),
            FactKey::Obstacles => self.obstacles = value.into_list(),
            FactKey::KnowledgePath => self.knowledge_path = Some(value.into_text()),
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        !FactKey::ALL.iter().any(|k| self.is_set(*k))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
