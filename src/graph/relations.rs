//! Typed, directed relations between entities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    BelongsTo,
    Calls,
    Exposes,
    Owns,
    Documents,
    References,
    DependsOn,
    Contains,
    Implements,
    Uses,
}

impl RelationType {
    pub const ALL: &'static [RelationType] = &[
        RelationType::BelongsTo,
        RelationType::Calls,
        RelationType::Exposes,
        RelationType::Owns,
        RelationType::Documents,
        RelationType::References,
        RelationType::DependsOn,
        RelationType::Contains,
        RelationType::Implements,
        RelationType::Uses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::BelongsTo => "belongs_to",
            RelationType::Calls => "calls",
            RelationType::Exposes => "exposes",
            RelationType::Owns => "owns",
            RelationType::Documents => "documents",
            RelationType::References => "references",
            RelationType::DependsOn => "depends_on",
            RelationType::Contains => "contains",
            RelationType::Implements => "implements",
            RelationType::Uses => "uses",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| anyhow::anyhow!("unknown relation type: {}", s))
    }
}

/// A relation as exchanged with callers and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: RelationType,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Relation {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, relation_type: RelationType) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Edge weight stored in the graph; endpoints live in the graph structure.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationEdge {
    pub relation_type: RelationType,
    pub metadata: BTreeMap<String, Value>,
}

impl From<&Relation> for RelationEdge {
    fn from(relation: &Relation) -> Self {
        Self {
            relation_type: relation.relation_type,
            metadata: relation.metadata.clone(),
        }
    }
}
