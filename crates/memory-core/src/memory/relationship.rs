//! Graph edges between memories. Grounded on
//! `cortex-core::memory::relationships`, with a closed `RelationshipType`
//! vocabulary rather than an open string label.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Closed vocabulary of edge types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    // Code
    Calls,
    Imports,
    Extends,
    Implements,
    DependsOn,
    Contains,
    Uses,
    // Requirements
    DerivedFrom,
    SatisfiedBy,
    TestedBy,
    // Design
    Addresses,
    Affects,
    Supersedes,
    // Patterns
    FollowsPattern,
    DeviatesFrom,
    // Sessions
    CreatedIn,
    ModifiedIn,
    // General
    RelatedTo,
    SimilarTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Calls => "CALLS",
            RelationshipType::Imports => "IMPORTS",
            RelationshipType::Extends => "EXTENDS",
            RelationshipType::Implements => "IMPLEMENTS",
            RelationshipType::DependsOn => "DEPENDS_ON",
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::Uses => "USES",
            RelationshipType::DerivedFrom => "DERIVED_FROM",
            RelationshipType::SatisfiedBy => "SATISFIED_BY",
            RelationshipType::TestedBy => "TESTED_BY",
            RelationshipType::Addresses => "ADDRESSES",
            RelationshipType::Affects => "AFFECTS",
            RelationshipType::Supersedes => "SUPERSEDES",
            RelationshipType::FollowsPattern => "FOLLOWS_PATTERN",
            RelationshipType::DeviatesFrom => "DEVIATES_FROM",
            RelationshipType::CreatedIn => "CREATED_IN",
            RelationshipType::ModifiedIn => "MODIFIED_IN",
            RelationshipType::RelatedTo => "RELATED_TO",
            RelationshipType::SimilarTo => "SIMILAR_TO",
        }
    }
}

/// A directed, typed edge between two memory ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub relationship_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
    /// Relationship strength/confidence in [0, 1].
    pub weight: f64,
    pub properties: HashMap<String, Value>,
}

impl Relationship {
    pub fn new(
        relationship_type: RelationshipType,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            relationship_type,
            source_id: source_id.into(),
            target_id: target_id.into(),
            created_at: Utc::now(),
            weight: 1.0,
            properties: HashMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// The `(source, target, type)` triple whose uniqueness is enforced on
    /// write via idempotent upsert.
    pub fn upsert_key(&self) -> (String, String, &'static str) {
        (
            self.source_id.clone(),
            self.target_id.clone(),
            self.relationship_type.as_str(),
        )
    }

    pub fn similarity(source_id: impl Into<String>, target_id: impl Into<String>, score: f64) -> Self {
        Self::new(RelationshipType::SimilarTo, source_id, target_id)
            .with_weight(score)
            .with_property("similarity_score", Value::from(score))
    }
}
