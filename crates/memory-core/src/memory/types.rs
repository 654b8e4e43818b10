//! The eight memory variants and their variant-specific attribute bags.
//! Modeled as a closed tagged enum (`TypedContent`) rather than a dynamic
//! string-tagged dict, grounded on `cortex-core::memory::base::TypedContent`.

use serde::{Deserialize, Serialize};

use crate::errors::{CortexError, CortexResult};

/// Memory type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Requirements,
    Design,
    CodePattern,
    Component,
    Function,
    TestHistory,
    Session,
    UserPreference,
}

impl MemoryType {
    /// All variants, used by components that fan out per-variant (storage
    /// collection creation, normaliser passes).
    pub const ALL: [MemoryType; 8] = [
        MemoryType::Requirements,
        MemoryType::Design,
        MemoryType::CodePattern,
        MemoryType::Component,
        MemoryType::Function,
        MemoryType::TestHistory,
        MemoryType::Session,
        MemoryType::UserPreference,
    ];

    /// Stable string used for collection/label names and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Requirements => "requirements",
            MemoryType::Design => "design",
            MemoryType::CodePattern => "code_pattern",
            MemoryType::Component => "component",
            MemoryType::Function => "function",
            MemoryType::TestHistory => "test_history",
            MemoryType::Session => "session",
            MemoryType::UserPreference => "user_preference",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    Draft,
    Approved,
    Implemented,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequirementContent {
    pub requirement_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: RequirementStatus,
    pub source_document: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignStatus {
    Proposed,
    Accepted,
    Superseded,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignContent {
    pub design_type: String,
    pub title: String,
    pub decision: String,
    pub rationale: String,
    pub status: DesignStatus,
    pub related_requirement_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Structural,
    Behavioral,
    Creational,
    Idiom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodePatternContent {
    pub name: String,
    pub pattern_type: PatternType,
    pub language: String,
    pub code_template: String,
    pub usage_context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentContent {
    pub component_id: String,
    pub component_type: String,
    pub name: String,
    pub file_path: String,
    pub public_interface: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionContent {
    pub name: String,
    pub signature: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub docstring: Option<String>,
    pub containing_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestHistoryContent {
    pub test_id: String,
    pub test_name: String,
    pub file_path: String,
    pub executed_at: chrono::DateTime<chrono::Utc>,
    pub status: TestStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionContent {
    pub session_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub summary: String,
    pub key_decisions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreferenceContent {
    pub category: String,
    pub key: String,
    pub value: String,
    pub scope: String,
}

/// Variant-specific content, serialized as a tagged enum so the variant is
/// preserved across JSON and the vector-store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "variant", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum TypedContent {
    Requirements(RequirementContent),
    Design(DesignContent),
    CodePattern(CodePatternContent),
    Component(ComponentContent),
    Function(FunctionContent),
    TestHistory(TestHistoryContent),
    Session(SessionContent),
    UserPreference(UserPreferenceContent),
}

impl TypedContent {
    /// First required field found empty, if any. Used both by the write
    /// path (reject before embedding) and the normaliser's validation
    /// pass (flag already-persisted records for repair).
    pub fn first_empty_required_field(&self) -> Option<&'static str> {
        match self {
            TypedContent::Requirements(r) => {
                if r.requirement_id.is_empty() {
                    Some("requirement_id")
                } else if r.title.is_empty() {
                    Some("title")
                } else {
                    None
                }
            }
            TypedContent::Design(d) => {
                if d.title.is_empty() {
                    Some("title")
                } else if d.decision.is_empty() {
                    Some("decision")
                } else {
                    None
                }
            }
            TypedContent::CodePattern(p) => {
                if p.name.is_empty() {
                    Some("name")
                } else {
                    None
                }
            }
            TypedContent::Component(c) => {
                if c.name.is_empty() {
                    Some("name")
                } else if c.file_path.is_empty() {
                    Some("file_path")
                } else {
                    None
                }
            }
            TypedContent::Function(f) => {
                if f.name.is_empty() {
                    Some("name")
                } else if f.file_path.is_empty() {
                    Some("file_path")
                } else {
                    None
                }
            }
            TypedContent::TestHistory(t) => {
                if t.test_id.is_empty() {
                    Some("test_id")
                } else {
                    None
                }
            }
            TypedContent::Session(s) => {
                if s.session_id.is_empty() {
                    Some("session_id")
                } else {
                    None
                }
            }
            TypedContent::UserPreference(u) => {
                if u.key.is_empty() {
                    Some("key")
                } else {
                    None
                }
            }
        }
    }

    /// Reject variant-specific required fields that are empty, e.g. an
    /// empty `Requirements.title`.
    pub fn validate_required_fields(&self) -> CortexResult<()> {
        if let Some(field) = self.first_empty_required_field() {
            return Err(CortexError::Validation { message: format!("{field} required") });
        }
        Ok(())
    }

    pub fn memory_type(&self) -> MemoryType {
        match self {
            TypedContent::Requirements(_) => MemoryType::Requirements,
            TypedContent::Design(_) => MemoryType::Design,
            TypedContent::CodePattern(_) => MemoryType::CodePattern,
            TypedContent::Component(_) => MemoryType::Component,
            TypedContent::Function(_) => MemoryType::Function,
            TypedContent::TestHistory(_) => MemoryType::TestHistory,
            TypedContent::Session(_) => MemoryType::Session,
            TypedContent::UserPreference(_) => MemoryType::UserPreference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_variants_present() {
        assert_eq!(MemoryType::ALL.len(), 8);
    }

    #[test]
    fn typed_content_reports_matching_memory_type() {
        let content = TypedContent::Function(FunctionContent {
            name: "format_string".into(),
            signature: "format_string(text: str) -> str".into(),
            file_path: "util.py".into(),
            start_line: 1,
            end_line: 2,
            language: "python".into(),
            docstring: None,
            containing_class: None,
        });
        assert_eq!(content.memory_type(), MemoryType::Function);
    }

    #[test]
    fn validate_required_fields_rejects_empty_title() {
        let content = TypedContent::Requirements(RequirementContent {
            requirement_id: "REQ-1".into(),
            title: String::new(),
            description: "desc".into(),
            priority: Priority::Low,
            status: RequirementStatus::Draft,
            source_document: None,
        });
        let err = content.validate_required_fields().unwrap_err();
        assert!(err.to_string().contains("title required"));
    }

    #[test]
    fn validate_required_fields_passes_when_all_present() {
        let content = TypedContent::Requirements(RequirementContent {
            requirement_id: "REQ-1".into(),
            title: "title".into(),
            description: "desc".into(),
            priority: Priority::Low,
            status: RequirementStatus::Draft,
            source_document: None,
        });
        assert!(content.validate_required_fields().is_ok());
    }
}
