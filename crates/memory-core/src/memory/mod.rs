pub mod base;
pub mod payload;
pub mod relationship;
pub mod types;

pub use base::{BaseMemory, SyncStatus};
pub use payload::{
    lexical_fields, reconstruct_memory, to_graph_properties, to_vector_payload, LexicalFields,
};
pub use relationship::{Relationship, RelationshipType};
pub use types::{
    ComponentContent, DesignContent, FunctionContent, MemoryType, PatternType, Priority,
    RequirementContent, RequirementStatus, CodePatternContent, SessionContent, TestHistoryContent,
    TestStatus, TypedContent, UserPreferenceContent,
};
