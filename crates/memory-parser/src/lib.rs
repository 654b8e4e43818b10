//! # memory-parser
//!
//! C9: the parser orchestrator. Dispatches by file extension to a
//! language-specific extractor and yields structural records — functions,
//! classes, imports, calls — with precise line ranges. Pure with respect
//! to the vector/graph stores: turning these records into memories and
//! relationships is the (out-of-scope) indexer collaborator's job, driven
//! through `memory-manager`.

pub mod extractor;
pub mod orchestrator;
pub mod python;
pub mod rust_lang;
pub mod types;
pub mod walk;

pub use extractor::{language_for_extension, LanguageExtractor};
pub use orchestrator::ParserOrchestrator;
pub use python::PythonExtractor;
pub use rust_lang::RustExtractor;
pub use types::{
    CallRecord, ClassRecord, DirectoryParseResult, FileParseResult, FunctionRecord, ImportRecord,
    Language, LineRange,
};
