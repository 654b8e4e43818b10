//! Structural records produced by a language extractor: the parser
//! orchestrator is pure with respect to the stores — it yields these
//! records and nothing else; the (out-of-scope) indexer collaborator turns
//! them into memories and relationships via `memory-manager`.

use std::fmt;

/// Language dispatched on by file extension. Only the languages this crate
/// ships an extractor for are listed here — the orchestrator's dispatch
/// table (`extractor::for_extension`) is the single source of truth for
/// which extensions map to which variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Rust,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 1-indexed line range, matching the function variant's `line range`
/// fields and tree-sitter's node ranges (rebased from 0-indexed rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

/// A function or method extracted from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRecord {
    pub name: String,
    pub signature: String,
    pub range: LineRange,
    pub docstring: Option<String>,
    pub containing_class: Option<String>,
    pub is_async: bool,
}

/// A class/struct/trait extracted from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub name: String,
    pub range: LineRange,
    pub extends: Option<String>,
    pub implements: Vec<String>,
}

/// An import/use statement, source module plus any named bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub module: String,
    pub names: Vec<String>,
    pub range: LineRange,
}

/// A call site: `receiver.callee(...)` or a bare `callee(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub callee: String,
    pub receiver: Option<String>,
    pub range: LineRange,
}

/// One file's worth of extracted structure, plus any error the extractor
/// hit partway through. Parse errors are captured per file and surface in
/// the parse result rather than aborting the batch.
#[derive(Debug, Clone, Default)]
pub struct FileParseResult {
    pub file_path: String,
    pub language: Option<Language>,
    pub functions: Vec<FunctionRecord>,
    pub classes: Vec<ClassRecord>,
    pub imports: Vec<ImportRecord>,
    pub calls: Vec<CallRecord>,
    pub error: Option<String>,
}

impl FileParseResult {
    pub fn empty_for(file_path: impl Into<String>, language: Option<Language>) -> Self {
        Self { file_path: file_path.into(), language, ..Default::default() }
    }

    pub fn with_error(file_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self { file_path: file_path.into(), error: Some(error.into()), ..Default::default() }
    }
}

/// Aggregate result of parsing a whole directory tree: one `FileParseResult`
/// per file visited, plus counts of files skipped by the directory walk
/// (unsupported extension, ignored path).
#[derive(Debug, Clone, Default)]
pub struct DirectoryParseResult {
    pub files: Vec<FileParseResult>,
    pub skipped: usize,
}

impl DirectoryParseResult {
    pub fn function_count(&self) -> usize {
        self.files.iter().map(|f| f.functions.len()).sum()
    }

    pub fn class_count(&self) -> usize {
        self.files.iter().map(|f| f.classes.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }
}
