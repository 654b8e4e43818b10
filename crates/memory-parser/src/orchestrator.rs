//! The parser orchestrator (C9): dispatch by file extension to a language
//! extractor, yielding structural records. Pure with respect to the
//! stores — callers (the indexer collaborator, out of scope here) turn
//! the records into memories and relationships via `memory-manager`.
//! Grounded on `drift-core::scanner::walker::Scanner`'s
//! collect-then-process shape, narrowed to a sequential walk (no `rayon`
//! fan-out: a single project's source tree is not large enough to need it,
//! and the orchestrator's only real cost is tree-sitter parsing per file).

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::extractor::{language_for_extension, LanguageExtractor};
use crate::python::PythonExtractor;
use crate::rust_lang::RustExtractor;
use crate::types::{DirectoryParseResult, FileParseResult, Language};
use crate::walk::walk_source_files;

/// Holds one extractor per supported language and dispatches by extension.
pub struct ParserOrchestrator {
    python: PythonExtractor,
    rust: RustExtractor,
    extra_ignores: Vec<String>,
    allowed_extensions: Vec<String>,
}

impl ParserOrchestrator {
    pub fn new(extra_ignores: Vec<String>, allowed_extensions: Vec<String>) -> Result<Self, String> {
        Ok(Self {
            python: PythonExtractor::new()?,
            rust: RustExtractor::new()?,
            extra_ignores,
            allowed_extensions,
        })
    }

    fn extractor_for(&self, language: Language) -> &dyn LanguageExtractor {
        match language {
            Language::Python => &self.python,
            Language::Rust => &self.rust,
        }
    }

    fn extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.is_empty() || self.allowed_extensions.iter().any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Parse a single file's contents directly (no filesystem read) —
    /// useful for callers that already have the source in hand.
    pub fn parse_source(&self, file_path: &str, source: &str) -> FileParseResult {
        let extension = Path::new(file_path).extension().and_then(|e| e.to_str()).unwrap_or("");
        match language_for_extension(extension) {
            Some(language) => self.extractor_for(language).extract(file_path, source),
            None => FileParseResult::with_error(file_path, format!("unsupported file extension: {extension}")),
        }
    }

    /// Read and parse a single file from disk. A read failure or an
    /// unsupported extension is captured in the returned result's `error`
    /// field rather than propagated.
    pub fn parse_file(&self, path: &Path) -> FileParseResult {
        let file_path = path.to_string_lossy().to_string();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let Some(language) = language_for_extension(extension) else {
            return FileParseResult::with_error(&file_path, format!("unsupported file extension: {extension}"));
        };

        match fs::read_to_string(path) {
            Ok(source) => self.extractor_for(language).extract(&file_path, &source),
            Err(e) => FileParseResult::with_error(&file_path, format!("failed to read file: {e}")),
        }
    }

    /// Walk `root` (gitignore-aware) and parse every file whose extension
    /// has a registered extractor. A single file's parse error never
    /// aborts the rest of the batch.
    pub fn parse_directory(&self, root: &Path) -> DirectoryParseResult {
        let mut result = DirectoryParseResult::default();

        for path in walk_source_files(root, &self.extra_ignores) {
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.extension_allowed(extension) || language_for_extension(extension).is_none() {
                result.skipped += 1;
                continue;
            }

            let file_result = self.parse_file(&path);
            if let Some(error) = &file_result.error {
                warn!(file = %path.display(), error, "parse error, continuing batch");
            } else {
                debug!(file = %path.display(), functions = file_result.functions.len(), "parsed file");
            }
            result.files.push(file_result);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn orchestrator() -> ParserOrchestrator {
        ParserOrchestrator::new(Vec::new(), Vec::new()).unwrap()
    }

    #[test]
    fn parse_source_dispatches_by_extension() {
        let orch = orchestrator();
        let result = orch.parse_source("util.py", "def f(): pass\n");
        assert_eq!(result.language, Some(Language::Python));
        assert_eq!(result.functions.len(), 1);
    }

    #[test]
    fn parse_source_unsupported_extension_captures_error() {
        let orch = orchestrator();
        let result = orch.parse_source("notes.txt", "hello");
        assert!(result.error.is_some());
    }

    #[test]
    fn parse_file_reports_read_failure_without_aborting() {
        let orch = orchestrator();
        let result = orch.parse_file(Path::new("/nonexistent/path/does_not_exist.py"));
        assert!(result.error.is_some());
    }

    #[test]
    fn parse_directory_aggregates_across_files_and_skips_unsupported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def a(): pass\n").unwrap();
        fs::write(dir.path().join("b.rs"), "fn b() {}\n").unwrap();
        fs::write(dir.path().join("notes.md"), "# hi").unwrap();

        let orch = orchestrator();
        let result = orch.parse_directory(dir.path());
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.function_count(), 2);
    }

    #[test]
    fn parse_directory_one_bad_file_does_not_abort_batch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.py"), "def good(): pass\n").unwrap();
        fs::write(dir.path().join("bad.py"), "def bad(:::\n").unwrap();

        let orch = orchestrator();
        let result = orch.parse_directory(dir.path());
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.error_count(), 1);
        assert!(result.function_count() >= 1);
    }
}
