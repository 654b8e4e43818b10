//! The language-extractor interface. Concrete language-specific parsers
//! are out of scope as external collaborators — this module states only
//! the interface the orchestrator consumes (`LanguageExtractor`) plus the
//! extension-to-language dispatch table. `python.rs`/`rust_lang.rs` are
//! reference implementations satisfying that interface, grounded on
//! `drift-core::parsers::*`.

use crate::types::{FileParseResult, Language};

/// Satisfied by every concrete language extractor. `extract` never panics
/// on malformed input — a tree-sitter parse failure is reported through
/// `FileParseResult::error`, not propagated as a `Result::Err`.
pub trait LanguageExtractor: Send + Sync {
    fn language(&self) -> Language;

    /// Parse `source` (the file's full text) and extract its structure.
    /// `file_path` is carried through for record provenance only — the
    /// extractor does not read the filesystem itself.
    fn extract(&self, file_path: &str, source: &str) -> FileParseResult;
}

/// Map a file extension (without the leading dot, case-insensitive) to the
/// language this crate ships an extractor for, or `None` if unsupported.
pub fn language_for_extension(extension: &str) -> Option<Language> {
    match extension.to_ascii_lowercase().as_str() {
        "py" | "pyi" | "pyw" => Some(Language::Python),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_python_extensions() {
        assert_eq!(language_for_extension("py"), Some(Language::Python));
        assert_eq!(language_for_extension("PY"), Some(Language::Python));
    }

    #[test]
    fn recognises_rust_extension() {
        assert_eq!(language_for_extension("rs"), Some(Language::Rust));
    }

    #[test]
    fn unsupported_extension_is_none() {
        assert_eq!(language_for_extension("txt"), None);
    }
}
