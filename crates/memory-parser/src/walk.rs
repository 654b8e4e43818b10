//! Gitignore-aware directory walk, grounded on `drift-core::scanner`'s use
//! of the `ignore` crate. Default ignores match common non-source
//! directories; extra patterns come from `MemoryConfig::parser_extra_ignores`.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
];

/// Walk `root`, honouring `.gitignore`/`.ignore` files, the built-in default
/// ignore set, and `extra_ignores` (directory/file names to skip anywhere
/// in the tree). Returns every regular file not excluded, in directory
/// order.
pub fn walk_source_files(root: &Path, extra_ignores: &[String]) -> Vec<PathBuf> {
    let skip_names: Vec<String> =
        DEFAULT_IGNORES.iter().map(|s| s.to_string()).chain(extra_ignores.iter().cloned()).collect();

    let mut builder = WalkBuilder::new(root);
    builder.hidden(false).git_ignore(true).git_global(false).git_exclude(false);
    builder.filter_entry(move |entry| {
        entry
            .file_name()
            .to_str()
            .map(|name| !skip_names.iter().any(|skip| skip == name))
            .unwrap_or(true)
    });

    builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn skips_default_ignored_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.py"), "x = 1").unwrap();
        fs::write(dir.path().join("main.py"), "x = 1").unwrap();

        let files = walk_source_files(dir.path(), &[]);
        assert!(files.iter().any(|p| p.ends_with("main.py")));
        assert!(!files.iter().any(|p| p.to_string_lossy().contains("node_modules")));
    }

    #[test]
    fn honours_extra_ignore_patterns() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendored")).unwrap();
        fs::write(dir.path().join("vendored/lib.py"), "x = 1").unwrap();
        fs::write(dir.path().join("main.py"), "x = 1").unwrap();

        let files = walk_source_files(dir.path(), &["vendored".to_string()]);
        assert!(files.iter().any(|p| p.ends_with("main.py")));
        assert!(!files.iter().any(|p| p.to_string_lossy().contains("vendored")));
    }
}
