//! Path validation for file paths accepted from callers (component/function
//! memory `file_path` fields, parser orchestrator inputs): reject paths
//! that would escape the configured project root.

use std::path::{Component, Path, PathBuf};

use crate::errors::{CortexError, CortexResult};

/// Resolve `candidate` (relative to `root`) and reject it if it escapes
/// `root` via `..` components, or is an absolute path outside `root`.
pub fn validate_within_root(root: &Path, candidate: &Path) -> CortexResult<PathBuf> {
    let mut resolved = PathBuf::new();
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(CortexError::Validation {
                        message: format!(
                            "path {} escapes project root {}",
                            candidate.display(),
                            root.display()
                        ),
                    });
                }
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }

    if !resolved.starts_with(root) {
        return Err(CortexError::Validation {
            message: format!(
                "path {} is outside project root {}",
                candidate.display(),
                root.display()
            ),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_relative_path_within_root() {
        let root = Path::new("/project");
        let out = validate_within_root(root, Path::new("src/lib.rs")).unwrap();
        assert_eq!(out, PathBuf::from("/project/src/lib.rs"));
    }

    #[test]
    fn rejects_parent_dir_escape() {
        let root = Path::new("/project");
        assert!(validate_within_root(root, Path::new("../etc/passwd")).is_err());
    }

    #[test]
    fn rejects_absolute_path_outside_root() {
        let root = Path::new("/project");
        assert!(validate_within_root(root, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn accepts_absolute_path_inside_root() {
        let root = Path::new("/project");
        let out = validate_within_root(root, Path::new("/project/src/main.rs")).unwrap();
        assert_eq!(out, PathBuf::from("/project/src/main.rs"));
    }
}
