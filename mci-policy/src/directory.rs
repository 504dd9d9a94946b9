//! Directory allow-list policy.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use mci_primitives::{Error, PathValidator};
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};
use crate::settings::PathSettings;

/// Restricts file access to a context directory and an allow-list.
///
/// Relative paths, both in the allow-list and in checked candidates, resolve
/// against the context directory. Candidates are normalised lexically and
/// then canonicalised through their longest existing ancestor, so symlinked
/// directories compare equal to their targets.
#[derive(Debug, Clone)]
pub struct DirectoryPolicy {
    context_dir: PathBuf,
    enable_any_paths: bool,
    allowed: Vec<PathBuf>,
}

impl DirectoryPolicy {
    /// Builds a policy rooted at `context_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidContextDir`] when a relative context
    /// directory cannot be anchored to the working directory.
    pub fn new(context_dir: impl AsRef<Path>, settings: &PathSettings) -> PolicyResult<Self> {
        let context_dir = context_dir.as_ref();
        let absolute = if context_dir.is_absolute() {
            context_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|err| PolicyError::InvalidContextDir {
                    path: context_dir.display().to_string(),
                    reason: err.to_string(),
                })?
                .join(context_dir)
        };
        let context_dir = resolve(&absolute);

        let mut allowed = vec![context_dir.clone()];
        allowed.extend(
            settings
                .directory_allow_list()
                .iter()
                .map(|entry| resolve(&context_dir.join(entry))),
        );

        Ok(Self {
            context_dir,
            enable_any_paths: settings.enable_any_paths(),
            allowed,
        })
    }

    /// Resolved context directory.
    #[must_use]
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// Every allowed directory, context directory first.
    #[must_use]
    pub fn allowed_dirs(&self) -> &[PathBuf] {
        &self.allowed
    }

    /// Returns true when path checks are disabled.
    #[must_use]
    pub const fn allows_any_path(&self) -> bool {
        self.enable_any_paths
    }

    /// Checks whether `path` may be accessed.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::OutsideAllowedDirectories`] when the path does
    /// not fall under any allowed directory.
    pub fn check(&self, path: &str) -> PolicyResult<()> {
        if self.enable_any_paths {
            return Ok(());
        }

        let candidate = resolve(&self.context_dir.join(path));
        if self.allowed.iter().any(|dir| candidate.starts_with(dir)) {
            return Ok(());
        }

        debug!(path, "path rejected by directory policy");
        Err(PolicyError::outside(path))
    }
}

impl PathValidator for DirectoryPolicy {
    fn validate(&self, path: &str) -> mci_primitives::Result<()> {
        self.check(path)
            .map_err(|err| Error::path_denied(path, err.to_string()))
    }
}

/// Removes `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Normalises `path`, then canonicalises its longest existing ancestor.
fn resolve(path: &Path) -> PathBuf {
    let normalized = normalize(path);
    let mut existing = normalized.as_path();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return tail
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, DirectoryPolicy) {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("schema")).unwrap();
        fs::create_dir_all(root.path().join("shared")).unwrap();
        fs::write(root.path().join("schema/readme.txt"), "hi").unwrap();
        let policy = DirectoryPolicy::new(
            root.path().join("schema"),
            &PathSettings::new(false, vec!["../shared".into()]),
        )
        .unwrap();
        (root, policy)
    }

    #[test]
    fn context_dir_is_always_allowed() {
        let (root, policy) = fixture();
        assert!(policy.check("readme.txt").is_ok());
        let absolute = root.path().join("schema/readme.txt");
        assert!(policy.check(absolute.to_str().unwrap()).is_ok());
        assert!(policy.check("not-yet-created/file.txt").is_ok());
    }

    #[test]
    fn relative_allow_list_entries_resolve_against_context_dir() {
        let (root, policy) = fixture();
        let shared = root.path().join("shared/data.csv");
        assert!(policy.check(shared.to_str().unwrap()).is_ok());
        assert!(policy.check("../shared/data.csv").is_ok());
        assert_eq!(policy.allowed_dirs().len(), 2);
    }

    #[test]
    fn traversal_outside_is_rejected() {
        let (_root, policy) = fixture();
        let err = policy.check("../../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("enableAnyPaths"));
        assert!(policy.check("/etc/passwd").is_err());
        assert!(policy.check("subdir/../../elsewhere.txt").is_err());
    }

    #[test]
    fn sibling_prefix_is_not_a_match() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("app")).unwrap();
        fs::create_dir_all(root.path().join("app-secrets")).unwrap();
        let policy = DirectoryPolicy::new(root.path().join("app"), &PathSettings::default()).unwrap();
        let sibling = root.path().join("app-secrets/key");
        assert!(policy.check(sibling.to_str().unwrap()).is_err());
    }

    #[test]
    fn enable_any_paths_skips_checks() {
        let root = tempfile::tempdir().unwrap();
        let policy = DirectoryPolicy::new(root.path(), &PathSettings::allow_any()).unwrap();
        assert!(policy.allows_any_path());
        assert!(policy.check("/etc/passwd").is_ok());
    }

    #[test]
    fn validator_reports_path_denied() {
        let (_root, policy) = fixture();
        let validator: &dyn PathValidator = &policy;
        let err = validator.validate("/etc/shadow").unwrap_err();
        assert!(matches!(err, Error::PathDenied { ref path, .. } if path == "/etc/shadow"));
    }

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(
            normalize(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
    }
}
