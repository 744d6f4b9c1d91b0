//! Removal of build leftovers from a bundle.

use crate::bundler::{
    error::{Error, Result},
    platform::Progress,
    utils::fs,
};
use std::path::{Component, Path};

/// Deletes everything under `bundle_dir` matching one of `patterns`.
///
/// Patterns are bundle-relative globs. A pattern that is absolute or climbs
/// out of the bundle with `..` is rejected before anything is removed.
pub async fn cleanup(bundle_dir: &Path, patterns: &[String]) -> Result<Progress> {
    for pattern in patterns {
        if !is_bundle_relative(pattern) {
            return Err(Error::Config(format!(
                "cleanup pattern {pattern:?} must stay inside the bundle"
            )));
        }
    }

    let mut removed = 0;
    for pattern in patterns {
        let absolute = format!(
            "{}/{}",
            glob::Pattern::escape(&bundle_dir.to_string_lossy()),
            pattern
        );
        // Collected up front: removing a directory mid-walk would break the iterator.
        let matches: Vec<_> = glob::glob(&absolute)
            .map_err(|e| Error::Config(format!("invalid cleanup pattern {pattern}: {e}")))?
            .collect();

        for path in matches {
            let path = path.map_err(|e| Error::Fs {
                context: "matching cleanup pattern in",
                path: e.path().to_path_buf(),
                error: std::io::Error::new(e.error().kind(), e.error().to_string()),
            })?;
            if !path.starts_with(bundle_dir) {
                continue;
            }
            log::debug!("Removing {}", path.display());
            fs::remove_path(&path).await?;
            removed += 1;
        }
    }

    if removed == 0 {
        return Ok(Progress::Skipped("nothing to clean up".into()));
    }
    log::info!("✓ Removed {} unneeded path(s)", removed);
    Ok(Progress::Done)
}

fn is_bundle_relative(pattern: &str) -> bool {
    !pattern.is_empty()
        && Path::new(pattern)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_patterns_are_not_bundle_relative() {
        assert!(is_bundle_relative("**/__pycache__"));
        assert!(is_bundle_relative("./app/*.log"));
        assert!(!is_bundle_relative("../precious.txt"));
        assert!(!is_bundle_relative("app/../../precious.txt"));
        assert!(!is_bundle_relative("/etc/hosts"));
        assert!(!is_bundle_relative(""));
    }

    #[tokio::test]
    async fn parent_patterns_leave_siblings_alone() {
        let root = tempfile::tempdir().unwrap();
        let bundle = root.path().join("bundle");
        std::fs::create_dir_all(bundle.join("cache")).unwrap();
        let sibling = root.path().join("precious.txt");
        std::fs::write(&sibling, "keep").unwrap();

        let result = cleanup(&bundle, &["cache".to_string(), "../precious.txt".to_string()]).await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert!(sibling.exists());
        assert!(bundle.join("cache").exists());
    }
}
