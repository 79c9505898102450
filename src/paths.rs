//! Project layout resolution
//!
//! Leaf helpers for locating the project root, the `external/` dependency
//! root, and the grid-engine source tree.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Name of the sibling grid-engine checkout used when voxgrid is built as
/// a component of a larger parent build.
pub const SIBLING_ENGINE_DIR: &str = "nanogrid";

/// Resolve the project root (the invocation directory).
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn project_root() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to determine the project root directory")
}

/// Ensure the `external/` dependency root exists and return it.
///
/// The directory is created on first use. A pre-existing non-directory at
/// that path is a configuration error, never silently replaced.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or if it
/// cannot be created.
pub fn ensure_external_dir(project_root: &Path) -> Result<PathBuf> {
    let external = project_root.join("external");
    if external.exists() {
        if !external.is_dir() {
            bail!(
                "External path {} exists but is not a directory",
                external.display()
            );
        }
    } else {
        std::fs::create_dir_all(&external).with_context(|| {
            format!("Failed to create external directory {}", external.display())
        })?;
    }
    Ok(external)
}

/// Locate the grid-engine source tree.
///
/// A sibling `../nanogrid` checkout exists when voxgrid is built as part of
/// a parent build and takes precedence; otherwise the tree inside the
/// fetched `gridvdb` dependency is used.
#[must_use]
pub fn grid_engine_dir(project_root: &Path) -> PathBuf {
    let sibling = sibling_engine_dir(project_root);
    if sibling.exists() {
        sibling
    } else {
        project_root
            .join("external")
            .join(crate::manifest::GRID_ENGINE_REPO.name)
            .join(SIBLING_ENGINE_DIR)
    }
}

/// Check whether a sibling grid-engine checkout is present.
#[must_use]
pub fn has_sibling_engine(project_root: &Path) -> bool {
    sibling_engine_dir(project_root).exists()
}

fn sibling_engine_dir(project_root: &Path) -> PathBuf {
    project_root.join("..").join(SIBLING_ENGINE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn external_dir_is_created() -> Result<()> {
        let temp = TempDir::new()?;
        let external = ensure_external_dir(temp.path())?;
        assert!(external.is_dir());

        // Re-invocation is idempotent
        let again = ensure_external_dir(temp.path())?;
        assert_eq!(external, again);
        Ok(())
    }

    #[test]
    fn external_path_occupied_by_file_is_rejected() -> Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join("external"), b"not a directory")?;

        let result = ensure_external_dir(temp.path());
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("not a directory"), "got: {message}");

        // The offending file is left untouched
        assert!(temp.path().join("external").is_file());
        Ok(())
    }

    #[test]
    fn engine_dir_prefers_sibling_checkout() -> Result<()> {
        let temp = TempDir::new()?;
        let project = temp.path().join("voxgrid-project");
        fs::create_dir_all(&project)?;
        fs::create_dir_all(temp.path().join(SIBLING_ENGINE_DIR))?;

        let dir = grid_engine_dir(&project);
        assert!(has_sibling_engine(&project));
        assert!(dir.ends_with(Path::new("..").join(SIBLING_ENGINE_DIR)));
        Ok(())
    }

    #[test]
    fn engine_dir_falls_back_to_fetched_dependency() -> Result<()> {
        let temp = TempDir::new()?;
        let project = temp.path().join("voxgrid-project");
        fs::create_dir_all(&project)?;

        let dir = grid_engine_dir(&project);
        assert!(!has_sibling_engine(&project));
        assert_eq!(
            dir,
            project
                .join("external")
                .join(crate::manifest::GRID_ENGINE_REPO.name)
                .join(SIBLING_ENGINE_DIR)
        );
        Ok(())
    }
}
