//! Artifact reconciliation
//!
//! Runs after compilation: canonicalizes the primary shared library's
//! platform-tagged output to the fixed name the binding module links
//! against, mirrors it into every requested layout, and copies the
//! public headers into the namespaced include tree the packaged layout
//! exposes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::manifest;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Expected exactly one {pattern} artifact in {dir}, found none")]
    MissingArtifact { pattern: String, dir: String },

    #[error("Expected exactly one {pattern} artifact in {dir}, found {count}")]
    AmbiguousArtifact {
        pattern: String,
        dir: String,
        count: usize,
    },

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReconcileError {
    fn wrap_io(path: impl Into<String>) -> impl Fn(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::IoError {
            path: path.clone(),
            source,
        }
    }
}

/// Locate the compiled primary library in the staged package directory.
///
/// Exactly one file must match the `voxgridlib*.so` naming convention;
/// zero or more than one is a consistency error.
///
/// # Errors
///
/// Returns `MissingArtifact` or `AmbiguousArtifact` on a match count
/// other than one.
pub fn locate_primary_artifact(staged_dir: &Path) -> Result<PathBuf, ReconcileError> {
    let pattern = format!("{}*.so", manifest::PRIMARY_MODULE);
    let dir_display = staged_dir.display().to_string();

    let entries =
        fs::read_dir(staged_dir).map_err(ReconcileError::wrap_io(dir_display.clone()))?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(manifest::PRIMARY_MODULE) && name.ends_with(".so")
        })
        .map(|entry| entry.path())
        .collect();

    match matches.len() {
        0 => Err(ReconcileError::MissingArtifact {
            pattern,
            dir: dir_display,
        }),
        1 => Ok(matches.remove(0)),
        count => Err(ReconcileError::AmbiguousArtifact {
            pattern,
            dir: dir_display,
            count,
        }),
    }
}

/// The layouts that receive the canonical library: the staged package
/// tree always, the in-place tree when an editable build was requested.
#[must_use]
pub fn mirror_destinations(config: &BuildConfig) -> Vec<PathBuf> {
    let mut destinations = vec![config.staged_package_dir()];
    if config.inplace() {
        destinations.push(config.inplace_package_dir());
    }
    destinations
}

/// Canonicalize the primary artifact within the staged layout only.
///
/// The binding module links `-lvoxgrid`, so the canonical name must
/// exist before its link step; the full reconcile pass repeats this
/// idempotently and adds the mirrors.
///
/// # Errors
///
/// Returns a consistency error when the staged directory does not hold
/// exactly one matching artifact.
pub fn canonicalize(config: &BuildConfig) -> Result<PathBuf, ReconcileError> {
    let staged = config.staged_package_dir();
    let artifact = locate_primary_artifact(&staged)?;

    let canonical = staged.join(manifest::CANONICAL_LIB_NAME);
    if canonical.exists() {
        fs::remove_file(&canonical)
            .map_err(ReconcileError::wrap_io(canonical.display().to_string()))?;
    }
    fs::copy(&artifact, &canonical)
        .map_err(ReconcileError::wrap_io(canonical.display().to_string()))?;

    Ok(canonical)
}

/// Canonicalize the compiled primary library and mirror outputs.
///
/// # Errors
///
/// Returns a consistency error when the staged directory does not hold
/// exactly one matching artifact (no copy is performed in that case),
/// or an I/O error from the copies themselves.
pub fn reconcile(config: &BuildConfig) -> Result<(), ReconcileError> {
    let staged = config.staged_package_dir();
    let artifact = locate_primary_artifact(&staged)?;

    for destination in mirror_destinations(config) {
        fs::create_dir_all(&destination)
            .map_err(ReconcileError::wrap_io(destination.display().to_string()))?;

        let canonical = destination.join(manifest::CANONICAL_LIB_NAME);
        if canonical.exists() {
            fs::remove_file(&canonical)
                .map_err(ReconcileError::wrap_io(canonical.display().to_string()))?;
        }

        if !config.quiet() {
            println!("Copying {} -> {}", artifact.display(), canonical.display());
        }
        fs::copy(&artifact, &canonical)
            .map_err(ReconcileError::wrap_io(canonical.display().to_string()))?;
    }

    mirror_headers(config)
}

/// Copy public headers from the primary and grid-engine source trees
/// into the namespaced include layout under the staged package root, so
/// downstream consumers compile against them without referencing the
/// original source locations.
fn mirror_headers(config: &BuildConfig) -> Result<(), ReconcileError> {
    let include_root = config.staged_package_dir().join("include");
    let trees = [
        (config.primary_source_dir(), manifest::PACKAGE_NAME),
        (config.grid_engine_dir(), crate::paths::SIBLING_ENGINE_DIR),
    ];

    for (tree, namespace) in trees {
        for (relative_dir, headers) in collect_header_dirs(&tree) {
            let destination = include_root.join(namespace).join(&relative_dir);
            fs::create_dir_all(&destination)
                .map_err(ReconcileError::wrap_io(destination.display().to_string()))?;

            for header in headers {
                let Some(name) = header.file_name() else {
                    continue;
                };
                fs::copy(&header, destination.join(name))
                    .map_err(ReconcileError::wrap_io(header.display().to_string()))?;
            }
        }
    }

    Ok(())
}

/// Recursively collect header files (`.h` general, `.cuh` device) under
/// `base`, grouped by directory relative to it.
#[must_use]
pub fn collect_header_dirs(base: &Path) -> Vec<(PathBuf, Vec<PathBuf>)> {
    let mut grouped: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for entry in WalkDir::new(base)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path
            .extension()
            .is_some_and(|ext| ext == "h" || ext == "cuh")
        {
            continue;
        }

        let relative_dir = path
            .parent()
            .and_then(|dir| dir.strip_prefix(base).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        grouped.entry(relative_dir).or_default().push(path.to_path_buf());
    }

    grouped.into_iter().collect()
}
