//! Shared test helpers and utilities

use std::fs;
use tempfile::TempDir;

/// Get the path to the gridforge binary (target/debug/gridforge)
///
/// This is shared across all integration tests to avoid duplication.
pub(crate) fn get_gridforge_binary() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    std::path::Path::new(manifest_dir)
        .join("target/debug/gridforge")
        .to_string_lossy()
        .to_string()
}

/// Create a minimal voxgrid project skeleton in a temporary directory:
/// a source tree with a bindings subtree and the package metadata file.
#[allow(dead_code)]
pub(crate) fn create_project_skeleton(temp: &TempDir) {
    let root = temp.path();
    fs::create_dir_all(root.join("src/bindings")).expect("Failed to create source tree");
    fs::create_dir_all(root.join("voxgrid")).expect("Failed to create package dir");
    fs::write(
        root.join("voxgrid/__init__.py"),
        "__version__ = \"0.9.0\"\n",
    )
    .expect("Failed to write package metadata");
    fs::write(root.join("src/grid_batch.cpp"), "// host source\n")
        .expect("Failed to write source file");
    fs::write(root.join("src/bindings/module.cpp"), "// binding source\n")
        .expect("Failed to write binding source");
}
