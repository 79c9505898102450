//! Fetch command
//!
//! Acquires the pinned external dependencies (and applies their
//! compatibility patches) without compiling anything, for warming a
//! build environment ahead of time.

use anyhow::Result;
use gridforge::{BuildConfig, BuildPipeline};

pub(crate) fn run(verbose: bool, quiet: bool) -> Result<()> {
    let root = gridforge::paths::project_root()?;
    let config = BuildConfig::from_env(root, false, None, verbose, quiet);

    let pipeline = BuildPipeline::new(config);
    pipeline.fetch_dependencies()?;

    if !quiet {
        println!("External dependencies are up to date");
    }
    Ok(())
}
