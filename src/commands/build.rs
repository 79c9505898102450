//! Build command
//!
//! Runs the full pipeline: toolchain gating, dependency acquisition,
//! nested native builds, conditional binary-package acquisition, module
//! compilation, and artifact reconciliation.

use anyhow::Result;
use gridforge::{BuildConfig, BuildPipeline};

pub(crate) async fn run(
    inplace: bool,
    jobs: Option<usize>,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    let root = gridforge::paths::project_root()?;
    let config = BuildConfig::from_env(root, inplace, jobs, verbose, quiet);

    if !quiet {
        let version = gridforge::retrieve_version(config.project_root());
        println!("gridforge: building voxgrid {version}");
    }

    BuildPipeline::new(config).run().await
}
