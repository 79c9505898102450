//! Doctor command - report the detected toolchain profile
//!
//! Runs the compute-capability gate and version detection without
//! performing any expensive work, so a broken toolchain surfaces before
//! a build is attempted.

use anyhow::Result;
use gridforge::{BuildConfig, toolchain};

pub(crate) fn run(json: bool) -> Result<()> {
    let root = gridforge::paths::project_root()?;
    let config = BuildConfig::from_env(root, false, None, false, true);

    let profile = toolchain::select(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    let version = gridforge::retrieve_version(config.project_root());
    println!("voxgrid version: {version}");

    match profile.cuda_version {
        Some((major, minor)) => println!("Device toolkit: release {major}.{minor}"),
        None => println!("Device toolkit: not found"),
    }
    match profile.max_compute_capability {
        Some(max) => println!("Max compute capability: sm_{max}"),
        None => println!("Max compute capability: unknown"),
    }
    println!(
        "Minimum required capability: sm_{}",
        profile.min_compute_capability
    );
    println!("Language standard: {}", profile.cpp_std);
    println!(
        "cudnn package required: {}",
        if profile.needs_cudnn_package { "yes" } else { "no" }
    );
    println!("Grid engine tree: {}", config.grid_engine_dir().display());

    Ok(())
}
