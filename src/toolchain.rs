//! Toolchain capability detection and flag selection
//!
//! Runs before any expensive work: enumerates the device compiler's
//! supported compute-capability targets (a hard go/no-go gate), detects
//! the toolkit version, and derives the language standard, flag sets,
//! and whether the prebuilt cudnn package is needed at all.

use regex::Regex;
use serde::Serialize;
use std::process::Command;
use thiserror::Error;

use crate::config::BuildConfig;

/// Minimum device compute capability voxgrid compiles for.
pub const MIN_COMPUTE_CAPABILITY: u32 = 80;

/// Toolkit major version at which the newer language standard and the
/// cudnn package become required.
const CUDNN_TOOLKIT_MAJOR: u32 = 12;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error(
        "voxgrid requires a minimum compute capability of sm_{required}, \
         but the toolchain supports at most sm_{found}"
    )]
    ComputeCapabilityTooLow { found: u32, required: u32 },
}

/// Detected toolchain capabilities and the compiler flag sets derived
/// from them. Derived fresh on each invocation, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainProfile {
    /// Detected toolkit version as (major, minor), absent without a
    /// device compiler
    pub cuda_version: Option<(u32, u32)>,
    /// Highest supported compute capability, absent without a device
    /// compiler
    pub max_compute_capability: Option<u32>,
    /// Lowest compute capability voxgrid accepts
    pub min_compute_capability: u32,
    /// Selected language standard
    pub cpp_std: &'static str,
    /// Host compiler flags
    pub cxx_flags: Vec<String>,
    /// Device compiler flags (fixed set plus user extras)
    pub nvcc_flags: Vec<String>,
    /// Whether the prebuilt cudnn package must be acquired
    pub needs_cudnn_package: bool,
}

/// Inspect the installed toolchain and derive the build profile.
///
/// # Errors
///
/// Returns `ComputeCapabilityTooLow` when the device compiler's best
/// supported target is below [`MIN_COMPUTE_CAPABILITY`]. This is checked
/// before anything else is decided.
pub fn select(config: &BuildConfig) -> Result<ToolchainProfile, ToolchainError> {
    let codes = query_gpu_codes(config);
    check_compute_capability(&codes)?;

    let cuda_version = query_toolkit_version(config);

    Ok(profile_for(
        cuda_version,
        codes.iter().max().copied(),
        config.extra_device_flags(),
    ))
}

/// Enumerate the device compiler's supported `sm_NN` targets. Missing or
/// failing device compiler yields an empty list.
fn query_gpu_codes(config: &BuildConfig) -> Vec<u32> {
    Command::new(config.device_compiler())
        .arg("--list-gpu-code")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| parse_gpu_codes(&String::from_utf8_lossy(&output.stdout)))
        .unwrap_or_default()
}

/// Detect the toolkit version by invoking the device compiler's version
/// reporter.
fn query_toolkit_version(config: &BuildConfig) -> Option<(u32, u32)> {
    let output = Command::new(config.device_compiler())
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    parse_toolkit_version(&String::from_utf8_lossy(&output.stdout))
}

fn parse_gpu_codes(output: &str) -> Vec<u32> {
    let re = Regex::new(r"sm_(\d+)").expect("valid gpu code pattern");
    re.captures_iter(output)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

fn parse_toolkit_version(output: &str) -> Option<(u32, u32)> {
    let re = Regex::new(r"release (\d+)\.(\d+)").expect("valid version pattern");
    let caps = re.captures(output)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// The go/no-go gate: the best supported target must reach the minimum.
/// An empty enumeration (no device compiler installed) is vacuously
/// acceptable; the version branch then selects the older standard.
fn check_compute_capability(codes: &[u32]) -> Result<(), ToolchainError> {
    if let Some(max) = codes.iter().max()
        && *max < MIN_COMPUTE_CAPABILITY
    {
        return Err(ToolchainError::ComputeCapabilityTooLow {
            found: *max,
            required: MIN_COMPUTE_CAPABILITY,
        });
    }
    Ok(())
}

/// Derive standard, flags, and the cudnn decision from the detected
/// toolkit version. The language standard and the feature macro always
/// move together.
fn profile_for(
    cuda_version: Option<(u32, u32)>,
    max_compute_capability: Option<u32>,
    extra_nvcc_flags: &[String],
) -> ToolchainProfile {
    let needs_cudnn_package =
        cuda_version.is_some_and(|(major, _)| major >= CUDNN_TOOLKIT_MAJOR);
    let cpp_std = if needs_cudnn_package { "c++20" } else { "c++17" };

    let mut cxx_flags = vec![
        format!("-std={cpp_std}"),
        "-Wno-unknown-pragmas".to_string(),
        "-Wno-class-memaccess".to_string(),
        "-fdiagnostics-color=always".to_string(),
        "-DNANOGRID_USE_BLOSC".to_string(),
    ];
    if needs_cudnn_package {
        cxx_flags.push("-DVOXGRID_USE_CUDNN".to_string());
    }

    let mut nvcc_flags = vec![
        format!("-std={cpp_std}"),
        "--extended-lambda".to_string(),
        "--diag-suppress=186".to_string(),
        "-diag-suppress=3189".to_string(),
        "-Xfatbin".to_string(),
        "-compress-all".to_string(),
    ];
    nvcc_flags.extend(extra_nvcc_flags.iter().cloned());

    ToolchainProfile {
        cuda_version,
        max_compute_capability,
        min_compute_capability: MIN_COMPUTE_CAPABILITY,
        cpp_std,
        cxx_flags,
        nvcc_flags,
        needs_cudnn_package,
    }
}
