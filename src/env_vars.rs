//! Build environment variable handling.
//!
//! Everything here is read exactly once, when [`crate::BuildConfig`] is
//! constructed. Components receive the captured values through the config
//! rather than consulting the process environment themselves.

use std::env;

/// Get the isolated-toolchain prefix, if the build runs inside one.
///
/// Presence of this variable selects the environment's own host/device
/// compiler pair instead of the system compilers.
pub fn conda_prefix() -> Option<String> {
    env::var("CONDA_PREFIX").ok()
}

/// Get the host C++ compiler override.
pub fn cxx() -> Option<String> {
    env::var("CXX").ok()
}

/// Get the device toolkit root (the directory holding `bin/nvcc`).
pub fn cuda_home() -> Option<String> {
    env::var("CUDA_HOME").ok()
}

/// Get extra device-compiler flags from `NVCC_FLAGS` (space-separated).
///
/// These are appended to the fixed flag set, never replacing it.
pub fn nvcc_flags() -> Vec<String> {
    env::var("NVCC_FLAGS")
        .map(|s| split_flag_list(&s))
        .unwrap_or_default()
}

/// Get the nested-build parallelism override (returns None if not set).
pub fn build_jobs() -> Option<usize> {
    env::var("GRIDFORGE_JOBS").ok().and_then(|s| s.parse().ok())
}

/// Split a space-separated flag list, dropping empty entries.
fn split_flag_list(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .map(std::string::ToString::to_string)
        .collect()
}
