//! Build configuration
//!
//! [`BuildConfig`] is constructed once at process start. It snapshots the
//! relevant environment (isolated-toolchain compiler pair, extra device
//! flags, toolkit location) and derives every path of the build layout, so
//! no component reads the process environment or guesses directory
//! conventions at work time.

use std::path::{Path, PathBuf};

use crate::{env_vars, manifest, paths};

/// Host compiler used inside an isolated toolchain environment.
const ISOLATED_HOST_COMPILER: &str = "x86_64-conda-linux-gnu-g++";

/// Host-side compiler handed to the device compiler (`-ccbin`) inside an
/// isolated toolchain environment.
const ISOLATED_DEVICE_CCBIN: &str = "x86_64-conda-linux-gnu-gcc";

/// Snapshot of everything the build pipeline needs to know, threaded
/// explicitly into each component.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    project_root: PathBuf,
    inplace: bool,
    jobs: usize,
    verbose: bool,
    quiet: bool,
    host_compiler: String,
    device_compiler: PathBuf,
    device_ccbin: Option<String>,
    extra_device_flags: Vec<String>,
}

impl BuildConfig {
    /// Build a configuration from the process environment and the given
    /// command-line options. The environment is read here and nowhere
    /// else.
    #[must_use]
    pub fn from_env(
        project_root: PathBuf,
        inplace: bool,
        jobs: Option<usize>,
        verbose: bool,
        quiet: bool,
    ) -> Self {
        let conda_prefix = env_vars::conda_prefix();
        let host_compiler = resolve_host_compiler(conda_prefix.as_deref(), env_vars::cxx());
        let device_ccbin = resolve_device_ccbin(conda_prefix.as_deref());
        let device_compiler = resolve_device_compiler(env_vars::cuda_home());

        let jobs = jobs
            .or_else(env_vars::build_jobs)
            .unwrap_or_else(default_jobs);

        Self {
            project_root,
            inplace,
            jobs,
            verbose,
            quiet,
            host_compiler,
            device_compiler,
            device_ccbin,
            extra_device_flags: env_vars::nvcc_flags(),
        }
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Root directory holding one subdirectory per fetched dependency.
    #[must_use]
    pub fn external_root(&self) -> PathBuf {
        self.project_root.join("external")
    }

    /// Root of all build outputs.
    #[must_use]
    pub fn build_root(&self) -> PathBuf {
        self.project_root.join("build")
    }

    /// Staged build output root (headers are mirrored beneath it).
    #[must_use]
    pub fn build_lib_dir(&self) -> PathBuf {
        self.build_root().join("lib")
    }

    /// Intermediate object-file directory.
    #[must_use]
    pub fn build_temp_dir(&self) -> PathBuf {
        self.build_root().join("temp")
    }

    /// Staged package directory that receives compiled modules and the
    /// canonical library.
    #[must_use]
    pub fn staged_package_dir(&self) -> PathBuf {
        self.build_lib_dir().join(manifest::PACKAGE_NAME)
    }

    /// In-place package directory mirrored into when an editable build is
    /// requested.
    #[must_use]
    pub fn inplace_package_dir(&self) -> PathBuf {
        self.project_root.join(manifest::PACKAGE_NAME)
    }

    /// Primary library source tree.
    #[must_use]
    pub fn primary_source_dir(&self) -> PathBuf {
        self.project_root.join("src")
    }

    /// Binding-layer source subtree.
    #[must_use]
    pub fn bindings_source_dir(&self) -> PathBuf {
        self.primary_source_dir().join("bindings")
    }

    /// Grid-engine source tree (sibling checkout preferred).
    #[must_use]
    pub fn grid_engine_dir(&self) -> PathBuf {
        paths::grid_engine_dir(&self.project_root)
    }

    #[must_use]
    pub fn inplace(&self) -> bool {
        self.inplace
    }

    #[must_use]
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Host C++ compiler, honoring the isolated-toolchain override.
    #[must_use]
    pub fn host_compiler(&self) -> &str {
        &self.host_compiler
    }

    /// Device compiler executable.
    #[must_use]
    pub fn device_compiler(&self) -> &Path {
        &self.device_compiler
    }

    /// Host-side compiler the device compiler should delegate to, if an
    /// isolated toolchain is active.
    #[must_use]
    pub fn device_ccbin(&self) -> Option<&str> {
        self.device_ccbin.as_deref()
    }

    /// User-supplied extra device-compiler flags (appended to the fixed
    /// set).
    #[must_use]
    pub fn extra_device_flags(&self) -> &[String] {
        &self.extra_device_flags
    }
}

fn resolve_host_compiler(conda_prefix: Option<&str>, cxx: Option<String>) -> String {
    if conda_prefix.is_some() {
        ISOLATED_HOST_COMPILER.to_string()
    } else {
        cxx.unwrap_or_else(|| "c++".to_string())
    }
}

fn resolve_device_ccbin(conda_prefix: Option<&str>) -> Option<String> {
    conda_prefix.map(|_| ISOLATED_DEVICE_CCBIN.to_string())
}

fn resolve_device_compiler(cuda_home: Option<String>) -> PathBuf {
    cuda_home.map_or_else(
        || PathBuf::from("nvcc"),
        |home| Path::new(&home).join("bin").join("nvcc"),
    )
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_environment_selects_its_compiler_pair() {
        let host = resolve_host_compiler(Some("/opt/conda"), Some("clang++".to_string()));
        assert_eq!(host, ISOLATED_HOST_COMPILER);
        assert_eq!(
            resolve_device_ccbin(Some("/opt/conda")).as_deref(),
            Some(ISOLATED_DEVICE_CCBIN)
        );
    }

    #[test]
    fn host_compiler_falls_back_to_cxx_then_default() {
        assert_eq!(
            resolve_host_compiler(None, Some("clang++".to_string())),
            "clang++"
        );
        assert_eq!(resolve_host_compiler(None, None), "c++");
        assert!(resolve_device_ccbin(None).is_none());
    }

    #[test]
    fn device_compiler_prefers_toolkit_home() {
        assert_eq!(
            resolve_device_compiler(Some("/usr/local/cuda".to_string())),
            PathBuf::from("/usr/local/cuda/bin/nvcc")
        );
        assert_eq!(resolve_device_compiler(None), PathBuf::from("nvcc"));
    }

    #[test]
    fn layout_paths_derive_from_project_root() {
        let config = BuildConfig::from_env(
            PathBuf::from("/work/voxgrid"),
            true,
            Some(4),
            false,
            false,
        );

        assert_eq!(config.external_root(), PathBuf::from("/work/voxgrid/external"));
        assert_eq!(
            config.staged_package_dir(),
            PathBuf::from("/work/voxgrid/build/lib/voxgrid")
        );
        assert_eq!(
            config.inplace_package_dir(),
            PathBuf::from("/work/voxgrid/voxgrid")
        );
        assert_eq!(
            config.bindings_source_dir(),
            PathBuf::from("/work/voxgrid/src/bindings")
        );
        assert!(config.inplace());
        assert_eq!(config.jobs(), 4);
    }
}
