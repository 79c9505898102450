//! Nested CMake builds
//!
//! Some fetched dependencies need their own native build before voxgrid
//! can compile against them. The convention is fixed: `<source>/build`
//! for the build graph, `<source>/install` as the install prefix, `lib`
//! as the library directory.
//!
//! Build process:
//! ```bash
//! mkdir -p build install
//! cd build
//! cmake <source> -DCMAKE_INSTALL_PREFIX=<source>/install -DCMAKE_INSTALL_LIBDIR=lib <defines>
//! cmake --build . --target install -j<jobs>
//! ```

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Drives configure/build/install of a dependency's CMake tree.
#[derive(Debug)]
pub struct CmakeBuilder {
    /// Path to the CMake executable
    cmake_path: PathBuf,
    /// Parallelism handed to the generated build graph
    jobs: usize,
    /// Echo subprocess output
    verbose: bool,
}

impl CmakeBuilder {
    /// Create a new builder, locating the CMake executable.
    ///
    /// Priority order:
    /// 1. `CMAKE` environment variable
    /// 2. `cmake` in `PATH`
    /// 3. Error if not found
    ///
    /// # Errors
    ///
    /// Returns an error if no CMake executable can be found.
    pub fn new(jobs: usize, verbose: bool) -> Result<Self> {
        let cmake_path = Self::find_cmake_executable()
            .context("CMake executable not found. Nested dependency builds require CMake.")?;

        Ok(Self {
            cmake_path,
            jobs,
            verbose,
        })
    }

    /// Find the CMake executable on the system
    fn find_cmake_executable() -> Result<PathBuf> {
        if let Ok(cmake_env) = std::env::var("CMAKE") {
            let path = PathBuf::from(cmake_env);
            if path.exists() {
                return Ok(path);
            }
        }

        if let Ok(output) = Command::new("which").arg("cmake").output()
            && output.status.success()
        {
            let path_str = String::from_utf8_lossy(&output.stdout);
            let path = PathBuf::from(path_str.trim());
            if path.exists() {
                return Ok(path);
            }
        }

        anyhow::bail!("CMake executable not found. Install CMake from https://cmake.org")
    }

    /// Configure and build-install a dependency source tree.
    ///
    /// Both phases run to completion or fail the whole build. Returns the
    /// install directory for downstream include/library wiring.
    ///
    /// # Errors
    ///
    /// Returns an error if either the configure or the build/install
    /// phase exits non-zero, with the captured output attached.
    pub fn build(&self, source_dir: &Path, defines: &[&str]) -> Result<PathBuf> {
        let build_dir = source_dir.join("build");
        let install_dir = source_dir.join("install");
        std::fs::create_dir_all(&build_dir).context("Failed to create build directory")?;
        std::fs::create_dir_all(&install_dir).context("Failed to create install directory")?;

        let configure_output = Command::new(&self.cmake_path)
            .arg(source_dir)
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", install_dir.display()))
            .arg("-DCMAKE_INSTALL_LIBDIR=lib")
            .args(defines)
            .current_dir(&build_dir)
            .output()
            .context("Failed to execute cmake configure")?;

        self.echo(&configure_output.stdout, &configure_output.stderr);
        if !configure_output.status.success() {
            bail!(
                "CMake configuration failed for {}:\n{}",
                source_dir.display(),
                String::from_utf8_lossy(&configure_output.stderr)
            );
        }

        let build_output = Command::new(&self.cmake_path)
            .arg("--build")
            .arg(".")
            .arg("--target")
            .arg("install")
            .arg(format!("-j{}", self.jobs))
            .current_dir(&build_dir)
            .output()
            .context("Failed to execute cmake build")?;

        self.echo(&build_output.stdout, &build_output.stderr);
        if !build_output.status.success() {
            bail!(
                "CMake build failed for {}:\n{}",
                source_dir.display(),
                String::from_utf8_lossy(&build_output.stderr)
            );
        }

        Ok(install_dir)
    }

    fn echo(&self, stdout: &[u8], stderr: &[u8]) {
        if self.verbose {
            print!("{}", String::from_utf8_lossy(stdout));
            eprint!("{}", String::from_utf8_lossy(stderr));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_cmake() {
        // Passes whether or not CMake is installed; only the error shape
        // is pinned down.
        match CmakeBuilder::find_cmake_executable() {
            Ok(path) => assert!(path.exists(), "CMake path exists"),
            Err(e) => assert!(e.to_string().contains("CMake executable not found")),
        }
    }

    #[test]
    fn builder_creation() {
        match CmakeBuilder::new(2, false) {
            Ok(builder) => assert_eq!(builder.jobs, 2),
            Err(e) => assert!(e.to_string().contains("CMake")),
        }
    }

    #[test]
    fn build_creates_directories_before_configuring() {
        // Even a failing configure must have created the idempotent
        // build/install directories first.
        let Ok(builder) = CmakeBuilder::new(1, false) else {
            return;
        };

        let temp = tempfile::TempDir::new().unwrap();
        let source = temp.path().join("dep");
        std::fs::create_dir_all(&source).unwrap();

        // No CMakeLists.txt, so configure fails
        let result = builder.build(&source, &[]);
        assert!(result.is_err());
        assert!(source.join("build").is_dir());
        assert!(source.join("install").is_dir());
    }
}
