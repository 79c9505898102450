//! Pinned build inputs
//!
//! The set of external sources, the prebuilt binary package, and the
//! artifact naming contract. These pins are part of the orchestrator's
//! identity and change only with a voxgrid release, so they live in code
//! rather than a configuration file.

use std::path::Path;

/// Name of the importable package and of the staged/in-place layout dirs.
pub const PACKAGE_NAME: &str = "voxgrid";

/// Module name of the primary shared library.
pub const PRIMARY_MODULE: &str = "voxgridlib";

/// Module name of the binding layer.
pub const BINDING_MODULE: &str = "_vx";

/// Fixed, version-independent filename the binding module links against.
pub const CANONICAL_LIB_NAME: &str = "libvoxgrid.so";

/// Library name passed to the linker by the binding module (`-lvoxgrid`).
pub const PRIMARY_LINK_NAME: &str = "voxgrid";

/// An external source tree required to build voxgrid, fetched at a pinned
/// revision into `external/<name>`.
#[derive(Debug, Clone, Copy)]
pub struct ExternalDependency {
    /// Checkout directory name under `external/`
    pub name: &'static str,
    /// Clone URL
    pub url: &'static str,
    /// Pinned tag or branch checked out after cloning
    pub tag: &'static str,
    /// Fetch submodules recursively on clone
    pub recursive: bool,
    /// Optional compatibility patch (relative to the project root),
    /// applied best-effort after checkout
    pub patch: Option<&'static str>,
}

/// The grid-engine repository, fetched only when no sibling `../nanogrid`
/// checkout exists.
pub const GRID_ENGINE_REPO: ExternalDependency = ExternalDependency {
    name: "gridvdb",
    url: "https://github.com/voxgrid/gridvdb.git",
    tag: "feature/nanogrid_v1.2",
    recursive: false,
    patch: None,
};

/// Pinned dependencies fetched on every build.
pub const EXTERNAL_DEPENDENCIES: [ExternalDependency; 4] = [
    ExternalDependency {
        name: "cutlass",
        url: "https://github.com/NVIDIA/cutlass.git",
        tag: "v3.4.0",
        recursive: false,
        patch: Some("patches/cutlass.patch"),
    },
    ExternalDependency {
        name: "cudnn_fe",
        url: "https://github.com/NVIDIA/cudnn-frontend.git",
        tag: "v1.3.0",
        recursive: false,
        patch: None,
    },
    ExternalDependency {
        name: "c-blosc",
        url: "https://github.com/Blosc/c-blosc.git",
        tag: "v1.21.4",
        recursive: false,
        patch: None,
    },
    ExternalDependency {
        name: "glm",
        url: "https://github.com/g-truc/glm.git",
        tag: "1.0.1",
        recursive: false,
        patch: None,
    },
];

/// A prebuilt third-party distribution (headers + static libraries)
/// fetched as a gzip-compressed tar archive rather than built from source.
#[derive(Debug, Clone, Copy)]
pub struct BinaryPackagePin {
    /// Extraction directory name under `external/`
    pub name: &'static str,
    /// Download URL
    pub url: &'static str,
    /// Archive filename under `external/`
    pub archive_name: &'static str,
    /// Pinned SHA-256 of the archive, hex-encoded
    pub sha256: &'static str,
}

/// The cudnn distribution required when the device toolkit is version 12
/// or newer.
pub const CUDNN_PACKAGE: BinaryPackagePin = BinaryPackagePin {
    name: "cudnn",
    url: "https://developer.download.nvidia.com/compute/cudnn/redist/cudnn/\
          linux-x86_64/cudnn-linux-x86_64-9.1.0.70_cuda12-archive.tar.gz",
    archive_name: "cudnn.tar.gz",
    sha256: "2f5e0d5c08c85bbee945ec626884e6eba62ffe9464f2a19a5d9caebbf1e81746",
};

/// Read the packaged module version from the package metadata file.
///
/// Looks for a `__version__ = "…"` line in `voxgrid/__init__.py` under the
/// project root, falling back to `0.0.0` when the file or the line is
/// absent.
#[must_use]
pub fn retrieve_version(project_root: &Path) -> String {
    let metadata = project_root.join(PACKAGE_NAME).join("__init__.py");
    let Ok(content) = std::fs::read_to_string(&metadata) else {
        return "0.0.0".to_string();
    };

    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=')
            && key.trim() == "__version__"
        {
            return value.trim().trim_matches(['\'', '"']).to_string();
        }
    }

    "0.0.0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn version_is_read_from_package_metadata() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let pkg = temp.path().join(PACKAGE_NAME);
        fs::create_dir_all(&pkg)?;
        fs::write(
            pkg.join("__init__.py"),
            "from ._vx import GridBatch\n__version__ = \"0.4.1\"\n",
        )?;

        assert_eq!(retrieve_version(temp.path()), "0.4.1");
        Ok(())
    }

    #[test]
    fn version_accepts_single_quotes() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let pkg = temp.path().join(PACKAGE_NAME);
        fs::create_dir_all(&pkg)?;
        fs::write(pkg.join("__init__.py"), "__version__ = '1.2.3'\n")?;

        assert_eq!(retrieve_version(temp.path()), "1.2.3");
        Ok(())
    }

    #[test]
    fn version_defaults_when_metadata_missing() {
        let temp = TempDir::new().unwrap();
        assert_eq!(retrieve_version(temp.path()), "0.0.0");
    }

    #[test]
    fn dependency_pins_are_consistent() {
        // Only cutlass carries a patch, and every pin has a tag
        for dep in &EXTERNAL_DEPENDENCIES {
            assert!(!dep.tag.is_empty(), "{} has no pinned tag", dep.name);
            if dep.name != "cutlass" {
                assert!(dep.patch.is_none());
            }
        }
        assert_eq!(CUDNN_PACKAGE.sha256.len(), 64);
    }
}
