//! Build pipeline
//!
//! Linear, named-stage orchestration of a voxgrid build. Ordering is a
//! structural property of [`BuildPipeline::run`]: each stage's output is
//! threaded into the next, so the fetch/build/compile/reconcile sequence
//! cannot drift apart from call-order convention. No two stages run
//! concurrently; the only parallelism is the job count handed to the
//! nested build tool and to the compilers themselves.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cmake::CmakeBuilder;
use crate::config::BuildConfig;
use crate::extension::{ExtensionCompiler, ModuleSpec, Visibility, collect_sources};
use crate::fetch::DependencyFetcher;
use crate::manifest;
use crate::package::{PackageAcquirer, PackageContents};
use crate::patch::{PatchOutcome, apply_patch};
use crate::paths;
use crate::reconcile;
use crate::toolchain;

/// Configure-time definitions for the nested c-blosc build: a static,
/// position-independent library and nothing else.
const BLOSC_DEFINES: [&str; 5] = [
    "-DBUILD_SHARED=OFF",
    "-DBUILD_TESTS=OFF",
    "-DBUILD_FUZZERS=OFF",
    "-DBUILD_BENCHMARKS=OFF",
    "-DCMAKE_POSITION_INDEPENDENT_CODE=ON",
];

/// Sequential build orchestration, from toolchain gating to artifact
/// reconciliation.
#[derive(Debug)]
pub struct BuildPipeline {
    config: BuildConfig,
}

impl BuildPipeline {
    #[must_use]
    pub const fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; nothing is retried.
    pub async fn run(&self) -> Result<()> {
        self.announce("Selecting toolchain");
        let profile = toolchain::select(&self.config)?;

        self.announce("Fetching external dependencies");
        self.fetch_dependencies()?;

        self.announce("Building native dependencies");
        let blosc_install = self.build_native_dependencies()?;

        let package = if profile.needs_cudnn_package {
            self.announce("Acquiring cudnn binary package");
            let acquirer = PackageAcquirer::new(self.config.external_root(), self.config.quiet());
            Some(acquirer.ensure(&manifest::CUDNN_PACKAGE).await?)
        } else {
            if self.config.verbose() {
                println!("Toolkit below version 12, skipping cudnn acquisition");
            }
            None
        };

        self.announce("Compiling extension modules");
        self.compile_modules(&profile, &blosc_install, package.as_ref())?;

        self.announce("Reconciling artifacts");
        reconcile::reconcile(&self.config)?;

        Ok(())
    }

    /// Acquire every pinned source dependency and apply its optional
    /// compatibility patch. Also used standalone by `gridforge fetch`.
    ///
    /// # Errors
    ///
    /// Returns an error on fetch or checkout failure; a failing patch is
    /// logged and the build continues without it.
    pub fn fetch_dependencies(&self) -> Result<()> {
        let external_root = paths::ensure_external_dir(self.config.project_root())?;
        let fetcher = DependencyFetcher::new(external_root, self.config.quiet());

        // A sibling engine checkout means voxgrid builds as part of a
        // larger parent build and the engine repo is not fetched.
        if !paths::has_sibling_engine(self.config.project_root()) {
            fetcher.acquire(&manifest::GRID_ENGINE_REPO)?;
        }

        for dep in &manifest::EXTERNAL_DEPENDENCIES {
            let checkout = fetcher.acquire(dep)?;

            if let Some(patch_rel) = dep.patch {
                let patch_path = self.config.project_root().join(patch_rel);
                match apply_patch(&checkout, &patch_path)? {
                    PatchOutcome::Applied => {
                        if self.config.verbose() {
                            println!("Applied {} to {}", patch_path.display(), dep.name);
                        }
                    }
                    PatchOutcome::Skipped { reason } => {
                        println!(
                            "Failed to apply {} to {}: {reason}, continuing without patching",
                            patch_path.display(),
                            dep.name
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Build the dependencies that need their own native build, and
    /// return the c-blosc install tree.
    fn build_native_dependencies(&self) -> Result<PathBuf> {
        let builder = CmakeBuilder::new(self.config.jobs(), self.config.verbose())?;
        let blosc_source = self.config.external_root().join("c-blosc");
        builder
            .build(&blosc_source, &BLOSC_DEFINES)
            .context("Nested c-blosc build failed")
    }

    /// Compile the primary library, canonicalize it so the binding
    /// module can link against it by name, then compile the binding
    /// module.
    fn compile_modules(
        &self,
        profile: &toolchain::ToolchainProfile,
        blosc_install: &Path,
        package: Option<&PackageContents>,
    ) -> Result<()> {
        let compiler = ExtensionCompiler::new(&self.config, profile);

        compiler.compile(&self.primary_module_spec(blosc_install, package))?;
        reconcile::canonicalize(&self.config)?;
        compiler.compile(&self.binding_module_spec(blosc_install))?;

        Ok(())
    }

    /// Include directories both modules compile against.
    fn shared_include_dirs(&self, blosc_install: &Path) -> Vec<PathBuf> {
        let external = self.config.external_root();
        vec![
            self.config.primary_source_dir(),
            self.config.grid_engine_dir(),
            external.join("cutlass").join("include"),
            blosc_install.join("include"),
            external.join("glm"),
        ]
    }

    fn primary_module_spec(
        &self,
        blosc_install: &Path,
        package: Option<&PackageContents>,
    ) -> ModuleSpec {
        let mut include_dirs = self.shared_include_dirs(blosc_install);
        include_dirs.push(self.config.external_root().join("cudnn_fe").join("include"));

        let mut extra_objects = vec![blosc_install.join("lib").join("libblosc.a")];
        if let Some(contents) = package {
            include_dirs.extend(contents.include_dirs.iter().cloned());
            extra_objects.extend(contents.static_libs.iter().cloned());
        }

        ModuleSpec {
            name: manifest::PRIMARY_MODULE.to_string(),
            sources: collect_sources(&self.config.primary_source_dir(), false),
            include_dirs,
            library_dirs: vec![],
            libraries: vec![],
            extra_objects,
            link_args: vec![],
            visibility: Visibility::Default,
        }
    }

    fn binding_module_spec(&self, blosc_install: &Path) -> ModuleSpec {
        ModuleSpec {
            name: manifest::BINDING_MODULE.to_string(),
            sources: collect_sources(&self.config.bindings_source_dir(), true),
            include_dirs: self.shared_include_dirs(blosc_install),
            library_dirs: vec![self.config.staged_package_dir()],
            libraries: vec![manifest::PRIMARY_LINK_NAME.to_string()],
            extra_objects: vec![],
            // The shared library is resolved next to the module at
            // runtime
            link_args: vec!["-Wl,-rpath,$ORIGIN".to_string()],
            visibility: Visibility::Hidden,
        }
    }

    fn announce(&self, stage: &str) {
        if !self.config.quiet() {
            println!("{stage}...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_pipeline(inplace: bool) -> (TempDir, BuildPipeline) {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::from_env(temp.path().to_path_buf(), inplace, Some(2), false, true);
        (temp, BuildPipeline::new(config))
    }

    #[test]
    fn primary_module_compiles_with_default_visibility() {
        let (_temp, pipeline) = test_pipeline(false);
        let blosc = pipeline.config().external_root().join("c-blosc/install");

        let spec = pipeline.primary_module_spec(&blosc, None);
        assert_eq!(spec.name, manifest::PRIMARY_MODULE);
        assert_eq!(spec.visibility, Visibility::Default);
        assert!(spec.libraries.is_empty());
        assert!(
            spec.extra_objects
                .iter()
                .any(|p| p.ends_with("lib/libblosc.a"))
        );
        assert!(
            spec.include_dirs
                .iter()
                .any(|p| p.ends_with("cutlass/include"))
        );
        assert!(
            spec.include_dirs
                .iter()
                .any(|p| p.ends_with("cudnn_fe/include"))
        );
    }

    #[test]
    fn binary_package_contents_feed_the_primary_module() {
        let (_temp, pipeline) = test_pipeline(false);
        let blosc = pipeline.config().external_root().join("c-blosc/install");

        let contents = PackageContents {
            include_dirs: vec![std::path::PathBuf::from("/x/cudnn/include")],
            static_libs: vec![std::path::PathBuf::from("/x/cudnn/lib/libcudnn_static.a")],
        };
        let spec = pipeline.primary_module_spec(&blosc, Some(&contents));

        assert!(
            spec.include_dirs
                .contains(&std::path::PathBuf::from("/x/cudnn/include"))
        );
        assert!(
            spec.extra_objects
                .contains(&std::path::PathBuf::from("/x/cudnn/lib/libcudnn_static.a"))
        );
    }

    #[test]
    fn binding_module_links_the_primary_library_by_name() {
        let (_temp, pipeline) = test_pipeline(false);
        let blosc = pipeline.config().external_root().join("c-blosc/install");

        let spec = pipeline.binding_module_spec(&blosc);
        assert_eq!(spec.name, manifest::BINDING_MODULE);
        assert_eq!(spec.visibility, Visibility::Hidden);
        assert_eq!(spec.libraries, vec![manifest::PRIMARY_LINK_NAME.to_string()]);
        assert!(
            spec.library_dirs
                .contains(&pipeline.config().staged_package_dir())
        );
        assert!(spec.link_args.contains(&"-Wl,-rpath,$ORIGIN".to_string()));
        // The binding layer does not see the cudnn frontend headers
        assert!(
            !spec
                .include_dirs
                .iter()
                .any(|p| p.ends_with("cudnn_fe/include"))
        );
    }

    #[test]
    fn blosc_is_configured_static_and_position_independent() {
        assert!(BLOSC_DEFINES.contains(&"-DBUILD_SHARED=OFF"));
        assert!(BLOSC_DEFINES.contains(&"-DCMAKE_POSITION_INDEPENDENT_CODE=ON"));
    }
}
