//! Native module compilation
//!
//! Drives compilation of the two extension modules: the primary library
//! (default symbol visibility, exposes its surface for the binding layer
//! to link against) and the binding module (hidden visibility, links the
//! primary library by name with a co-located runtime search path).
//! Host sources go through the host C++ compiler, device sources through
//! the device compiler; both share the selected standard and flag sets.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::toolchain::ToolchainProfile;

/// Default-symbol-visibility mode for a compiled module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Symbols exported by default; used by the primary library
    Default,
    /// Symbols hidden by default; used by the binding module
    Hidden,
}

impl Visibility {
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Default => "-fvisibility=default",
            Self::Hidden => "-fvisibility=hidden",
        }
    }
}

/// Everything needed to compile and link one extension module.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    /// Module name; also the stem of the emitted shared library
    pub name: String,
    /// Host (`.cpp`) and device (`.cu`) translation units
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    /// Libraries linked by name (`-l<name>`)
    pub libraries: Vec<String>,
    /// Prebuilt objects/archives appended to the link line
    pub extra_objects: Vec<PathBuf>,
    /// Extra linker arguments (rpath etc.)
    pub link_args: Vec<String>,
    pub visibility: Visibility,
}

/// Platform-tagged artifact filename a module compiles to.
#[must_use]
pub fn module_artifact_name(module: &str) -> String {
    format!(
        "{module}.{}-{}.so",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Recursively gather `.cpp` and `.cu` translation units under `base`.
///
/// The `bindings/` subtree is excluded unless requested; the binding
/// module restricts its scope to that subtree by walking it directly.
#[must_use]
pub fn collect_sources(base: &Path, include_bindings: bool) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = WalkDir::new(base)
        .into_iter()
        .filter_entry(move |entry| {
            include_bindings || !(entry.file_type().is_dir() && entry.file_name() == "bindings")
        })
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == "cpp" || ext == "cu")
        })
        .map(|entry| entry.into_path())
        .collect();

    sources.sort();
    sources
}

/// Compiles module specs with the selected toolchain profile.
#[derive(Debug)]
pub struct ExtensionCompiler<'a> {
    config: &'a BuildConfig,
    profile: &'a ToolchainProfile,
}

impl<'a> ExtensionCompiler<'a> {
    #[must_use]
    pub const fn new(config: &'a BuildConfig, profile: &'a ToolchainProfile) -> Self {
        Self { config, profile }
    }

    /// Compile every translation unit of a module and link the shared
    /// library into the staged package directory.
    ///
    /// Returns the emitted artifact path.
    ///
    /// # Errors
    ///
    /// Returns an error if the module has no sources, or if any compile
    /// or link step fails.
    pub fn compile(&self, spec: &ModuleSpec) -> Result<PathBuf> {
        if spec.sources.is_empty() {
            bail!("No source files found for module {}", spec.name);
        }

        let out_dir = self.config.staged_package_dir();
        std::fs::create_dir_all(&out_dir).context("Failed to create staged package directory")?;

        let obj_dir = self.config.build_temp_dir().join(&spec.name);
        std::fs::create_dir_all(&obj_dir).context("Failed to create object directory")?;

        let mut objects = Vec::with_capacity(spec.sources.len());
        for (index, source) in spec.sources.iter().enumerate() {
            let stem = source
                .file_stem()
                .map_or_else(|| "unit".into(), |s| s.to_string_lossy().into_owned());
            // Index prefix keeps same-stem units from different
            // subdirectories apart
            let object = obj_dir.join(format!("{index:03}-{stem}.o"));
            self.compile_unit(spec, source, &object)?;
            objects.push(object);
        }

        let artifact = out_dir.join(module_artifact_name(&spec.name));
        self.link(spec, &objects, &artifact)?;
        Ok(artifact)
    }

    fn compile_unit(&self, spec: &ModuleSpec, source: &Path, object: &Path) -> Result<()> {
        let is_device = source.extension().is_some_and(|ext| ext == "cu");

        let mut cmd = if is_device {
            let mut cmd = Command::new(self.config.device_compiler());
            cmd.args(&self.profile.nvcc_flags);
            cmd.args(["-Xcompiler", "-fPIC", "-Xcompiler", spec.visibility.flag()]);
            if let Some(ccbin) = self.config.device_ccbin() {
                cmd.arg("-ccbin").arg(ccbin);
            }
            cmd
        } else {
            let mut cmd = Command::new(self.config.host_compiler());
            cmd.args(&self.profile.cxx_flags);
            cmd.arg("-fPIC").arg(spec.visibility.flag());
            cmd
        };

        for dir in &spec.include_dirs {
            cmd.arg("-I").arg(dir);
        }
        cmd.arg("-c").arg(source).arg("-o").arg(object);

        self.run_checked(cmd, &format!("compilation of {}", source.display()))
    }

    fn link(&self, spec: &ModuleSpec, objects: &[PathBuf], artifact: &Path) -> Result<()> {
        let mut cmd = Command::new(self.config.host_compiler());
        cmd.arg("-shared");
        cmd.args(objects);
        cmd.args(&spec.extra_objects);
        for dir in &spec.library_dirs {
            cmd.arg(format!("-L{}", dir.display()));
        }
        for lib in &spec.libraries {
            cmd.arg(format!("-l{lib}"));
        }
        cmd.args(&spec.link_args);
        cmd.arg("-o").arg(artifact);

        self.run_checked(cmd, &format!("linking of {}", spec.name))
    }

    fn run_checked(&self, mut cmd: Command, what: &str) -> Result<()> {
        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute {what}"))?;

        if self.config.verbose() {
            print!("{}", String::from_utf8_lossy(&output.stdout));
            eprint!("{}", String::from_utf8_lossy(&output.stderr));
        }

        if !output.status.success() {
            bail!(
                "{what} failed:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}
