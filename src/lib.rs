//! Gridforge internal library code
//!
//! Build orchestrator for the voxgrid native extension module: fetches
//! pinned external sources, runs nested native builds, acquires the
//! prebuilt cudnn package when the toolchain calls for it, compiles the
//! primary library and binding modules, and reconciles the artifacts
//! into the staged and in-place layouts.

pub mod cmake;
pub mod config;
pub mod env_vars;
pub mod extension;
pub mod fetch;
pub mod manifest;
pub mod package;
pub mod patch;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod toolchain;

// Re-export common types for convenience
pub use cmake::CmakeBuilder;
pub use config::BuildConfig;
pub use extension::{ExtensionCompiler, ModuleSpec, Visibility, collect_sources};
pub use fetch::{DependencyFetcher, FetchError};
pub use manifest::{BinaryPackagePin, ExternalDependency, retrieve_version};
pub use package::{PackageAcquirer, PackageContents, PackageError};
pub use patch::{PatchOutcome, apply_patch};
pub use pipeline::BuildPipeline;
pub use reconcile::ReconcileError;
pub use toolchain::{ToolchainError, ToolchainProfile};
