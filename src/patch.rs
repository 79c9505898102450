//! Best-effort patch application
//!
//! Compatibility patches for third-party trees are applied once after
//! checkout. A patch that no longer applies (already applied, or the
//! upstream tree moved) must not abort the build, so failure is reported
//! as an explicit outcome the caller can log and tests can observe.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Result of attempting to apply a patch to a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The patch applied cleanly.
    Applied,
    /// The patch did not apply; the build continues without it.
    Skipped {
        /// Trimmed stderr of the failed apply
        reason: String,
    },
}

impl PatchOutcome {
    /// Check whether the patch landed.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Apply `patch_path` to the working copy at `checkout`.
///
/// A failing apply (non-zero exit) is the `Skipped` outcome, not an
/// error; only the inability to invoke `git` at all is an error.
///
/// # Errors
///
/// Returns an error if the `git` executable cannot be run.
pub fn apply_patch(checkout: &Path, patch_path: &Path) -> Result<PatchOutcome> {
    let output = Command::new("git")
        .arg("apply")
        .arg(patch_path)
        .current_dir(checkout)
        .output()
        .with_context(|| {
            format!(
                "Failed to invoke git apply for {} in {}",
                patch_path.display(),
                checkout.display()
            )
        })?;

    if output.status.success() {
        Ok(PatchOutcome::Applied)
    } else {
        let reason = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok(PatchOutcome::Skipped { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Patch tests shell out to git; skip quietly where it is absent.
    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn init_checkout(dir: &Path) -> anyhow::Result<()> {
        git2::Repository::init(dir)?;
        fs::write(dir.join("config.h"), "#define BLOCK_SIZE 128\n")?;
        Ok(())
    }

    const PATCH: &str = "\
--- a/config.h
+++ b/config.h
@@ -1 +1 @@
-#define BLOCK_SIZE 128
+#define BLOCK_SIZE 256
";

    #[test]
    fn patch_applies_once_then_skips() -> anyhow::Result<()> {
        if !git_available() {
            return Ok(());
        }

        let checkout = TempDir::new()?;
        init_checkout(checkout.path())?;
        let patch_file = checkout.path().join("fix.patch");
        fs::write(&patch_file, PATCH)?;

        let first = apply_patch(checkout.path(), &patch_file)?;
        assert!(first.is_applied());
        let content = fs::read_to_string(checkout.path().join("config.h"))?;
        assert!(content.contains("256"));

        // Re-application against the already-patched tree fails, which is
        // reported rather than raised.
        let second = apply_patch(checkout.path(), &patch_file)?;
        match second {
            PatchOutcome::Skipped { reason } => assert!(!reason.is_empty()),
            PatchOutcome::Applied => panic!("patch must not apply twice"),
        }
        Ok(())
    }

    #[test]
    fn mismatched_patch_is_skipped() -> anyhow::Result<()> {
        if !git_available() {
            return Ok(());
        }

        let checkout = TempDir::new()?;
        git2::Repository::init(checkout.path())?;
        fs::write(checkout.path().join("config.h"), "#define BLOCK_SIZE 64\n")?;
        let patch_file = checkout.path().join("fix.patch");
        fs::write(&patch_file, PATCH)?;

        let outcome = apply_patch(checkout.path(), &patch_file)?;
        assert!(!outcome.is_applied());

        // The tree is left as it was
        let content = fs::read_to_string(checkout.path().join("config.h"))?;
        assert!(content.contains("64"));
        Ok(())
    }
}
