//! Prebuilt binary package acquisition
//!
//! Downloads, verifies, and extracts the pinned cudnn distribution when
//! the toolchain requires it. Every step is independently skippable if
//! already satisfied: the archive is re-downloaded only if absent, the
//! checksum gate runs on every invocation, and extraction is skipped when
//! the target directory already exists.

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::manifest::BinaryPackagePin;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("HTTP {status} error downloading {url}")]
    HttpError { url: String, status: u16 },

    #[error("Network error downloading {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Received {received} bytes but the server declared {declared} for {url}")]
    SizeMismatch {
        url: String,
        declared: u64,
        received: u64,
    },

    #[error("Checksum mismatch for {path}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        computed: String,
    },

    #[error("Could not find an include directory and static libraries under {dir}")]
    IncompleteLayout { dir: String },

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PackageError {
    /// Wrap an IO error with path context for use in `map_err`
    fn wrap_io(path: impl Into<String>) -> impl Fn(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::IoError {
            path: path.clone(),
            source,
        }
    }

    /// Wrap a network error with URL context for use in `map_err`
    fn wrap_network(url: impl Into<String>) -> impl Fn(reqwest::Error) -> Self {
        let url = url.into();
        move |source| Self::NetworkError {
            url: url.clone(),
            source,
        }
    }
}

/// Include directories and static libraries discovered in an extracted
/// binary package.
#[derive(Debug, Clone)]
pub struct PackageContents {
    pub include_dirs: Vec<PathBuf>,
    pub static_libs: Vec<PathBuf>,
}

/// Acquires prebuilt binary packages into the `external/` root.
#[derive(Debug)]
pub struct PackageAcquirer {
    external_root: PathBuf,
    quiet: bool,
}

impl PackageAcquirer {
    #[must_use]
    pub const fn new(external_root: PathBuf, quiet: bool) -> Self {
        Self {
            external_root,
            quiet,
        }
    }

    /// Make a pinned binary package available and return its contents.
    ///
    /// Downloads the archive if absent (failing when the received byte
    /// count does not match the declared transfer size), verifies the
    /// pinned SHA-256 before the archive is trusted, extracts once, and
    /// walks the extracted tree for include/library directories.
    ///
    /// # Errors
    ///
    /// Returns an error on download, integrity, extraction, or layout
    /// discovery failure. Integrity failures abort before extraction.
    pub async fn ensure(&self, pin: &BinaryPackagePin) -> Result<PackageContents, PackageError> {
        let archive = self.external_root.join(pin.archive_name);
        let extract_dir = self.external_root.join(pin.name);

        if !archive.exists() {
            self.download(pin, &archive).await?;
        }

        verify_checksum(&archive, pin.sha256)?;

        if !extract_dir.exists() {
            if !self.quiet {
                println!("Extracting {} to {}", pin.name, extract_dir.display());
            }
            extract_archive(&archive, &extract_dir)?;
        }

        discover_contents(&extract_dir)
    }

    /// Stream the archive to a temporary file, counting received bytes
    /// against the declared content length, then persist atomically.
    async fn download(&self, pin: &BinaryPackagePin, archive: &Path) -> Result<(), PackageError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("gridforge/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PackageError::wrap_network(pin.url))?;

        let response = client
            .get(pin.url)
            .send()
            .await
            .map_err(PackageError::wrap_network(pin.url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackageError::HttpError {
                url: pin.url.to_string(),
                status: status.as_u16(),
            });
        }

        let declared = response.content_length().unwrap_or(0);
        let progress = if self.quiet || declared == 0 {
            None
        } else {
            let bar = ProgressBar::new(declared);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            bar.set_message(format!("Downloading {}", pin.name));
            Some(bar)
        };

        let archive_display = archive.display().to_string();
        let temp_file = tempfile::NamedTempFile::new_in(&self.external_root)
            .map_err(PackageError::wrap_io(archive_display.as_str()))?;

        let mut received: u64 = 0;
        {
            let file_std = temp_file
                .as_file()
                .try_clone()
                .map_err(PackageError::wrap_io(archive_display.as_str()))?;
            let mut file = tokio::fs::File::from_std(file_std);

            let mut stream = response.bytes_stream();
            while let Some(chunk_result) = stream.next().await {
                let chunk = chunk_result.map_err(PackageError::wrap_network(pin.url))?;
                received += chunk.len() as u64;
                if let Some(bar) = &progress {
                    bar.inc(chunk.len() as u64);
                }
                file.write_all(&chunk)
                    .await
                    .map_err(PackageError::wrap_io(archive_display.as_str()))?;
            }

            file.flush()
                .await
                .map_err(PackageError::wrap_io(archive_display.as_str()))?;
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        // The temporary file is dropped (and removed) on this error
        // path, so a short transfer never leaves a reusable archive.
        if declared != 0 && received != declared {
            return Err(PackageError::SizeMismatch {
                url: pin.url.to_string(),
                declared,
                received,
            });
        }

        temp_file
            .persist(archive)
            .map_err(|e| PackageError::IoError {
                path: archive_display,
                source: e.error,
            })?;

        Ok(())
    }
}

/// Compute the SHA-256 checksum of a file, hex-encoded.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_checksum(path: &Path) -> Result<String, PackageError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(PackageError::wrap_io(path.display().to_string()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let count = file
            .read(&mut buffer)
            .map_err(PackageError::wrap_io(path.display().to_string()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    let result = hasher.finalize();
    Ok(format!("{result:x}"))
}

/// Verify a file against a pinned hex-encoded SHA-256 digest.
///
/// # Errors
///
/// Returns `ChecksumMismatch` when the computed digest differs.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), PackageError> {
    let computed = compute_checksum(path)?;
    if computed == expected.to_lowercase() {
        Ok(())
    } else {
        Err(PackageError::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            computed,
        })
    }
}

/// Decompress a gzip tar archive into `dir`.
fn extract_archive(archive: &Path, dir: &Path) -> Result<(), PackageError> {
    std::fs::create_dir_all(dir).map_err(PackageError::wrap_io(dir.display().to_string()))?;

    let file =
        std::fs::File::open(archive).map_err(PackageError::wrap_io(archive.display().to_string()))?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(dir)
        .map_err(PackageError::wrap_io(dir.display().to_string()))
}

/// Walk an extracted package tree for the first directory containing
/// `include` and every static library beneath a `lib` directory.
///
/// Symbolic links are filtered from the library list: they alias
/// ABI-tagged names of the same file and must not become duplicate link
/// inputs.
///
/// # Errors
///
/// Returns `IncompleteLayout` when no include directory or no static
/// libraries are found.
pub fn discover_contents(dir: &Path) -> Result<PackageContents, PackageError> {
    let mut include_dir: Option<PathBuf> = None;
    let mut static_libs = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| PackageError::IoError {
            path: dir.display().to_string(),
            source: e.into(),
        })?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            if include_dir.is_none() && path.to_string_lossy().contains("include") {
                include_dir = Some(path.to_path_buf());
            }
        } else if path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(".a"))
            && path
                .parent()
                .is_some_and(|parent| parent.to_string_lossy().contains("lib"))
            && !entry.path_is_symlink()
        {
            static_libs.push(path.to_path_buf());
        }
    }

    match include_dir {
        Some(include) if !static_libs.is_empty() => Ok(PackageContents {
            include_dirs: vec![include],
            static_libs,
        }),
        _ => Err(PackageError::IncompleteLayout {
            dir: dir.display().to_string(),
        }),
    }
}
