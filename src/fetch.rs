//! Pinned dependency fetching
//!
//! Clones or updates the external source repositories voxgrid builds
//! against. Each dependency lives under `external/<name>` as a working
//! copy at a pinned tag; re-invocation checks the tag out in place
//! instead of re-cloning.

use git2::{AutotagOption, FetchOptions, ObjectType, Repository, build::CheckoutBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::manifest::ExternalDependency;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("A path {path} exists but is not a git repository")]
    NotARepository { path: String },

    #[error("Failed to clone {url}: {source}")]
    CloneError {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to checkout {tag} in {name}: {source}")]
    CheckoutError {
        name: String,
        tag: String,
        #[source]
        source: git2::Error,
    },
}

/// Fetches pinned dependencies into an `external/` root.
#[derive(Debug)]
pub struct DependencyFetcher {
    external_root: PathBuf,
    quiet: bool,
}

impl DependencyFetcher {
    #[must_use]
    pub const fn new(external_root: PathBuf, quiet: bool) -> Self {
        Self {
            external_root,
            quiet,
        }
    }

    /// Clone a dependency if absent, then check out its pinned tag.
    ///
    /// An existing working copy is reused: the tag is checked out in
    /// place, resolving locally first and fetching from origin only when
    /// the tag is not yet a local object. An existing path that is not a
    /// repository is rejected without being modified.
    ///
    /// Returns the local checkout path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is occupied by a non-repository, or
    /// if cloning or checkout fails.
    pub fn acquire(&self, dep: &ExternalDependency) -> Result<PathBuf, FetchError> {
        let repo_path = self.external_root.join(dep.name);

        let repo = if repo_path.exists() {
            Repository::open(&repo_path).map_err(|_| FetchError::NotARepository {
                path: repo_path.display().to_string(),
            })?
        } else {
            if !self.quiet {
                println!("Cloning {}:{} into {}", dep.url, dep.tag, repo_path.display());
            }
            let clone_result = if dep.recursive {
                Repository::clone_recurse(dep.url, &repo_path)
            } else {
                Repository::clone(dep.url, &repo_path)
            };
            clone_result.map_err(|e| FetchError::CloneError {
                url: dep.url.to_string(),
                source: e,
            })?
        };

        self.checkout_tag(&repo, dep)?;

        Ok(repo_path)
    }

    /// Check out the pinned tag, fetching from origin only when the tag
    /// cannot be resolved locally.
    fn checkout_tag(&self, repo: &Repository, dep: &ExternalDependency) -> Result<(), FetchError> {
        let object = match repo.revparse_single(dep.tag) {
            Ok(object) => object,
            Err(_) => {
                self.fetch_origin(repo, dep)?;
                repo.revparse_single(dep.tag)
                    .map_err(|e| self.checkout_error(dep, e))?
            }
        };

        let commit = object
            .peel(ObjectType::Commit)
            .map_err(|e| self.checkout_error(dep, e))?;

        repo.checkout_tree(&commit, Some(CheckoutBuilder::new().force()))
            .map_err(|e| self.checkout_error(dep, e))?;

        repo.set_head_detached(commit.id())
            .map_err(|e| self.checkout_error(dep, e))?;

        Ok(())
    }

    fn fetch_origin(&self, repo: &Repository, dep: &ExternalDependency) -> Result<(), FetchError> {
        let mut remote = repo
            .find_remote("origin")
            .or_else(|_| repo.remote_anonymous(dep.url))
            .map_err(|e| FetchError::CloneError {
                url: dep.url.to_string(),
                source: e,
            })?;

        let mut options = FetchOptions::new();
        options.download_tags(AutotagOption::All);

        remote
            .fetch(
                &["refs/heads/*:refs/remotes/origin/*"],
                Some(&mut options),
                None,
            )
            .map_err(|e| FetchError::CloneError {
                url: dep.url.to_string(),
                source: e,
            })
    }

    fn checkout_error(&self, dep: &ExternalDependency, source: git2::Error) -> FetchError {
        FetchError::CheckoutError {
            name: dep.name.to_string(),
            tag: dep.tag.to_string(),
            source,
        }
    }

    /// Get the external root path
    #[must_use]
    pub fn external_root(&self) -> &Path {
        &self.external_root
    }
}
