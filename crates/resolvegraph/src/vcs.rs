// moon: The build system and package manager for MoonBit.
// Copyright (C) 2024 International Digital Economy Academy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// For inquiries, you can contact us via e-mail at jichuruanjian@idea.edu.cn.

//! Components sourced from version control.
//!
//! A [`VersionControlSystem`] knows how to list the versions of a remote
//! repository and how to check one out. [`VersionControlRepository`] adds a
//! shared on-disk cache on top of it: every checkout lives in its own
//! directory, `<cache>/<repository id>/<canonical id>`, and concurrent
//! processes serialize on a file lock in the cache root.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use resolveutil::common::FileLock;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

pub mod git;

pub use git::GitVersionControlSystem;

/// Name of the lock file guarding the checkout cache.
const CACHE_LOCK: &str = "vcs";
/// Written once a checkout is complete. Directories without it are redone.
const COMPLETE_MARKER: &str = ".resolve-complete";

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("invalid repository url '{url}'")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("could not list versions of {spec}")]
    ListVersions {
        spec: String,
        source: std::io::Error,
    },
    #[error("could not populate working directory for {spec}")]
    Populate {
        spec: String,
        source: std::io::Error,
    },
}

/// Where a version-controlled component comes from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionControlSpec {
    pub url: Url,
    /// Directory inside the repository holding the component, if not the
    /// repository root.
    pub root_dir: Option<String>,
}

impl VersionControlSpec {
    pub fn git(url: &str) -> Result<Self, VcsError> {
        let url = Url::parse(url).map_err(|source| VcsError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        Ok(VersionControlSpec {
            url,
            root_dir: None,
        })
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<String>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    pub fn display_name(&self) -> String {
        format!("Git Repository at {}", self.url)
    }

    /// A file name safe id, stable for a given url.
    pub fn unique_id(&self) -> String {
        let ident = self
            .url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or("")
            .trim_end_matches(".git");
        let digest = Sha256::digest(self.url.as_str().as_bytes());
        let hash = digest
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        if ident.is_empty() {
            hash
        } else {
            format!("{ident}-{hash}")
        }
    }
}

impl std::fmt::Display for VersionControlSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A named revision of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionRef {
    /// Branch or tag name.
    pub version: String,
    /// The commit the name points to.
    pub canonical_id: String,
}

pub trait VersionControlSystem {
    fn default_branch(&self, spec: &VersionControlSpec) -> std::io::Result<VersionRef>;

    fn branch(&self, spec: &VersionControlSpec, name: &str) -> std::io::Result<Option<VersionRef>>;

    /// Every tagged version of the repository.
    fn available_versions(&self, spec: &VersionControlSpec) -> std::io::Result<BTreeSet<VersionRef>>;

    /// Checks `version` out into `dir`, which exists and may hold a previous
    /// partial attempt.
    fn populate(&self, dir: &Path, version: &VersionRef, spec: &VersionControlSpec) -> std::io::Result<()>;
}

impl<V: VersionControlSystem + ?Sized> VersionControlSystem for &V {
    fn default_branch(&self, spec: &VersionControlSpec) -> std::io::Result<VersionRef> {
        (**self).default_branch(spec)
    }

    fn branch(&self, spec: &VersionControlSpec, name: &str) -> std::io::Result<Option<VersionRef>> {
        (**self).branch(spec, name)
    }

    fn available_versions(&self, spec: &VersionControlSpec) -> std::io::Result<BTreeSet<VersionRef>> {
        (**self).available_versions(spec)
    }

    fn populate(&self, dir: &Path, version: &VersionRef, spec: &VersionControlSpec) -> std::io::Result<()> {
        (**self).populate(dir, version, spec)
    }
}

/// A version control system with a shared checkout cache.
pub struct VersionControlRepository<V> {
    vcs: V,
    cache_dir: PathBuf,
}

impl<V: VersionControlSystem> VersionControlRepository<V> {
    pub fn new(vcs: V, cache_dir: impl Into<PathBuf>) -> Self {
        VersionControlRepository {
            vcs,
            cache_dir: cache_dir.into(),
        }
    }

    /// Uses the cache under the resolver home directory.
    pub fn with_default_cache(vcs: V) -> anyhow::Result<Self> {
        Ok(Self::new(vcs, resolveutil::dirs::vcs_cache()?))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn list_error(spec: &VersionControlSpec) -> impl FnOnce(std::io::Error) -> VcsError + '_ {
        move |source| VcsError::ListVersions {
            spec: spec.display_name(),
            source,
        }
    }

    pub fn default_branch(&self, spec: &VersionControlSpec) -> Result<VersionRef, VcsError> {
        self.vcs.default_branch(spec).map_err(Self::list_error(spec))
    }

    pub fn branch(&self, spec: &VersionControlSpec, name: &str) -> Result<Option<VersionRef>, VcsError> {
        self.vcs.branch(spec, name).map_err(Self::list_error(spec))
    }

    pub fn available_versions(&self, spec: &VersionControlSpec) -> Result<BTreeSet<VersionRef>, VcsError> {
        self.vcs
            .available_versions(spec)
            .map_err(Self::list_error(spec))
    }

    pub fn working_dir(&self, spec: &VersionControlSpec, version: &VersionRef) -> PathBuf {
        self.cache_dir
            .join(spec.unique_id())
            .join(&version.canonical_id)
    }

    /// Makes sure `version` is checked out in the cache and returns the
    /// directory holding the component.
    pub fn populate(&self, spec: &VersionControlSpec, version: &VersionRef) -> Result<PathBuf, VcsError> {
        let wrap = |source| VcsError::Populate {
            spec: spec.display_name(),
            source,
        };
        let _lock = FileLock::lock(&self.cache_dir, CACHE_LOCK).map_err(wrap)?;

        let dir = self.working_dir(spec, version);
        if dir.join(COMPLETE_MARKER).exists() {
            log::debug!("Reusing checkout of {} at {}", version.version, dir.display());
        } else {
            log::info!("Checking out {} of {}", version.version, spec);
            self.checkout(&dir, spec, version).map_err(wrap)?;
        }

        Ok(match &spec.root_dir {
            Some(root) => dir.join(root),
            None => dir,
        })
    }

    fn checkout(&self, dir: &Path, spec: &VersionControlSpec, version: &VersionRef) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        if let Err(e) = self.vcs.populate(dir, version, spec) {
            if let Err(cleanup) = std::fs::remove_dir_all(dir) {
                log::warn!("failed to clean up {}: {}", dir.display(), cleanup);
            }
            return Err(e);
        }
        std::fs::write(dir.join(COMPLETE_MARKER), &version.canonical_id)
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use test_log::test;

    use super::*;

    /// Writes one file per checkout and fails for versions named `broken`.
    #[derive(Default)]
    struct FakeVcs {
        populated: RefCell<Vec<String>>,
    }

    impl VersionControlSystem for FakeVcs {
        fn default_branch(&self, _spec: &VersionControlSpec) -> std::io::Result<VersionRef> {
            Ok(version("main", "c0ffee"))
        }

        fn branch(&self, _spec: &VersionControlSpec, name: &str) -> std::io::Result<Option<VersionRef>> {
            Ok((name == "main").then(|| version("main", "c0ffee")))
        }

        fn available_versions(&self, _spec: &VersionControlSpec) -> std::io::Result<BTreeSet<VersionRef>> {
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection timed out",
            ))
        }

        fn populate(&self, dir: &Path, version: &VersionRef, _spec: &VersionControlSpec) -> std::io::Result<()> {
            self.populated.borrow_mut().push(version.version.clone());
            std::fs::create_dir_all(dir.join("lib"))?;
            std::fs::write(dir.join("lib").join("README"), &version.version)?;
            if version.version == "broken" {
                return Err(std::io::Error::other("checkout failed"));
            }
            Ok(())
        }
    }

    fn version(name: &str, id: &str) -> VersionRef {
        VersionRef {
            version: name.into(),
            canonical_id: id.into(),
        }
    }

    #[test]
    fn unique_id_is_stable_and_path_safe() {
        let spec = VersionControlSpec::git("https://example.com/org/lib.git").unwrap();
        let id = spec.unique_id();
        assert!(id.starts_with("lib-"));
        assert_eq!(id.len(), "lib-".len() + 16);
        assert_eq!(id, spec.clone().with_root_dir("sub").unique_id());
        assert_ne!(
            id,
            VersionControlSpec::git("https://example.com/other/lib.git")
                .unwrap()
                .unique_id()
        );
        assert_eq!(
            spec.display_name(),
            "Git Repository at https://example.com/org/lib.git"
        );
        assert!(VersionControlSpec::git("not a url").is_err());
    }

    #[test]
    fn populate_reuses_complete_checkouts() {
        let cache = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::default();
        let repo = VersionControlRepository::new(&vcs, cache.path());
        let spec = VersionControlSpec::git("https://example.com/org/lib.git")
            .unwrap()
            .with_root_dir("lib");
        let main = repo.default_branch(&spec).unwrap();

        let dir = repo.populate(&spec, &main).unwrap();
        assert_eq!(dir, cache.path().join(spec.unique_id()).join("c0ffee").join("lib"));
        assert_eq!(std::fs::read_to_string(dir.join("README")).unwrap(), "main");

        repo.populate(&spec, &main).unwrap();
        assert_eq!(*vcs.populated.borrow(), vec!["main"]);
    }

    #[test]
    fn populate_failures_are_wrapped_and_cleaned_up() {
        let cache = tempfile::tempdir().unwrap();
        let vcs = FakeVcs::default();
        let repo = VersionControlRepository::new(&vcs, cache.path());
        let spec = VersionControlSpec::git("https://example.com/org/lib.git").unwrap();
        let broken = version("broken", "dead");

        let err = repo.populate(&spec, &broken).unwrap_err();
        expect_test::expect!["could not populate working directory for Git Repository at https://example.com/org/lib.git"]
            .assert_eq(&err.to_string());
        assert!(!repo.working_dir(&spec, &broken).exists());

        repo.populate(&spec, &broken).unwrap_err();
        assert_eq!(vcs.populated.borrow().len(), 2);
    }

    #[test]
    fn listing_failures_keep_their_cause() {
        let cache = tempfile::tempdir().unwrap();
        let repo = VersionControlRepository::new(FakeVcs::default(), cache.path());
        let spec = VersionControlSpec::git("https://example.com/org/lib.git").unwrap();
        assert_eq!(repo.branch(&spec, "dev").unwrap(), None);

        let err = repo.available_versions(&spec).unwrap_err();
        assert!(crate::failure::is_critical_failure(&err));
    }
}
