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

use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, bail};
use resolveutil::{
    common::COMPONENT_JSON,
    identifier::{ModuleIdentifier, ModuleVersionIdentifier},
    version::compare_versions,
};

use super::{ComponentMetadata, ComponentRepository, RepositoryAccess, VersionListing};

/// A repository laid out on disk as
/// `<root>/<group>/<name>/<version>/component.json`.
///
/// Everything is local, so both access levels see the same content and
/// listings are authoritative.
pub struct FileRepository {
    name: String,
    root: PathBuf,
    cache: RefCell<HashMap<ModuleVersionIdentifier, Arc<ComponentMetadata>>>,
}

impl FileRepository {
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_owned());
        FileRepository {
            name: name.into(),
            root,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn flush_cache(&mut self) {
        self.cache.borrow_mut().clear();
    }

    fn module_dir(&self, module: &ModuleIdentifier) -> PathBuf {
        self.root.join(&module.group).join(&module.name)
    }

    fn component_file(&self, id: &ModuleVersionIdentifier) -> PathBuf {
        self.module_dir(&id.module)
            .join(&id.version)
            .join(COMPONENT_JSON)
    }

    /// Writes `metadata` into the repository, replacing any previous version.
    pub fn publish(&mut self, metadata: &ComponentMetadata) -> anyhow::Result<PathBuf> {
        let path = self.component_file(&metadata.id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json_lenient::to_string_pretty(metadata)?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.cache.borrow_mut().remove(&metadata.id);
        Ok(path)
    }
}

/// Renders a path the way locations are reported in failures.
pub fn location_of(path: &Path, is_dir: bool) -> String {
    let url = if is_dir {
        url::Url::from_directory_path(path)
    } else {
        url::Url::from_file_path(path)
    };
    match url {
        Ok(url) => url.to_string(),
        Err(()) => path.display().to_string(),
    }
}

impl ComponentRepository for FileRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_versions(
        &self,
        module: &ModuleIdentifier,
        _access: RepositoryAccess,
    ) -> anyhow::Result<Option<VersionListing>> {
        let dir = self.module_dir(module);
        let mut listing = VersionListing {
            versions: vec![],
            attempted: vec![location_of(&dir, true)],
            authoritative: true,
        };
        if !dir.is_dir() {
            return Ok(Some(listing));
        }
        log::debug!("Listing versions of {} in {}", module, dir.display());
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.path().join(COMPONENT_JSON).is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(version) => listing.versions.push(version),
                Err(name) => log::warn!("Skipping non UTF-8 version directory {:?}", name),
            }
        }
        listing.versions.sort_by(|a, b| compare_versions(a, b));
        Ok(Some(listing))
    }

    fn component_metadata(
        &self,
        id: &ModuleVersionIdentifier,
        _access: RepositoryAccess,
    ) -> anyhow::Result<Option<Arc<ComponentMetadata>>> {
        if let Some(m) = self.cache.borrow().get(id) {
            return Ok(Some(m.clone()));
        }
        let path = self.component_file(id);
        if !path.is_file() {
            return Ok(None);
        }
        log::debug!("Reading metadata of {} from {}", id, path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let metadata: ComponentMetadata = serde_json_lenient::from_str(&content)
            .with_context(|| format!("failed to parse {}", location_of(&path, false)))?;
        if metadata.id != *id {
            bail!(
                "{} declares {} instead of {}",
                location_of(&path, false),
                metadata.id,
                id
            );
        }
        let metadata = Arc::new(metadata);
        self.cache.borrow_mut().insert(id.clone(), metadata.clone());
        Ok(Some(metadata))
    }
}

#[cfg(test)]
mod test {
    use expect_test::expect;
    use resolveutil::attributes::AttributeSet;

    use super::*;
    use crate::repository::VariantMetadata;

    fn component(version: &str) -> ComponentMetadata {
        ComponentMetadata {
            id: ModuleVersionIdentifier::new("org.example", "lib", version),
            attributes: AttributeSet::empty(),
            variants: vec![VariantMetadata {
                name: "runtime".into(),
                attributes: AttributeSet::empty().with("usage", "runtime"),
                capabilities: vec![],
                dependencies: vec![],
                available_at: None,
            }],
        }
    }

    #[test]
    fn lists_and_reads_published_components() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = FileRepository::new("local", dir.path());
        for v in ["1.10", "1.2", "1.9.1"] {
            repo.publish(&component(v)).unwrap();
        }
        // a version directory without metadata is not a version
        std::fs::create_dir_all(repo.root().join("org.example/lib/2.0")).unwrap();

        let module = ModuleIdentifier::new("org.example", "lib");
        let listing = repo
            .list_versions(&module, RepositoryAccess::Local)
            .unwrap()
            .unwrap();
        expect![[r#"
            [
                "1.2",
                "1.9.1",
                "1.10",
            ]
        "#]]
        .assert_debug_eq(&listing.versions);
        assert!(listing.authoritative);
        assert!(listing.attempted[0].starts_with("file://"));

        let id = module.with_version("1.2");
        let metadata = repo
            .component_metadata(&id, RepositoryAccess::Remote)
            .unwrap()
            .unwrap();
        assert_eq!(*metadata, component("1.2"));
        assert!(
            repo.component_metadata(&module.with_version("2.0"), RepositoryAccess::Local)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn missing_module_is_an_empty_listing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new("local", dir.path());
        let listing = repo
            .list_versions(&ModuleIdentifier::new("org.example", "absent"), RepositoryAccess::Local)
            .unwrap()
            .unwrap();
        assert!(listing.versions.is_empty());
        assert!(listing.attempted[0].ends_with("/org.example/absent/"));
    }

    #[test]
    fn mismatched_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.example/lib/1.0");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(
            path.join(COMPONENT_JSON),
            r#"{ "id": "org.example:other:1.0", "variants": [] }"#,
        )
        .unwrap();
        let repo = FileRepository::new("local", dir.path());
        let err = repo
            .component_metadata(
                &ModuleVersionIdentifier::new("org.example", "lib", "1.0"),
                RepositoryAccess::Local,
            )
            .unwrap_err();
        assert!(err.to_string().contains("declares org.example:other:1.0 instead of org.example:lib:1.0"));
    }
}
