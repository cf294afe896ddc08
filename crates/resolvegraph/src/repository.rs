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

//! Sources of component metadata.

pub mod file;
#[cfg(test)]
pub mod mock;

use std::sync::Arc;

pub use file::*;
use resolveutil::{
    attributes::AttributeSet,
    capability::Capability,
    config::ResolveConfig,
    identifier::{ModuleIdentifier, ModuleVersionIdentifier, VersionConstraint},
};
use serde::{Deserialize, Serialize};

/// How far a repository may go to answer a query. Local access only looks
/// at what is already available without touching the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepositoryAccess {
    Local,
    Remote,
}

/// The versions a repository knows for a module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionListing {
    pub versions: Vec<String>,
    /// Locations that were searched, for error reporting.
    pub attempted: Vec<String>,
    /// An authoritative listing is complete: versions missing from it do not
    /// exist in this repository.
    pub authoritative: bool,
}

/// A dependency declared by a variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMetadata {
    pub module: ModuleIdentifier,
    #[serde(default)]
    pub version: VersionConstraint,
    /// Constraints only take part in version selection and never pull a
    /// module into the graph on their own.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub constraint: bool,
    #[serde(default, skip_serializing_if = "AttributeSet::is_empty")]
    pub attributes: AttributeSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantMetadata {
    pub name: String,
    #[serde(default)]
    pub attributes: AttributeSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyMetadata>,
    /// The variant is published by another module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_at: Option<ModuleVersionIdentifier>,
}

impl VariantMetadata {
    /// Declared capabilities, or the implicit capability of `owner`.
    pub fn capabilities_or_implicit(&self, owner: &ModuleVersionIdentifier) -> Vec<Capability> {
        if self.capabilities.is_empty() {
            vec![Capability::implicit(owner)]
        } else {
            self.capabilities.clone()
        }
    }
}

/// What a repository stores for one module version (`component.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub id: ModuleVersionIdentifier,
    /// Component level attributes, such as the release status.
    #[serde(default, skip_serializing_if = "AttributeSet::is_empty")]
    pub attributes: AttributeSet,
    #[serde(default)]
    pub variants: Vec<VariantMetadata>,
}

pub trait ComponentRepository {
    fn name(&self) -> &str;

    /// Lists the versions of a module. `Ok(None)` means this access level
    /// cannot tell and a later, wider access might.
    fn list_versions(
        &self,
        module: &ModuleIdentifier,
        access: RepositoryAccess,
    ) -> anyhow::Result<Option<VersionListing>>;

    /// Metadata of one version, `Ok(None)` when it is missing.
    fn component_metadata(
        &self,
        id: &ModuleVersionIdentifier,
        access: RepositoryAccess,
    ) -> anyhow::Result<Option<Arc<ComponentMetadata>>>;
}

impl<R> ComponentRepository for &R
where
    R: ComponentRepository + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list_versions(
        &self,
        module: &ModuleIdentifier,
        access: RepositoryAccess,
    ) -> anyhow::Result<Option<VersionListing>> {
        (**self).list_versions(module, access)
    }

    fn component_metadata(
        &self,
        id: &ModuleVersionIdentifier,
        access: RepositoryAccess,
    ) -> anyhow::Result<Option<Arc<ComponentMetadata>>> {
        (**self).component_metadata(id, access)
    }
}

/// Repositories in search order.
#[derive(Default)]
pub struct RepositoryList {
    repositories: Vec<Box<dyn ComponentRepository>>,
}

impl RepositoryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// File repositories listed in the configuration, in order.
    pub fn from_config(config: &ResolveConfig) -> Self {
        let mut list = Self::new();
        for repo in &config.repositories {
            list.push(Box::new(FileRepository::new(&repo.name, &repo.path)));
        }
        list
    }

    pub fn with_repository(mut self, repository: Box<dyn ComponentRepository>) -> Self {
        self.push(repository);
        self
    }

    pub fn push(&mut self, repository: Box<dyn ComponentRepository>) {
        self.repositories.push(repository);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ComponentRepository> {
        self.repositories
            .iter()
            .find(|r| r.name() == name)
            .map(|r| &**r)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ComponentRepository> {
        self.repositories.iter().map(|r| &**r)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

#[cfg(test)]
mod test {
    use expect_test::expect;

    use super::*;

    #[test]
    fn component_json() {
        let json = r#"{
            "id": "org.example:lib:1.0",
            "attributes": { "status": "release" },
            "variants": [
                {
                    "name": "api",
                    "attributes": { "usage": "api", "jvm": 17 },
                    "dependencies": [
                        { "module": "org.example:core", "version": "2.+" },
                        { "module": "org.example:util", "version": { "strictly": "1.1" }, "constraint": true }
                    ]
                },
                {
                    "name": "runtime",
                    "attributes": { "usage": "runtime" },
                    "available_at": "org.example:lib-runtime:1.0"
                }
            ]
        }"#;
        let metadata: ComponentMetadata = serde_json_lenient::from_str(json).unwrap();
        let api = &metadata.variants[0];
        expect!["{jvm=17, usage=api}"].assert_eq(&api.attributes.to_string());
        expect!["{strictly 1.1}"].assert_eq(&api.dependencies[1].version.to_string());
        assert!(api.dependencies[1].constraint);
        assert_eq!(
            metadata.variants[1].available_at,
            Some(ModuleVersionIdentifier::new("org.example", "lib-runtime", "1.0"))
        );
        expect!["[Capability { group: \"org.example\", name: \"lib\", version: Some(\"1.0\") }]"]
            .assert_eq(&format!("{:?}", api.capabilities_or_implicit(&metadata.id)));
    }
}
