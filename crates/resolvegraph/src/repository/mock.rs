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
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use resolveutil::{
    attributes::AttributeSet,
    identifier::{ModuleIdentifier, ModuleVersionIdentifier, VersionConstraint},
};

use super::{
    ComponentMetadata, ComponentRepository, DependencyMetadata, RepositoryAccess,
    VariantMetadata, VersionListing,
};

type ErrorFactory = Box<dyn Fn() -> anyhow::Error>;

/// An in-memory repository. Modules marked remote-only are invisible to
/// local access, and failures can be injected per module.
pub struct MockRepository {
    name: String,
    modules: HashMap<ModuleIdentifier, BTreeMap<String, Arc<ComponentMetadata>>>,
    remote_only: bool,
    failures: HashMap<ModuleIdentifier, ErrorFactory>,
    /// Every query, as `(module, access)`.
    pub queries: RefCell<Vec<(String, RepositoryAccess)>>,
}

impl MockRepository {
    pub fn new(name: &str) -> Self {
        MockRepository {
            name: name.into(),
            modules: HashMap::new(),
            remote_only: false,
            failures: HashMap::new(),
            queries: RefCell::new(vec![]),
        }
    }

    pub fn remote_only(mut self) -> Self {
        self.remote_only = true;
        self
    }

    pub fn add_component(&mut self, metadata: ComponentMetadata) -> &mut Self {
        self.modules
            .entry(metadata.id.module.clone())
            .or_default()
            .insert(metadata.id.version.clone(), Arc::new(metadata));
        self
    }

    /// Adds `group:name` at `version` with one `runtime` variant depending on
    /// each `(group:name, version)` of `deps`.
    pub fn add_module_full<'a>(
        &mut self,
        module: &'a str,
        version: &'a str,
        deps: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> &mut Self {
        self.add_component(create_mock_component(module, version, deps))
    }

    pub fn fail_with(
        &mut self,
        module: &str,
        error: impl Fn() -> anyhow::Error + 'static,
    ) -> &mut Self {
        self.failures
            .insert(module.parse().unwrap(), Box::new(error));
        self
    }

    fn record(&self, what: String, access: RepositoryAccess) {
        self.queries.borrow_mut().push((what, access));
    }

    fn visible(&self, access: RepositoryAccess) -> bool {
        !self.remote_only || access == RepositoryAccess::Remote
    }
}

pub fn create_mock_component<'a>(
    module: &'a str,
    version: &'a str,
    deps: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> ComponentMetadata {
    let module: ModuleIdentifier = module.parse().unwrap();
    ComponentMetadata {
        id: module.with_version(version),
        attributes: AttributeSet::empty(),
        variants: vec![VariantMetadata {
            name: "runtime".into(),
            attributes: AttributeSet::empty().with("usage", "runtime"),
            capabilities: vec![],
            dependencies: deps
                .into_iter()
                .map(|(module, version)| DependencyMetadata {
                    module: module.parse().unwrap(),
                    version: VersionConstraint::required(version),
                    constraint: false,
                    attributes: AttributeSet::empty(),
                    capabilities: vec![],
                })
                .collect(),
            available_at: None,
        }],
    }
}

impl ComponentRepository for MockRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_versions(
        &self,
        module: &ModuleIdentifier,
        access: RepositoryAccess,
    ) -> anyhow::Result<Option<VersionListing>> {
        self.record(module.to_string(), access);
        if let Some(error) = self.failures.get(module) {
            return Err(error());
        }
        if !self.visible(access) {
            return Ok(None);
        }
        Ok(Some(VersionListing {
            versions: self
                .modules
                .get(module)
                .map(|versions| versions.keys().cloned().collect())
                .unwrap_or_default(),
            attempted: vec![format!("mock:{}/{}", self.name, module)],
            authoritative: true,
        }))
    }

    fn component_metadata(
        &self,
        id: &ModuleVersionIdentifier,
        access: RepositoryAccess,
    ) -> anyhow::Result<Option<Arc<ComponentMetadata>>> {
        self.record(id.to_string(), access);
        if let Some(error) = self.failures.get(&id.module) {
            return Err(error());
        }
        if !self.visible(access) {
            return Ok(None);
        }
        Ok(self
            .modules
            .get(&id.module)
            .and_then(|versions| versions.get(&id.version))
            .cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn remote_only_modules_are_hidden_locally() {
        let mut repo = MockRepository::new("remote").remote_only();
        repo.add_module_full("org.example:lib", "1.0", [])
            .add_module_full("org.example:lib", "1.1", []);
        let module = "org.example:lib".parse().unwrap();
        assert!(
            repo.list_versions(&module, RepositoryAccess::Local)
                .unwrap()
                .is_none()
        );
        let listing = repo
            .list_versions(&module, RepositoryAccess::Remote)
            .unwrap()
            .unwrap();
        assert_eq!(listing.versions, vec!["1.0", "1.1"]);
        assert_eq!(repo.queries.borrow().len(), 2);
    }
}
