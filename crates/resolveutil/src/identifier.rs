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

//! Module coordinates, component identifiers and the selectors that request them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{attributes::AttributeSet, capability::Capability};

/// The `group:name` coordinate of a module, without any version.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleIdentifier {
    pub group: String,
    pub name: String,
}

impl ModuleIdentifier {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        ModuleIdentifier {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn with_version(&self, version: impl Into<String>) -> ModuleVersionIdentifier {
        ModuleVersionIdentifier {
            module: self.clone(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl std::fmt::Debug for ModuleIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl FromStr for ModuleIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, name)) if !name.is_empty() && !name.contains(':') => {
                Ok(ModuleIdentifier::new(group, name))
            }
            _ => Err(format!("Malformed module coordinate '{s}', expected 'group:name'")),
        }
    }
}

impl TryFrom<String> for ModuleIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleIdentifier> for String {
    fn from(value: ModuleIdentifier) -> Self {
        value.to_string()
    }
}

/// A module at one specific version, `group:name:version`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleVersionIdentifier {
    pub module: ModuleIdentifier,
    pub version: String,
}

impl ModuleVersionIdentifier {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        ModuleIdentifier::new(group, name).with_version(version)
    }

    pub fn group(&self) -> &str {
        &self.module.group
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }
}

impl std::fmt::Display for ModuleVersionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

impl std::fmt::Debug for ModuleVersionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl FromStr for ModuleVersionIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(group), Some(name), Some(version)) if !version.is_empty() => {
                Ok(ModuleVersionIdentifier::new(group, name, version))
            }
            _ => Err(format!(
                "Malformed module version '{s}', expected 'group:name:version'"
            )),
        }
    }
}

impl TryFrom<String> for ModuleVersionIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleVersionIdentifier> for String {
    fn from(value: ModuleVersionIdentifier) -> Self {
        value.to_string()
    }
}

/// A project inside a (possibly included) build.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectIdentifier {
    /// Path of the owning build, `:` for the root build.
    pub build_path: String,
    /// Path of the project inside its build, `:` for the root project.
    pub project_path: String,
}

impl ProjectIdentifier {
    pub fn new(build_path: impl Into<String>, project_path: impl Into<String>) -> Self {
        ProjectIdentifier {
            build_path: build_path.into(),
            project_path: project_path.into(),
        }
    }

    /// The path of the project across the whole build tree.
    pub fn identity_path(&self) -> String {
        if self.build_path == ":" {
            self.project_path.clone()
        } else if self.project_path == ":" {
            self.build_path.clone()
        } else {
            format!("{}{}", self.build_path, self.project_path)
        }
    }
}

impl std::fmt::Display for ProjectIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "project {}", self.identity_path())
    }
}

/// Identifies a resolved component, whatever kind of source produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentIdentifier {
    /// A module published to a repository.
    Module(ModuleVersionIdentifier),
    /// A project of the build itself or of an included build.
    Project(ProjectIdentifier),
    /// A module built from a version-control checkout.
    Vcs {
        /// Display name of the repository the checkout comes from.
        repository: String,
        module: ModuleIdentifier,
        /// Stable id of the checked out revision, e.g. a commit hash.
        canonical_id: String,
    },
}

impl ComponentIdentifier {
    pub fn module(group: &str, name: &str, version: &str) -> Self {
        ComponentIdentifier::Module(ModuleVersionIdentifier::new(group, name, version))
    }

    pub fn project(build_path: &str, project_path: &str) -> Self {
        ComponentIdentifier::Project(ProjectIdentifier::new(build_path, project_path))
    }

    pub fn display_name(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentIdentifier::Module(id) => write!(f, "{id}"),
            ComponentIdentifier::Project(project) => write!(f, "{project}"),
            ComponentIdentifier::Vcs {
                repository,
                module,
                canonical_id,
            } => write!(f, "{module}:{canonical_id} ({repository})"),
        }
    }
}

/// The version part of a module request.
///
/// Empty strings mean "not set", mirroring how constraints are written in
/// module metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "VersionConstraintJson", into = "VersionConstraintJson")]
pub struct VersionConstraint {
    pub required: String,
    pub preferred: String,
    pub strictly: String,
    pub rejected: Vec<String>,
    pub branch: Option<String>,
}

impl VersionConstraint {
    pub fn required(version: impl Into<String>) -> Self {
        VersionConstraint {
            required: version.into(),
            ..Default::default()
        }
    }

    pub fn strictly(version: impl Into<String>) -> Self {
        let version = version.into();
        VersionConstraint {
            required: version.clone(),
            strictly: version,
            ..Default::default()
        }
    }

    /// The version string that drives selection: the strict version when
    /// present, the required one otherwise.
    pub fn effective_version(&self) -> &str {
        if self.strictly.is_empty() {
            &self.required
        } else {
            &self.strictly
        }
    }

    pub fn is_strict(&self) -> bool {
        !self.strictly.is_empty()
    }

    fn is_simple(&self) -> bool {
        self.preferred.is_empty()
            && self.strictly.is_empty()
            && self.rejected.is_empty()
            && self.branch.is_none()
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_simple() {
            return f.write_str(&self.required);
        }
        let mut parts = vec![];
        if !self.strictly.is_empty() {
            parts.push(format!("strictly {}", self.strictly));
        } else if !self.required.is_empty() {
            parts.push(format!("require {}", self.required));
        }
        if !self.preferred.is_empty() {
            parts.push(format!("prefer {}", self.preferred));
        }
        if !self.rejected.is_empty() {
            parts.push(format!("reject {}", self.rejected.join(" & ")));
        }
        if let Some(branch) = &self.branch {
            parts.push(format!("branch {branch}"));
        }
        write!(f, "{{{}}}", parts.join("; "))
    }
}

/// JSON form of a version constraint: either a bare version string or the
/// detailed object.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum VersionConstraintJson {
    Simple(String),
    Detailed {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        requires: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        prefers: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        strictly: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        rejects: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
}

impl From<VersionConstraintJson> for VersionConstraint {
    fn from(value: VersionConstraintJson) -> Self {
        match value {
            VersionConstraintJson::Simple(required) => VersionConstraint::required(required),
            VersionConstraintJson::Detailed {
                requires,
                prefers,
                strictly,
                rejects,
                branch,
            } => VersionConstraint {
                required: if requires.is_empty() {
                    strictly.clone()
                } else {
                    requires
                },
                preferred: prefers,
                strictly,
                rejected: rejects,
                branch,
            },
        }
    }
}

impl From<VersionConstraint> for VersionConstraintJson {
    fn from(value: VersionConstraint) -> Self {
        if value.is_simple() {
            VersionConstraintJson::Simple(value.required)
        } else {
            VersionConstraintJson::Detailed {
                requires: value.required,
                prefers: value.preferred,
                strictly: value.strictly,
                rejects: value.rejected,
                branch: value.branch,
            }
        }
    }
}

/// Requests a module through a version constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleComponentSelector {
    pub module: ModuleIdentifier,
    pub constraint: VersionConstraint,
    pub attributes: AttributeSet,
    pub capabilities: Vec<Capability>,
}

impl ModuleComponentSelector {
    pub fn new(module: ModuleIdentifier, constraint: VersionConstraint) -> Self {
        ModuleComponentSelector {
            module,
            constraint,
            attributes: AttributeSet::empty(),
            capabilities: vec![],
        }
    }
}

impl std::fmt::Display for ModuleComponentSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.constraint.to_string();
        if version.is_empty() {
            write!(f, "{}", self.module)
        } else {
            write!(f, "{}:{}", self.module, version)
        }
    }
}

/// What a dependency edge asked for, before anything was selected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentSelector {
    Module(ModuleComponentSelector),
    Project {
        project: ProjectIdentifier,
        attributes: AttributeSet,
        capabilities: Vec<Capability>,
    },
}

impl ComponentSelector {
    /// Shorthand for a plain `group:name:version` request.
    pub fn module(group: &str, name: &str, version: &str) -> Self {
        ComponentSelector::Module(ModuleComponentSelector::new(
            ModuleIdentifier::new(group, name),
            VersionConstraint::required(version),
        ))
    }

    pub fn project(build_path: &str, project_path: &str) -> Self {
        ComponentSelector::Project {
            project: ProjectIdentifier::new(build_path, project_path),
            attributes: AttributeSet::empty(),
            capabilities: vec![],
        }
    }

    pub fn attributes(&self) -> &AttributeSet {
        match self {
            ComponentSelector::Module(m) => &m.attributes,
            ComponentSelector::Project { attributes, .. } => attributes,
        }
    }

    pub fn requested_capabilities(&self) -> &[Capability] {
        match self {
            ComponentSelector::Module(m) => &m.capabilities,
            ComponentSelector::Project { capabilities, .. } => capabilities,
        }
    }

    pub fn display_name(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ComponentSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentSelector::Module(m) => write!(f, "{m}"),
            ComponentSelector::Project { project, .. } => write!(f, "{project}"),
        }
    }
}
