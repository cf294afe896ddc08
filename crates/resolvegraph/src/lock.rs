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

//! Dependency lock state: the module versions a previous resolution
//! produced, checked against the current one.

use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use resolveutil::{
    config::LockMode,
    identifier::{ComponentIdentifier, ComponentSelector, ModuleIdentifier, ModuleVersionIdentifier},
};
use thiserror::Error;

use crate::{builder::ExtraFailure, failure::FailureCause, result::ResolutionResult};

const LOCKFILE_HEADER: &str = "\
# Dependency lock state, generated by resolution.
# Manual edits can break the resolution.
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockFileError {
    #[error("line {line}: invalid lock entry '{entry}'")]
    InvalidEntry { line: usize, entry: String },
    #[error("line {line}: {module} is locked to both {first} and {second}")]
    Conflict {
        line: usize,
        module: ModuleIdentifier,
        first: String,
        second: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyLockState {
    entries: BTreeMap<ModuleIdentifier, String>,
}

impl DependencyLockState {
    /// Parses `group:name:version` lines. Blank lines and `#` comments are
    /// ignored.
    pub fn parse(content: &str) -> Result<Self, LockFileError> {
        let mut entries = BTreeMap::<ModuleIdentifier, String>::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id: ModuleVersionIdentifier =
                line.parse().map_err(|_| LockFileError::InvalidEntry {
                    line: i + 1,
                    entry: line.to_owned(),
                })?;
            if let Some(first) = entries.get(&id.module) {
                if *first != id.version {
                    return Err(LockFileError::Conflict {
                        line: i + 1,
                        module: id.module,
                        first: first.clone(),
                        second: id.version,
                    });
                }
                continue;
            }
            entries.insert(id.module, id.version);
        }
        Ok(DependencyLockState { entries })
    }

    /// Reads a lockfile. A missing file means there is no lock state.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lockfile {}", path.display()))?;
        let state = Self::parse(&content)
            .with_context(|| format!("failed to parse lockfile {}", path.display()))?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_lockfile())
            .with_context(|| format!("failed to write lockfile {}", path.display()))
    }

    /// Locks every module component of a resolution result.
    pub fn from_result(result: &ResolutionResult) -> Self {
        let entries = result
            .components()
            .filter(|(_, c)| matches!(c.id(), ComponentIdentifier::Module(_)))
            .map(|(_, c)| (c.module_version().module.clone(), c.module_version().version.clone()))
            .collect();
        DependencyLockState { entries }
    }

    pub fn lock(&mut self, id: ModuleVersionIdentifier) {
        self.entries.insert(id.module, id.version);
    }

    pub fn locked_version(&self, module: &ModuleIdentifier) -> Option<&str> {
        self.entries.get(module).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ModuleVersionIdentifier> + '_ {
        self.entries.iter().map(|(m, v)| m.with_version(v.clone()))
    }

    pub fn to_lockfile(&self) -> String {
        let mut out = LOCKFILE_HEADER.to_owned();
        for id in self.iter() {
            out.push_str(&id.to_string());
            out.push('\n');
        }
        out
    }

    /// Compares resolved module versions against the lock state.
    ///
    /// A locked module resolved at another version is always a failure. In
    /// strict mode, a locked module that was not resolved at all is one too.
    pub fn validate<'a>(
        &self,
        resolved: impl IntoIterator<Item = &'a ModuleVersionIdentifier>,
        mode: LockMode,
    ) -> Vec<ExtraFailure> {
        if mode == LockMode::Lenient {
            return vec![];
        }
        let mut failures = vec![];
        let mut seen = BTreeMap::new();
        for id in resolved {
            seen.insert(&id.module, &id.version);
            let Some(locked) = self.entries.get(&id.module) else {
                continue;
            };
            if *locked != id.version {
                failures.push(ExtraFailure {
                    selector: ComponentSelector::module(&id.module.group, &id.module.name, locked),
                    problem: FailureCause::message(format!(
                        "Resolved '{id}' which is not part of the dependency lock state"
                    )),
                });
            }
        }
        if mode == LockMode::Strict {
            for (module, version) in &self.entries {
                if !seen.contains_key(module) {
                    failures.push(ExtraFailure {
                        selector: ComponentSelector::module(&module.group, &module.name, version),
                        problem: FailureCause::message(format!(
                            "Did not resolve '{}' which is part of the dependency lock state",
                            module.with_version(version.clone())
                        )),
                    });
                }
            }
        }
        if !failures.is_empty() {
            log::debug!("{} dependency lock violations", failures.len());
        }
        failures
    }
}
