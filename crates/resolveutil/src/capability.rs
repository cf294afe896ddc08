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

use serde::{Deserialize, Serialize};

use crate::identifier::{ModuleIdentifier, ModuleVersionIdentifier};

/// Something a variant provides. Two variants providing the same capability
/// cannot coexist in one graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    pub group: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Capability {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: Option<String>) -> Self {
        Capability {
            group: group.into(),
            name: name.into(),
            version,
        }
    }

    /// The capability every module provides unless its variants declare otherwise.
    pub fn implicit(id: &ModuleVersionIdentifier) -> Self {
        Capability::new(id.group(), id.name(), Some(id.version.clone()))
    }

    /// Whether this capability has the same `group:name` as the module.
    pub fn is_for(&self, module: &ModuleIdentifier) -> bool {
        self.group == module.group && self.name == module.name
    }

    /// Compares only the `group:name` part.
    pub fn same_as(&self, other: &Capability) -> bool {
        self.group == other.group && self.name == other.name
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}:{}", self.group, self.name, v),
            None => write!(f, "{}:{}", self.group, self.name),
        }
    }
}
