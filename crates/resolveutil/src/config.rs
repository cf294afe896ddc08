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

//! User configuration of the resolution engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable adding a file repository in front of the configured ones.
pub const REPOSITORY_ENV: &str = "RESOLVE_REPOSITORY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("malformed config file {0}")]
    Parse(PathBuf, #[source] serde_json_lenient::Error),
}

/// How strictly the dependency lock state is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Locked modules that resolve to another version are failures.
    #[default]
    Default,
    /// Additionally, locked modules missing from the graph are failures.
    Strict,
    /// Lock state is not validated at all.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Persist every known variant of a component, not just the selected ones.
    pub return_all_variants: bool,
    pub lock_mode: LockMode,
    /// Searched in order.
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        ResolveConfig {
            return_all_variants: true,
            lock_mode: LockMode::Default,
            repositories: vec![],
        }
    }
}

impl ResolveConfig {
    /// Loads `<home>/config.json`, falling back to defaults when it does not
    /// exist, then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = crate::dirs::config_json()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        if let Ok(repo) = std::env::var(REPOSITORY_ENV) {
            config.apply_repository_override(PathBuf::from(repo));
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_owned(), e))?;
        serde_json_lenient::from_str(&content).map_err(|e| ConfigError::Parse(path.to_owned(), e))
    }

    pub fn apply_repository_override(&mut self, path: PathBuf) {
        log::debug!("Using extra repository from environment: {}", path.display());
        self.repositories.insert(
            0,
            RepositoryConfig {
                name: "env".into(),
                path,
            },
        );
    }
}
