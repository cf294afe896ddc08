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

//! Locations under the resolver home directory.

use std::path::PathBuf;

use anyhow::Context;

use crate::common::CONFIG_JSON;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "RESOLVE_HOME";

pub fn home() -> anyhow::Result<PathBuf> {
    if let Ok(resolve_home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(resolve_home));
    }

    let hm = home::home_dir()
        .context("Failed to get home directory")?
        .join(".resolve");
    if !hm.exists() {
        std::fs::create_dir_all(&hm)
            .with_context(|| format!("failed to create {}", hm.display()))?;
    }
    Ok(hm)
}

pub fn config_json() -> anyhow::Result<PathBuf> {
    Ok(home()?.join(CONFIG_JSON))
}

/// Root of the working directories populated from version control.
pub fn vcs_cache() -> anyhow::Result<PathBuf> {
    Ok(home()?.join("vcs"))
}
