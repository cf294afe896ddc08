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

//! Version ordering and version selectors.

use std::cmp::Ordering;

use semver::{Version, VersionReq};
use thiserror::Error;

/// Parses a version, padding missing minor/patch components with zeros so
/// that `1` and `1.2` are accepted.
pub fn parse_lenient(version: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(version) {
        return Some(v);
    }
    let (core, rest) = match version.find(['-', '+']) {
        Some(idx) => version.split_at(idx),
        None => (version, ""),
    };
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Total order over version strings: semantic when both sides parse,
/// lexical otherwise. Semantic versions sort after unparseable ones.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid version selector '{selector}': {reason}")]
pub struct VersionSelectorError {
    pub selector: String,
    pub reason: String,
}

/// Decides which versions of a module a request accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionSelector {
    /// Any version, newest first.
    Latest,
    /// One specific version.
    Exact(String),
    /// A semantic version requirement such as `^1.2` or `>=1.0, <2.0`.
    Range(VersionReq),
}

impl VersionSelector {
    pub fn parse(selector: &str) -> Result<Self, VersionSelectorError> {
        let selector = selector.trim();
        if selector.is_empty() || selector == "+" || selector.starts_with("latest.") {
            return Ok(VersionSelector::Latest);
        }
        if let Some(prefix) = selector.strip_suffix(".+") {
            return VersionReq::parse(&format!("{prefix}.*"))
                .map(VersionSelector::Range)
                .map_err(|e| VersionSelectorError {
                    selector: selector.to_owned(),
                    reason: e.to_string(),
                });
        }
        let starts_with_digit = selector.chars().next().is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit && parse_lenient(selector).is_some() {
            return Ok(VersionSelector::Exact(selector.to_owned()));
        }
        VersionReq::parse(selector)
            .map(VersionSelector::Range)
            .map_err(|e| VersionSelectorError {
                selector: selector.to_owned(),
                reason: e.to_string(),
            })
    }

    pub fn accepts(&self, version: &str) -> bool {
        match self {
            VersionSelector::Latest => true,
            VersionSelector::Exact(exact) => {
                exact == version
                    || matches!(
                        (parse_lenient(exact), parse_lenient(version)),
                        (Some(a), Some(b)) if a == b
                    )
            }
            VersionSelector::Range(req) => parse_lenient(version).is_some_and(|v| req.matches(&v)),
        }
    }

    /// Dynamic selectors need the list of available versions to pick one.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, VersionSelector::Exact(_))
    }
}
