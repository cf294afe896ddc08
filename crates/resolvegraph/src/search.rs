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

//! Finds the component matching a module request across repositories.
//!
//! Repositories are asked in two passes. The first pass only uses local
//! access; repositories that could not answer locally are asked again with
//! remote access. A critical failure (timeout, server error) ends the search
//! for this module, other failures are kept and the search moves on.

use std::{cmp::Ordering, sync::Arc};

use resolveutil::{
    attributes::AttributeSet,
    identifier::{ComponentSelector, ModuleComponentSelector},
    version::{VersionSelector, compare_versions},
};

use crate::{
    failure::{AttributeMatch, FailureCause, ModuleVersionResolveError, RejectedVersion},
    repository::{ComponentMetadata, ComponentRepository, RepositoryAccess, RepositoryList},
};

/// A component and the repository it was found in.
#[derive(Clone, Debug)]
pub struct FoundComponent {
    pub metadata: Arc<ComponentMetadata>,
    pub repository: String,
}

/// Compares the component-level attributes a module declares against the
/// request. Attributes the component does not declare are not considered.
pub fn component_attribute_matches(
    requested: &AttributeSet,
    provided: &AttributeSet,
) -> Vec<AttributeMatch> {
    requested
        .iter()
        .filter_map(|(name, value)| {
            provided.get(name).map(|p| AttributeMatch {
                name: name.to_owned(),
                requested: value.clone(),
                provided: Some(p.clone()),
            })
        })
        .collect()
}

struct RepositoryResolveState<'a> {
    repository: &'a dyn ComponentRepository,
    attempted: Vec<String>,
    unmatched: Vec<String>,
    rejected: Vec<RejectedVersion>,
    found: Option<Arc<ComponentMetadata>>,
}

impl<'a> RepositoryResolveState<'a> {
    fn new(repository: &'a dyn ComponentRepository) -> Self {
        RepositoryResolveState {
            repository,
            attempted: vec![],
            unmatched: vec![],
            rejected: vec![],
            found: None,
        }
    }

    /// Returns `false` when the repository could not answer at this access
    /// level.
    fn attempt(
        &mut self,
        selector: &ModuleComponentSelector,
        versions: &VersionSelector,
        access: RepositoryAccess,
    ) -> anyhow::Result<bool> {
        let Some(listing) = self.repository.list_versions(&selector.module, access)? else {
            return Ok(false);
        };
        for location in listing.attempted {
            if !self.attempted.contains(&location) {
                self.attempted.push(location);
            }
        }

        if let VersionSelector::Exact(exact) = versions {
            let listed = listing.versions.iter().find(|v| versions.accepts(v));
            match listed {
                Some(version) => {
                    let version = version.clone();
                    self.try_candidate(selector, &version, access)?;
                }
                None if !listing.authoritative => {
                    self.try_candidate(selector, exact, access)?;
                }
                None => {}
            }
            return Ok(true);
        }

        let mut candidates = listing.versions;
        candidates.sort_by(|a, b| compare_versions(b, a));
        for version in candidates {
            if !versions.accepts(&version) {
                self.unmatched.push(version);
                continue;
            }
            if self.try_candidate(selector, &version, access)? {
                break;
            }
        }
        Ok(true)
    }

    fn try_candidate(
        &mut self,
        selector: &ModuleComponentSelector,
        version: &str,
        access: RepositoryAccess,
    ) -> anyhow::Result<bool> {
        let rejected_by = selector.constraint.rejected.iter().find(|reject| {
            VersionSelector::parse(reject).is_ok_and(|s| s.accepts(version))
        });
        if let Some(reject) = rejected_by {
            self.rejected.push(RejectedVersion::by_rule(
                version,
                Some(format!("rejected by constraint '{reject}'")),
            ));
            return Ok(false);
        }

        let id = selector.module.with_version(version);
        let Some(metadata) = self.repository.component_metadata(&id, access)? else {
            return Ok(false);
        };
        let matches = component_attribute_matches(&selector.attributes, &metadata.attributes);
        if matches.iter().any(|m| !m.matches()) {
            self.rejected
                .push(RejectedVersion::by_attributes(version, matches));
            return Ok(false);
        }
        self.found = Some(metadata);
        Ok(true)
    }
}

pub struct RepositoryChain<'a> {
    repositories: Vec<&'a dyn ComponentRepository>,
}

impl<'a> RepositoryChain<'a> {
    pub fn new(list: &'a RepositoryList) -> Self {
        RepositoryChain {
            repositories: list.iter().collect(),
        }
    }

    pub fn from_repositories(repositories: impl IntoIterator<Item = &'a dyn ComponentRepository>) -> Self {
        RepositoryChain {
            repositories: repositories.into_iter().collect(),
        }
    }

    pub fn resolve(
        &self,
        selector: &ModuleComponentSelector,
    ) -> Result<FoundComponent, ModuleVersionResolveError> {
        let requested = ComponentSelector::Module(selector.clone());
        let versions = VersionSelector::parse(selector.constraint.effective_version()).map_err(|e| {
            ModuleVersionResolveError::generic(
                requested.clone(),
                vec![FailureCause::new(anyhow::Error::new(e))],
            )
        })?;

        let mut states = self
            .repositories
            .iter()
            .map(|&r| RepositoryResolveState::new(r))
            .collect::<Vec<_>>();
        let mut errors = vec![];

        let mut missing = vec![];
        let mut stopped = false;
        for (i, state) in states.iter_mut().enumerate() {
            match state.attempt(selector, &versions, RepositoryAccess::Local) {
                Ok(true) => {}
                Ok(false) => missing.push(i),
                Err(e) => {
                    if record_failure(&mut errors, state.repository, e) {
                        stopped = true;
                        break;
                    }
                }
            }
        }
        if !stopped {
            for i in missing {
                let state = &mut states[i];
                if let Err(e) = state.attempt(selector, &versions, RepositoryAccess::Remote)
                    && record_failure(&mut errors, state.repository, e)
                {
                    break;
                }
            }
        }

        let mut best: Option<&RepositoryResolveState> = None;
        for state in &states {
            let Some(candidate) = &state.found else {
                continue;
            };
            let newer = best.is_none_or(|b| {
                b.found.as_ref().is_none_or(|current| {
                    compare_versions(&candidate.id.version, &current.id.version)
                        == Ordering::Greater
                })
            });
            if newer {
                best = Some(state);
            }
        }

        if let Some(best) = best
            && let Some(metadata) = &best.found
        {
            if !errors.is_empty() && log::log_enabled!(log::Level::Debug) {
                for e in &errors {
                    log::debug!("Discarding resolve failure for {}: {}", selector, e);
                }
            }
            log::debug!(
                "Resolved {} to {} from {}",
                selector,
                metadata.id,
                best.repository.name()
            );
            return Ok(FoundComponent {
                metadata: metadata.clone(),
                repository: best.repository.name().to_owned(),
            });
        }

        if !errors.is_empty() {
            return Err(ModuleVersionResolveError::generic(requested, errors));
        }

        let mut attempted = vec![];
        let mut unmatched = vec![];
        let mut rejected = vec![];
        for state in states {
            attempted.extend(state.attempted);
            for version in state.unmatched {
                if !unmatched.contains(&version) {
                    unmatched.push(version);
                }
            }
            rejected.extend(state.rejected);
        }
        Err(ModuleVersionResolveError::not_found(
            requested, attempted, unmatched, rejected,
        ))
    }
}

/// Keeps the failure and reports whether it should stop the search.
fn record_failure(
    errors: &mut Vec<FailureCause>,
    repository: &dyn ComponentRepository,
    error: anyhow::Error,
) -> bool {
    let cause = FailureCause::new(error.context(format!(
        "Could not resolve from repository '{}'",
        repository.name()
    )));
    let critical = cause.is_critical();
    if critical {
        log::debug!("Critical failure, skipping remaining repositories: {}", cause);
    }
    errors.push(cause);
    critical
}
