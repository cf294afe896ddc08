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

use std::{collections::HashMap, sync::Arc};

use resolveutil::{config::LockMode, identifier::ModuleComponentSelector};

use super::ResolverError;
use crate::{
    failure::ModuleVersionResolveError,
    lock::DependencyLockState,
    repository::RepositoryList,
    search::{FoundComponent, RepositoryChain},
};

type SearchResult = Result<FoundComponent, Arc<ModuleVersionResolveError>>;

pub struct ResolverEnv<'a> {
    chain: RepositoryChain<'a>,
    errors: Vec<ResolverError>,
    cache: HashMap<ModuleComponentSelector, SearchResult>,
    lock_state: Option<(&'a DependencyLockState, LockMode)>,
}

impl<'a> ResolverEnv<'a> {
    pub fn new(repositories: &'a RepositoryList) -> Self {
        ResolverEnv {
            chain: RepositoryChain::new(repositories),
            errors: Vec::new(),
            cache: HashMap::new(),
            lock_state: None,
        }
    }

    pub fn with_lock_state(mut self, state: &'a DependencyLockState, mode: LockMode) -> Self {
        self.lock_state = Some((state, mode));
        self
    }

    pub fn lock_state(&self) -> Option<(&'a DependencyLockState, LockMode)> {
        self.lock_state
    }

    pub fn into_errors(self) -> Vec<ResolverError> {
        self.errors
    }

    pub fn report_error(&mut self, error: ResolverError) {
        self.errors.push(error);
    }

    pub fn any_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Searches the repositories for `selector`. Each distinct selector is
    /// searched once per environment.
    pub fn resolve(&mut self, selector: &ModuleComponentSelector) -> SearchResult {
        if let Some(cached) = self.cache.get(selector) {
            return cached.clone();
        }
        let result = self.chain.resolve(selector).map_err(Arc::new);
        if let Err(e) = &result {
            log::debug!("Failed to resolve {}: {}", selector, e.message());
        }
        self.cache.insert(selector.clone(), result.clone());
        result
    }
}
