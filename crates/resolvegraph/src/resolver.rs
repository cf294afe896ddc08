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

use resolveutil::{
    attributes::AttributeSet,
    config::ResolveConfig,
    identifier::{ComponentIdentifier, ModuleVersionIdentifier, VersionConstraint},
};
use thiserror::Error;

use crate::{
    builder::GraphError,
    lock::DependencyLockState,
    repository::{DependencyMetadata, RepositoryList},
    result::ResolutionResult,
};

pub mod env;
pub mod variants;
pub mod walker;

pub use walker::GraphWalker;

use self::env::ResolverEnv;

/// Errors that prevent a resolution result from being produced at all.
/// Failures to resolve individual modules are attached to the graph instead.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Malformed dependency declared by {0}: {1}")]
    MalformedDependency(ComponentIdentifier, String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Error during resolution: {0}")]
    Other(anyhow::Error),
}

#[derive(Debug)]
pub struct ResolverErrors(pub Vec<ResolverError>);

impl std::fmt::Display for ResolverErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolverErrors {}

/// The component whose dependencies are being resolved.
#[derive(Clone, Debug)]
pub struct RootComponent {
    pub module_version: ModuleVersionIdentifier,
    pub component_id: ComponentIdentifier,
    /// Consumer attributes applied to every variant selection.
    pub attributes: AttributeSet,
    pub dependencies: Vec<DependencyMetadata>,
}

impl RootComponent {
    pub fn new(
        module_version: ModuleVersionIdentifier,
        component_id: ComponentIdentifier,
        attributes: AttributeSet,
    ) -> Self {
        RootComponent {
            module_version,
            component_id,
            attributes,
            dependencies: vec![],
        }
    }

    /// Adds a plain `group:name` dependency at `version`.
    pub fn depends_on(mut self, module: &str, version: &str) -> Result<Self, ResolverError> {
        let dependency = DependencyMetadata {
            module: module
                .parse()
                .map_err(|e| ResolverError::MalformedDependency(self.component_id.clone(), e))?,
            version: VersionConstraint::required(version),
            constraint: false,
            attributes: AttributeSet::empty(),
            capabilities: vec![],
        };
        self.dependencies.push(dependency);
        Ok(self)
    }

    pub fn with_dependency(mut self, dependency: DependencyMetadata) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// The dependency resolver.
pub trait Resolver {
    /// Resolves the dependencies of `root` using the given environment.
    ///
    /// Returns `None` when the environment recorded errors that prevent a
    /// graph from being built.
    fn resolve(&mut self, env: &mut ResolverEnv, root: &RootComponent) -> Option<ResolutionResult>;
}

pub fn resolve_with_default_env(
    repositories: &RepositoryList,
    resolver: &mut dyn Resolver,
    root: &RootComponent,
) -> Result<ResolutionResult, ResolverErrors> {
    resolve_in_env(ResolverEnv::new(repositories), resolver, root)
}

fn resolve_in_env(
    mut env: ResolverEnv,
    resolver: &mut dyn Resolver,
    root: &RootComponent,
) -> Result<ResolutionResult, ResolverErrors> {
    let res = resolver.resolve(&mut env, root);
    match res {
        Some(result) if !env.any_errors() => Ok(result),
        _ => {
            let mut errors = env.into_errors();
            if errors.is_empty() {
                errors.push(ResolverError::Other(anyhow::anyhow!(
                    "resolver produced no result"
                )));
            }
            Err(ResolverErrors(errors))
        }
    }
}

/// Resolves against the repositories of `config`, validating `lock_state`
/// with the configured lock mode.
pub fn resolve_with_config(
    config: &ResolveConfig,
    root: &RootComponent,
    lock_state: Option<&DependencyLockState>,
) -> Result<ResolutionResult, ResolverErrors> {
    let repositories = RepositoryList::from_config(config);
    let mut env = ResolverEnv::new(&repositories);
    if let Some(state) = lock_state {
        env = env.with_lock_state(state, config.lock_mode);
    }
    resolve_in_env(env, &mut GraphWalker, root)
}
