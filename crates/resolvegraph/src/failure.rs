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

//! Typed resolution failures.
//!
//! A failure describes why one requested module could not be resolved. Failures
//! are attached to the dependency edge that requested the module instead of
//! aborting the whole graph, and are enriched with incoming paths through
//! [`ModuleVersionResolveError::with_incoming_paths`], which returns a copy.

use std::{fmt::Write as _, sync::Arc};

use resolveutil::{
    attributes::AttributeValue,
    identifier::{ComponentIdentifier, ComponentSelector},
    version::VersionSelector,
};
use thiserror::Error;

/// How many versions are listed per category before the rest is summarized
/// as `+ N more`.
pub const MAX_LISTED_VERSIONS: usize = 5;

/// The chain of components through which a module was requested, root first.
pub type IncomingPath = Vec<ComponentIdentifier>;

/// Failures raised while talking to a repository.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Read timed out while fetching {0}")]
    Timeout(String),
    #[error("Could not GET '{url}'. Received status code {status} from server")]
    HttpStatus { url: String, status: u16 },
}

impl TransportError {
    pub fn is_server_error(&self) -> bool {
        matches!(self, TransportError::HttpStatus { status, .. } if (500..600).contains(status))
    }
}

fn root_cause<'a>(
    error: &'a (dyn std::error::Error + 'static),
) -> &'a (dyn std::error::Error + 'static) {
    let mut current = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

/// Whether an error should stop the search through further repositories.
///
/// Critical errors are those whose root cause is a timed out or interrupted
/// read, or a server-side (5xx) HTTP status. Everything else is worth
/// retrying elsewhere.
pub fn is_critical_failure(error: &(dyn std::error::Error + 'static)) -> bool {
    let root = root_cause(error);
    if let Some(io) = root.downcast_ref::<std::io::Error>() {
        return matches!(
            io.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
        );
    }
    if let Some(transport) = root.downcast_ref::<TransportError>() {
        return match transport {
            TransportError::Timeout(_) => true,
            TransportError::HttpStatus { .. } => transport.is_server_error(),
        };
    }
    false
}

/// An opaque underlying cause, shared between copies of a failure.
#[derive(Clone)]
pub struct FailureCause(Arc<anyhow::Error>);

impl FailureCause {
    pub fn new(error: anyhow::Error) -> Self {
        FailureCause(Arc::new(error))
    }

    pub fn message(message: impl std::fmt::Display) -> Self {
        FailureCause::new(anyhow::anyhow!("{message}"))
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn is_critical(&self) -> bool {
        is_critical_failure(self.as_std())
    }

    fn as_std(&self) -> &(dyn std::error::Error + 'static) {
        let error: &(dyn std::error::Error + Send + Sync + 'static) = (*self.0).as_ref();
        error
    }
}

impl std::fmt::Debug for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

/// Causes compare by their rendered message chain.
impl PartialEq for FailureCause {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.to_string() == other.to_string()
    }
}

impl Eq for FailureCause {}

/// How one requested attribute compared against what a candidate provides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeMatch {
    pub name: String,
    pub requested: AttributeValue,
    pub provided: Option<AttributeValue>,
}

impl AttributeMatch {
    /// A missing attribute is compatible with any request.
    pub fn matches(&self) -> bool {
        self.provided
            .as_ref()
            .is_none_or(|provided| *provided == self.requested)
    }
}

impl std::fmt::Display for AttributeMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provided {
            None => write!(
                f,
                "Attribute '{}' was not provided. Requested '{}'",
                self.name, self.requested
            ),
            Some(provided) if self.matches() => write!(
                f,
                "Attribute '{}' matched. Requested '{}', was: '{}'",
                self.name, self.requested, provided
            ),
            Some(provided) => write!(
                f,
                "Attribute '{}' didn't match. Requested '{}', was: '{}'",
                self.name, self.requested, provided
            ),
        }
    }
}

fn sorted_matches(mut matches: Vec<AttributeMatch>) -> Vec<AttributeMatch> {
    matches.sort_by(|a, b| a.name.cmp(&b.name));
    matches
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    /// Rejected by a rule or a `reject` constraint, with an optional explanation.
    ByRule(Option<String>),
    /// The component-level attributes did not match the consumer.
    ByAttributes(Vec<AttributeMatch>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedVersion {
    pub version: String,
    pub reason: RejectionReason,
}

impl RejectedVersion {
    pub fn by_rule(version: impl Into<String>, reason: Option<String>) -> Self {
        RejectedVersion {
            version: version.into(),
            reason: RejectionReason::ByRule(reason),
        }
    }

    pub fn by_attributes(version: impl Into<String>, matches: Vec<AttributeMatch>) -> Self {
        RejectedVersion {
            version: version.into(),
            reason: RejectionReason::ByAttributes(sorted_matches(matches)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveFailureKind {
    /// No repository produced a matching version.
    NotFound {
        attempted: Vec<String>,
        unmatched_versions: Vec<String>,
        rejected_versions: Vec<RejectedVersion>,
    },
    /// The component resolved, but one of its artifacts is missing everywhere.
    ArtifactNotFound {
        component: ComponentIdentifier,
        artifact: String,
        attempted: Vec<String>,
    },
    /// The version exists but none of its variants matches the request.
    RejectedByAttributes {
        version: String,
        matches: Vec<AttributeMatch>,
    },
    /// Anything else, possibly wrapping underlying causes.
    Generic {
        message: Option<String>,
        causes: Vec<FailureCause>,
    },
}

/// Why one requested module could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleVersionResolveError {
    selector: ComponentSelector,
    kind: ResolveFailureKind,
    paths: Vec<IncomingPath>,
}

impl ModuleVersionResolveError {
    pub fn new(selector: ComponentSelector, kind: ResolveFailureKind) -> Self {
        let kind = match kind {
            ResolveFailureKind::RejectedByAttributes { version, matches } => {
                ResolveFailureKind::RejectedByAttributes {
                    version,
                    matches: sorted_matches(matches),
                }
            }
            other => other,
        };
        ModuleVersionResolveError {
            selector,
            kind,
            paths: vec![],
        }
    }

    pub fn not_found(
        selector: ComponentSelector,
        attempted: Vec<String>,
        unmatched_versions: Vec<String>,
        rejected_versions: Vec<RejectedVersion>,
    ) -> Self {
        Self::new(
            selector,
            ResolveFailureKind::NotFound {
                attempted,
                unmatched_versions,
                rejected_versions,
            },
        )
    }

    pub fn artifact_not_found(
        selector: ComponentSelector,
        component: ComponentIdentifier,
        artifact: impl Into<String>,
        attempted: Vec<String>,
    ) -> Self {
        Self::new(
            selector,
            ResolveFailureKind::ArtifactNotFound {
                component,
                artifact: artifact.into(),
                attempted,
            },
        )
    }

    pub fn rejected_by_attributes(
        selector: ComponentSelector,
        version: impl Into<String>,
        matches: Vec<AttributeMatch>,
    ) -> Self {
        Self::new(
            selector,
            ResolveFailureKind::RejectedByAttributes {
                version: version.into(),
                matches,
            },
        )
    }

    /// Wraps the failures collected while searching for the module.
    pub fn generic(selector: ComponentSelector, causes: Vec<FailureCause>) -> Self {
        Self::new(
            selector,
            ResolveFailureKind::Generic {
                message: None,
                causes,
            },
        )
    }

    pub fn with_message(
        selector: ComponentSelector,
        message: impl Into<String>,
        cause: Option<FailureCause>,
    ) -> Self {
        Self::new(
            selector,
            ResolveFailureKind::Generic {
                message: Some(message.into()),
                causes: cause.into_iter().collect(),
            },
        )
    }

    /// Returns a copy of this failure that reports the given incoming paths.
    /// `self` is left untouched so it can be reported against other paths.
    pub fn with_incoming_paths(&self, paths: Vec<IncomingPath>) -> Self {
        ModuleVersionResolveError {
            selector: self.selector.clone(),
            kind: self.kind.clone(),
            paths,
        }
    }

    pub fn selector(&self) -> &ComponentSelector {
        &self.selector
    }

    pub fn kind(&self) -> &ResolveFailureKind {
        &self.kind
    }

    pub fn incoming_paths(&self) -> &[IncomingPath] {
        &self.paths
    }

    pub fn causes(&self) -> &[FailureCause] {
        match &self.kind {
            ResolveFailureKind::Generic { causes, .. } => causes,
            _ => &[],
        }
    }

    pub fn is_critical(&self) -> bool {
        self.causes().first().is_some_and(FailureCause::is_critical)
    }

    fn selector_is_dynamic(&self) -> bool {
        match &self.selector {
            ComponentSelector::Module(m) => {
                VersionSelector::parse(m.constraint.effective_version())
                    .map(|s| s.is_dynamic())
                    .unwrap_or(false)
            }
            ComponentSelector::Project { .. } => false,
        }
    }

    /// The headline of the failure, without details or paths.
    pub fn message(&self) -> String {
        match &self.kind {
            ResolveFailureKind::NotFound {
                unmatched_versions,
                rejected_versions,
                ..
            } => {
                if !unmatched_versions.is_empty() || !rejected_versions.is_empty() {
                    format!("Could not find any version that matches {}.", self.selector)
                } else if self.selector_is_dynamic() {
                    let module = match &self.selector {
                        ComponentSelector::Module(m) => m.module.to_string(),
                        ComponentSelector::Project { project, .. } => project.to_string(),
                    };
                    format!(
                        "Could not find any matches for {} as no versions of {} are available.",
                        self.selector, module
                    )
                } else {
                    format!("Could not find {}.", self.selector)
                }
            }
            ResolveFailureKind::ArtifactNotFound {
                component,
                artifact,
                ..
            } => format!("Could not find {artifact} ({component})."),
            ResolveFailureKind::RejectedByAttributes { version, .. } => format!(
                "Could not select a variant of {} version '{}' matching the requested attributes:",
                self.selector, version
            ),
            ResolveFailureKind::Generic { message, .. } => message
                .clone()
                .unwrap_or_else(|| format!("Could not resolve {}.", self.selector)),
        }
    }

    fn write_details(&self, out: &mut String) {
        match &self.kind {
            ResolveFailureKind::NotFound {
                attempted,
                unmatched_versions,
                rejected_versions,
            } => {
                if !unmatched_versions.is_empty() {
                    out.push_str("\nVersions that do not match:");
                    append_size_limited(out, unmatched_versions.iter().map(String::as_str), |_, _| {});
                }
                let by_rule = rejected_versions
                    .iter()
                    .filter(|r| matches!(r.reason, RejectionReason::ByRule(_)))
                    .collect::<Vec<_>>();
                if !by_rule.is_empty() {
                    out.push_str("\nVersions rejected by component selection rules:");
                    append_size_limited(out, by_rule.iter().map(|r| describe_rejection(r)), |_, _| {});
                }
                let by_attributes = rejected_versions
                    .iter()
                    .filter(|r| matches!(r.reason, RejectionReason::ByAttributes(_)))
                    .collect::<Vec<_>>();
                if !by_attributes.is_empty() {
                    out.push_str("\nVersions rejected by attribute matching:");
                    append_size_limited(
                        out,
                        by_attributes.iter().map(|r| r.version.clone()),
                        |out, i| {
                            if let RejectionReason::ByAttributes(matches) = &by_attributes[i].reason {
                                for m in matches {
                                    let _ = write!(out, "\n      - {m}");
                                }
                            }
                        },
                    );
                }
                append_locations(out, attempted);
            }
            ResolveFailureKind::ArtifactNotFound { attempted, .. } => {
                append_locations(out, attempted);
            }
            ResolveFailureKind::RejectedByAttributes { matches, .. } => {
                for m in matches {
                    let _ = write!(out, "\n  - {m}");
                }
            }
            ResolveFailureKind::Generic { .. } => {}
        }
    }
}

fn describe_rejection(rejected: &RejectedVersion) -> String {
    match &rejected.reason {
        RejectionReason::ByRule(Some(reason)) => format!("{} : {}", rejected.version, reason),
        _ => rejected.version.clone(),
    }
}

/// Lists at most [`MAX_LISTED_VERSIONS`] entries, then `+ N more`.
/// `after_entry` may append nested lines below the i-th entry.
fn append_size_limited<T: std::fmt::Display>(
    out: &mut String,
    values: impl ExactSizeIterator<Item = T>,
    mut after_entry: impl FnMut(&mut String, usize),
) {
    let total = values.len();
    for (i, value) in values.take(MAX_LISTED_VERSIONS).enumerate() {
        let _ = write!(out, "\n  - {value}");
        after_entry(out, i);
    }
    if total > MAX_LISTED_VERSIONS {
        let _ = write!(out, "\n  - + {} more", total - MAX_LISTED_VERSIONS);
    }
}

fn append_locations(out: &mut String, attempted: &[String]) {
    if attempted.is_empty() {
        return;
    }
    out.push_str("\nSearched in the following locations:");
    for location in attempted {
        let _ = write!(out, "\n  - {location}");
    }
}

impl std::fmt::Display for ModuleVersionResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = self.message();
        self.write_details(&mut out);
        if !self.paths.is_empty() {
            out.push_str("\nRequired by:");
            for path in &self.paths {
                let rendered = path
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" > ");
                let _ = write!(out, "\n    {rendered}");
            }
        }
        f.write_str(&out)
    }
}

impl std::error::Error for ModuleVersionResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes().first().map(FailureCause::as_std)
    }
}
