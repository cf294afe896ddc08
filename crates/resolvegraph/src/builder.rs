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

//! Accumulates visited components and edges into a [`ResolutionResult`].
//!
//! The builder is fed twice in practice: once by the graph walker during a
//! fresh resolution, and once by the serializer when a stored graph is read
//! back. In both cases components must be visited before edges point at them.

use std::{collections::HashMap, sync::Arc};

use resolveutil::{
    attributes::AttributeSet,
    identifier::{ComponentIdentifier, ComponentSelector, ModuleVersionIdentifier},
    reason::SelectionReason,
    variant::VariantRef,
};
use thiserror::Error;

use crate::{
    failure::{FailureCause, ModuleVersionResolveError},
    result::{
        ComponentDetails, ComponentIndex, DependencyIndex, DependencyOutcome, DependencyResult,
        ResolutionResult, ResolvedComponentResult,
    },
};

/// Message of the failure reported for every dependency lock violation.
pub const LOCK_STATE_OUT_OF_DATE: &str = "Dependency lock state out of date";

/// Structural errors. These mean the input is corrupt and are never
/// attached to the graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error(
        "Corrupt serialized resolution result. Cannot find component ({from}) that declares outgoing edges"
    )]
    UnknownSource { from: i64 },
    #[error(
        "Corrupt serialized resolution result. Cannot find selected module ({target}) for {}{requester} -> {requested}",
        constraint_prefix(.constraint)
    )]
    UnknownTarget {
        target: i64,
        constraint: bool,
        requester: String,
        requested: String,
    },
    #[error("Cannot find root component ({root}) of the resolution result")]
    MissingRoot { root: i64 },
}

fn constraint_prefix(constraint: &bool) -> &'static str {
    if *constraint { "constraint " } else { "" }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeTarget {
    Selected {
        result_id: i64,
        variant: Option<VariantRef>,
    },
    Failed {
        failure: Arc<ModuleVersionResolveError>,
        reason: SelectionReason,
    },
}

/// An outgoing edge as reported by the walker or the deserializer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphEdge {
    pub requested: ComponentSelector,
    pub constraint: bool,
    pub from_variant: Option<VariantRef>,
    pub target: EdgeTarget,
}

impl GraphEdge {
    pub fn selected(requested: ComponentSelector, result_id: i64, variant: Option<VariantRef>) -> Self {
        GraphEdge {
            requested,
            constraint: false,
            from_variant: None,
            target: EdgeTarget::Selected { result_id, variant },
        }
    }

    pub fn failed(
        requested: ComponentSelector,
        failure: ModuleVersionResolveError,
        reason: SelectionReason,
    ) -> Self {
        GraphEdge {
            requested,
            constraint: false,
            from_variant: None,
            target: EdgeTarget::Failed {
                failure: Arc::new(failure),
                reason,
            },
        }
    }

    pub fn declared_by(mut self, variant: Option<VariantRef>) -> Self {
        self.from_variant = variant;
        self
    }

    pub fn as_constraint(mut self, constraint: bool) -> Self {
        self.constraint = constraint;
        self
    }
}

/// A problem detected after the graph was built, reported against the root.
#[derive(Clone, Debug)]
pub struct ExtraFailure {
    pub selector: ComponentSelector,
    pub problem: FailureCause,
}

pub struct ResolutionResultGraphBuilder {
    request_attributes: AttributeSet,
    components: Vec<ResolvedComponentResult>,
    by_result_id: HashMap<i64, ComponentIndex>,
    dependencies: Vec<DependencyResult>,
}

impl ResolutionResultGraphBuilder {
    pub fn new(request_attributes: AttributeSet) -> Self {
        ResolutionResultGraphBuilder {
            request_attributes,
            components: vec![],
            by_result_id: HashMap::new(),
            dependencies: vec![],
        }
    }

    /// A graph made of a single root component without variants.
    pub fn empty(
        module_version: ModuleVersionIdentifier,
        component_id: ComponentIdentifier,
        request_attributes: AttributeSet,
    ) -> ResolutionResult {
        let root = ResolvedComponentResult::new(ComponentDetails {
            result_id: 0,
            module_version,
            selection_reason: SelectionReason::root(),
            component_id,
            all_variants: vec![],
            selected_variants: vec![],
            repository_name: None,
        });
        ResolutionResult {
            root: ComponentIndex::new_usize(0),
            request_attributes,
            components: vec![root],
            dependencies: vec![],
            by_result_id: HashMap::from([(0, ComponentIndex::new_usize(0))]),
        }
    }

    pub fn request_attributes(&self) -> &AttributeSet {
        &self.request_attributes
    }

    /// Registers a component. Only the first visit of a result id counts;
    /// later visits return the existing index and are otherwise ignored.
    pub fn visit_component(&mut self, details: ComponentDetails) -> ComponentIndex {
        if let Some(&existing) = self.by_result_id.get(&details.result_id) {
            return existing;
        }
        let index = ComponentIndex::new_usize(self.components.len());
        self.by_result_id.insert(details.result_id, index);
        self.components.push(ResolvedComponentResult::new(details));
        index
    }

    pub fn contains(&self, result_id: i64) -> bool {
        self.by_result_id.contains_key(&result_id)
    }

    /// Attaches the outgoing edges of an already visited component.
    ///
    /// Every selected target must have been visited. The edges are checked
    /// before any of them is added, so a corrupt batch leaves the builder
    /// untouched.
    pub fn visit_outgoing_edges(
        &mut self,
        from: i64,
        edges: impl IntoIterator<Item = GraphEdge>,
    ) -> Result<(), GraphError> {
        let from_index = *self
            .by_result_id
            .get(&from)
            .ok_or(GraphError::UnknownSource { from })?;
        let edges = edges.into_iter().collect::<Vec<_>>();

        let mut outcomes = Vec::with_capacity(edges.len());
        for edge in &edges {
            let outcome = match &edge.target {
                EdgeTarget::Selected { result_id, variant } => {
                    let Some(&selected) = self.by_result_id.get(result_id) else {
                        return Err(GraphError::UnknownTarget {
                            target: *result_id,
                            constraint: edge.constraint,
                            requester: self.components[from_index.as_usize()]
                                .id()
                                .display_name(),
                            requested: edge.requested.display_name(),
                        });
                    };
                    DependencyOutcome::Resolved {
                        selected,
                        selected_variant: variant.clone(),
                    }
                }
                EdgeTarget::Failed { failure, reason } => DependencyOutcome::Unresolved {
                    failure: failure.clone(),
                    reason: reason.clone(),
                },
            };
            outcomes.push(outcome);
        }

        for (edge, outcome) in edges.into_iter().zip(outcomes) {
            self.add_dependency(DependencyResult {
                from: from_index,
                from_variant: edge.from_variant,
                requested: edge.requested,
                constraint: edge.constraint,
                outcome,
            });
        }
        Ok(())
    }

    /// Reports each failure as an unresolved dependency of the root, selected
    /// because of dependency locking.
    pub fn add_extra_failures(
        &mut self,
        root: i64,
        failures: impl IntoIterator<Item = ExtraFailure>,
    ) -> Result<(), GraphError> {
        let edges = failures
            .into_iter()
            .map(|extra| {
                let failure = ModuleVersionResolveError::with_message(
                    extra.selector.clone(),
                    LOCK_STATE_OUT_OF_DATE,
                    Some(extra.problem),
                );
                GraphEdge::failed(extra.selector, failure, SelectionReason::dependency_locking())
            })
            .collect::<Vec<_>>();
        self.visit_outgoing_edges(root, edges)
    }

    fn add_dependency(&mut self, dependency: DependencyResult) {
        let index = DependencyIndex::new_usize(self.dependencies.len());
        let from = &mut self.components[dependency.from.as_usize()];
        from.dependencies.push(index);
        if let Some(variant) = &dependency.from_variant {
            from.variant_dependencies
                .entry(variant.clone())
                .or_default()
                .push(index);
        }
        if let Some(selected) = dependency.selected() {
            self.components[selected.as_usize()].dependents.push(index);
        }
        self.dependencies.push(dependency);
    }

    pub fn complete(self, root: i64) -> Result<ResolutionResult, GraphError> {
        let root_index = *self
            .by_result_id
            .get(&root)
            .ok_or(GraphError::MissingRoot { root })?;
        log::debug!(
            "resolution result complete: {} components, {} dependencies",
            self.components.len(),
            self.dependencies.len()
        );
        Ok(ResolutionResult {
            root: root_index,
            request_attributes: self.request_attributes,
            components: self.components,
            dependencies: self.dependencies,
            by_result_id: self.by_result_id,
        })
    }
}

#[cfg(test)]
mod test {
    use expect_test::expect;
    use resolveutil::reason::ComponentSelectionCause;
    use resolveutil::variant::ResolvedVariant;
    use test_log::test;

    use super::*;

    fn module(result_id: i64, name: &str, version: &str) -> ComponentDetails {
        let id = ModuleVersionIdentifier::new("org.example", name, version);
        let variant = ResolvedVariant::new(
            ComponentIdentifier::Module(id.clone()),
            "runtime",
            AttributeSet::empty().with("usage", "runtime"),
            vec![],
        )
        .into_ref();
        ComponentDetails {
            result_id,
            module_version: id.clone(),
            selection_reason: SelectionReason::requested(),
            component_id: ComponentIdentifier::Module(id),
            all_variants: vec![variant.clone()],
            selected_variants: vec![variant],
            repository_name: Some("local".into()),
        }
    }

    fn root() -> ComponentDetails {
        ComponentDetails {
            result_id: 0,
            module_version: ModuleVersionIdentifier::new("org.example", "app", "unspecified"),
            selection_reason: SelectionReason::root(),
            component_id: ComponentIdentifier::project(":", ":"),
            all_variants: vec![],
            selected_variants: vec![],
            repository_name: None,
        }
    }

    #[test]
    fn first_visit_wins() {
        let mut builder = ResolutionResultGraphBuilder::new(AttributeSet::empty());
        builder.visit_component(root());
        let first = builder.visit_component(module(1, "lib", "1.0"));
        let second = builder.visit_component(module(1, "lib", "2.0"));
        assert_eq!(first, second);
        let result = builder.complete(0).unwrap();
        assert_eq!(result.components().count(), 2);
        assert_eq!(
            result.find_by_result_id(1).unwrap().module_version().version,
            "1.0"
        );
    }

    #[test]
    fn selected_target_must_be_visited() {
        let mut builder = ResolutionResultGraphBuilder::new(AttributeSet::empty());
        builder.visit_component(root());
        let requested = ComponentSelector::module("org.example", "lib", "1.0");
        let err = builder
            .visit_outgoing_edges(0, [GraphEdge::selected(requested.clone(), 7, None)])
            .unwrap_err();
        expect!["Corrupt serialized resolution result. Cannot find selected module (7) for project : -> org.example:lib:1.0"]
            .assert_eq(&err.to_string());

        let err = builder
            .visit_outgoing_edges(0, [GraphEdge::selected(requested, 7, None).as_constraint(true)])
            .unwrap_err();
        expect!["Corrupt serialized resolution result. Cannot find selected module (7) for constraint project : -> org.example:lib:1.0"]
            .assert_eq(&err.to_string());

        let result = builder.complete(0).unwrap();
        assert_eq!(result.all_dependencies().count(), 0);
    }

    #[test]
    fn edges_from_unknown_component() {
        let mut builder = ResolutionResultGraphBuilder::new(AttributeSet::empty());
        let err = builder.visit_outgoing_edges(3, []).unwrap_err();
        assert_eq!(err, GraphError::UnknownSource { from: 3 });
        assert_eq!(
            builder.complete(0).unwrap_err(),
            GraphError::MissingRoot { root: 0 }
        );
    }

    #[test]
    fn diamonds_and_cycles() {
        let mut builder = ResolutionResultGraphBuilder::new(AttributeSet::empty());
        builder.visit_component(root());
        builder.visit_component(module(1, "a", "1.0"));
        builder.visit_component(module(2, "b", "1.0"));
        builder.visit_component(module(3, "c", "1.0"));
        let sel = |n: &str| ComponentSelector::module("org.example", n, "1.0");
        builder
            .visit_outgoing_edges(
                0,
                [
                    GraphEdge::selected(sel("a"), 1, None),
                    GraphEdge::selected(sel("b"), 2, None),
                ],
            )
            .unwrap();
        builder
            .visit_outgoing_edges(1, [GraphEdge::selected(sel("c"), 3, None)])
            .unwrap();
        builder
            .visit_outgoing_edges(2, [GraphEdge::selected(sel("c"), 3, None)])
            .unwrap();
        // c depends back on a
        builder
            .visit_outgoing_edges(3, [GraphEdge::selected(sel("a"), 1, None)])
            .unwrap();
        let result = builder.complete(0).unwrap();

        let c = result.find_by_result_id(3).unwrap();
        assert_eq!(c.dependents().len(), 2);
        let a = result.find_by_result_id(1).unwrap();
        assert_eq!(a.dependents().len(), 2);
        let reachable = result
            .reachable_components()
            .into_iter()
            .map(|i| result.component(i).module_version().to_string())
            .collect::<Vec<_>>();
        expect![[r#"
            [
                "org.example:app:unspecified",
                "org.example:a:1.0",
                "org.example:b:1.0",
                "org.example:c:1.0",
            ]
        "#]]
        .assert_debug_eq(&reachable);
        assert!(petgraph::algo::is_cyclic_directed(&result.graph()));
    }

    #[test]
    fn edges_are_attached_to_their_variant() {
        let mut builder = ResolutionResultGraphBuilder::new(AttributeSet::empty());
        builder.visit_component(root());
        let a = module(1, "a", "1.0");
        let variant = a.selected_variants[0].clone();
        builder.visit_component(a);
        builder.visit_component(module(2, "b", "1.0"));
        let sel = ComponentSelector::module("org.example", "b", "1.0");
        builder
            .visit_outgoing_edges(0, [GraphEdge::selected(
                ComponentSelector::module("org.example", "a", "1.0"),
                1,
                Some(variant.clone()),
            )])
            .unwrap();
        builder
            .visit_outgoing_edges(
                1,
                [
                    GraphEdge::selected(sel.clone(), 2, None).declared_by(Some(variant.clone())),
                    GraphEdge::selected(sel, 2, None),
                ],
            )
            .unwrap();
        let result = builder.complete(0).unwrap();
        let index = result.dependency(result.root().dependencies()[0]).selected().unwrap();
        let a = result.component(index);
        assert_eq!(a.dependencies().len(), 2);
        assert_eq!(result.dependencies_for_variant(index, &variant).unwrap().len(), 1);
        let other =
            ResolvedVariant::new(a.id().clone(), "api", AttributeSet::empty(), vec![]).into_ref();
        assert!(result.dependencies_for_variant(index, &other).is_none());
    }

    #[test]
    fn lock_failures_attach_to_root() {
        let mut builder = ResolutionResultGraphBuilder::new(AttributeSet::empty());
        builder.visit_component(root());
        builder
            .add_extra_failures(
                0,
                [ExtraFailure {
                    selector: ComponentSelector::module("org.example", "lib", "1.0"),
                    problem: FailureCause::message(
                        "Did not resolve 'org.example:lib:1.0' which is part of the dependency lock state",
                    ),
                }],
            )
            .unwrap();
        let result = builder.complete(0).unwrap();
        let unresolved = result.unresolved_dependencies().collect::<Vec<_>>();
        assert_eq!(unresolved.len(), 1);
        let DependencyOutcome::Unresolved { failure, reason } = unresolved[0].outcome() else {
            panic!("expected an unresolved dependency");
        };
        assert_eq!(failure.message(), LOCK_STATE_OUT_OF_DATE);
        assert!(reason.has_cause(ComponentSelectionCause::Constraint));
        expect!["Dependency locking"].assert_eq(&reason.to_string());
        expect!["Did not resolve 'org.example:lib:1.0' which is part of the dependency lock state"]
            .assert_eq(&failure.causes()[0].to_string());
    }

    #[test]
    fn empty_graph() {
        let result = ResolutionResultGraphBuilder::empty(
            ModuleVersionIdentifier::new("org.example", "app", "1.0"),
            ComponentIdentifier::project(":", ":"),
            AttributeSet::empty().with("usage", "runtime"),
        );
        assert_eq!(result.components().count(), 1);
        assert!(result.root().all_variants().is_empty());
        expect!["root"].assert_eq(&result.root().selection_reason().to_string());
        expect!["{usage=runtime}"].assert_eq(&result.request_attributes().to_string());
    }
}
