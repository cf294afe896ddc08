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

//! The read-only resolution graph handed out by the builder.
//!
//! Components and dependency results live in dense arenas and refer to each
//! other through [`ComponentIndex`] and [`DependencyIndex`].

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use petgraph::graphmap::DiGraphMap;
use resolveutil::{
    attributes::AttributeSet,
    identifier::{ComponentIdentifier, ComponentSelector, ModuleVersionIdentifier},
    reason::SelectionReason,
    variant::VariantRef,
};

use crate::failure::ModuleVersionResolveError;

/// Position of a component in a [`ResolutionResult`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ComponentIndex(u32);

impl ComponentIndex {
    /// Panics if `id` does not fit in a `u32`.
    pub fn new_usize(id: usize) -> Self {
        ComponentIndex(u32::try_from(id).expect("resolution result exceeds u32::MAX entries"))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Position of a dependency result in a [`ResolutionResult`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct DependencyIndex(u32);

impl DependencyIndex {
    /// Panics if `id` does not fit in a `u32`.
    pub fn new_usize(id: usize) -> Self {
        DependencyIndex(u32::try_from(id).expect("resolution result exceeds u32::MAX entries"))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Everything known about a component when it is visited, before any edges
/// are attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDetails {
    /// Process-local id used to wire edges. Not stable across runs.
    pub result_id: i64,
    pub module_version: ModuleVersionIdentifier,
    pub selection_reason: SelectionReason,
    pub component_id: ComponentIdentifier,
    pub all_variants: Vec<VariantRef>,
    /// Always a subset of `all_variants`.
    pub selected_variants: Vec<VariantRef>,
    pub repository_name: Option<String>,
}

impl ComponentDetails {
    /// Whether every variant of the component was selected.
    pub fn all_selected(&self) -> bool {
        self.all_variants.len() == self.selected_variants.len()
    }

    pub fn is_selected(&self, variant: &VariantRef) -> bool {
        self.selected_variants.contains(variant)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedComponentResult {
    pub(crate) details: ComponentDetails,
    pub(crate) dependencies: Vec<DependencyIndex>,
    pub(crate) dependents: Vec<DependencyIndex>,
    pub(crate) variant_dependencies: IndexMap<VariantRef, Vec<DependencyIndex>>,
}

impl ResolvedComponentResult {
    pub(crate) fn new(details: ComponentDetails) -> Self {
        ResolvedComponentResult {
            details,
            dependencies: vec![],
            dependents: vec![],
            variant_dependencies: IndexMap::new(),
        }
    }

    pub fn details(&self) -> &ComponentDetails {
        &self.details
    }

    pub fn result_id(&self) -> i64 {
        self.details.result_id
    }

    pub fn module_version(&self) -> &ModuleVersionIdentifier {
        &self.details.module_version
    }

    pub fn selection_reason(&self) -> &SelectionReason {
        &self.details.selection_reason
    }

    pub fn id(&self) -> &ComponentIdentifier {
        &self.details.component_id
    }

    pub fn all_variants(&self) -> &[VariantRef] {
        &self.details.all_variants
    }

    pub fn selected_variants(&self) -> &[VariantRef] {
        &self.details.selected_variants
    }

    pub fn repository_name(&self) -> Option<&str> {
        self.details.repository_name.as_deref()
    }

    /// Outgoing edges, in the order they were visited.
    pub fn dependencies(&self) -> &[DependencyIndex] {
        &self.dependencies
    }

    /// Resolved edges that selected this component.
    pub fn dependents(&self) -> &[DependencyIndex] {
        &self.dependents
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyOutcome {
    Resolved {
        selected: ComponentIndex,
        selected_variant: Option<VariantRef>,
    },
    Unresolved {
        failure: Arc<ModuleVersionResolveError>,
        /// Why the failed candidate was attempted.
        reason: SelectionReason,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyResult {
    pub(crate) from: ComponentIndex,
    pub(crate) from_variant: Option<VariantRef>,
    pub(crate) requested: ComponentSelector,
    pub(crate) constraint: bool,
    pub(crate) outcome: DependencyOutcome,
}

impl DependencyResult {
    pub fn from(&self) -> ComponentIndex {
        self.from
    }

    pub fn from_variant(&self) -> Option<&VariantRef> {
        self.from_variant.as_ref()
    }

    pub fn requested(&self) -> &ComponentSelector {
        &self.requested
    }

    pub fn is_constraint(&self) -> bool {
        self.constraint
    }

    pub fn outcome(&self) -> &DependencyOutcome {
        &self.outcome
    }

    pub fn selected(&self) -> Option<ComponentIndex> {
        match &self.outcome {
            DependencyOutcome::Resolved { selected, .. } => Some(*selected),
            DependencyOutcome::Unresolved { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ModuleVersionResolveError> {
        match &self.outcome {
            DependencyOutcome::Resolved { .. } => None,
            DependencyOutcome::Unresolved { failure, .. } => Some(failure),
        }
    }
}

/// A resolved dependency graph, rooted at one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionResult {
    pub(crate) root: ComponentIndex,
    pub(crate) request_attributes: AttributeSet,
    pub(crate) components: Vec<ResolvedComponentResult>,
    pub(crate) dependencies: Vec<DependencyResult>,
    pub(crate) by_result_id: HashMap<i64, ComponentIndex>,
}

impl ResolutionResult {
    pub fn root_index(&self) -> ComponentIndex {
        self.root
    }

    pub fn root(&self) -> &ResolvedComponentResult {
        self.component(self.root)
    }

    pub fn request_attributes(&self) -> &AttributeSet {
        &self.request_attributes
    }

    pub fn component(&self, index: ComponentIndex) -> &ResolvedComponentResult {
        &self.components[index.as_usize()]
    }

    pub fn dependency(&self, index: DependencyIndex) -> &DependencyResult {
        &self.dependencies[index.as_usize()]
    }

    pub fn find_by_result_id(&self, result_id: i64) -> Option<&ResolvedComponentResult> {
        self.by_result_id
            .get(&result_id)
            .map(|&index| self.component(index))
    }

    /// Every registered component, in visiting order. Components that are not
    /// reachable from the root are included.
    pub fn components(&self) -> impl Iterator<Item = (ComponentIndex, &ResolvedComponentResult)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentIndex::new_usize(i), c))
    }

    pub fn dependencies_of(
        &self,
        index: ComponentIndex,
    ) -> impl Iterator<Item = &DependencyResult> + '_ {
        self.component(index)
            .dependencies
            .iter()
            .map(|&d| self.dependency(d))
    }

    pub fn dependents_of(
        &self,
        index: ComponentIndex,
    ) -> impl Iterator<Item = &DependencyResult> + '_ {
        self.component(index)
            .dependents
            .iter()
            .map(|&d| self.dependency(d))
    }

    /// Edges declared by one variant of a component, or `None` when the
    /// variant declared no edges.
    pub fn dependencies_for_variant(
        &self,
        index: ComponentIndex,
        variant: &VariantRef,
    ) -> Option<Vec<&DependencyResult>> {
        self.component(index)
            .variant_dependencies
            .get(variant)
            .map(|deps| deps.iter().map(|&d| self.dependency(d)).collect())
    }

    /// Components reachable from the root through resolved edges, breadth
    /// first. Cycles are visited once.
    pub fn reachable_components(&self) -> Vec<ComponentIndex> {
        let mut seen = vec![false; self.components.len()];
        let mut order = vec![self.root];
        seen[self.root.as_usize()] = true;
        let mut next = 0;
        while next < order.len() {
            let current = order[next];
            next += 1;
            for dep in self.dependencies_of(current) {
                if let Some(target) = dep.selected()
                    && !seen[target.as_usize()]
                {
                    seen[target.as_usize()] = true;
                    order.push(target);
                }
            }
        }
        order
    }

    pub fn all_dependencies(&self) -> impl Iterator<Item = &DependencyResult> {
        self.dependencies.iter()
    }

    pub fn unresolved_dependencies(&self) -> impl Iterator<Item = &DependencyResult> {
        self.dependencies
            .iter()
            .filter(|d| matches!(d.outcome, DependencyOutcome::Unresolved { .. }))
    }

    /// The resolved part of the graph. Edges are labelled with the dependency
    /// result that created them; parallel edges collapse to the last one.
    pub fn graph(&self) -> DiGraphMap<ComponentIndex, DependencyIndex> {
        let mut graph = DiGraphMap::new();
        for (index, _) in self.components() {
            graph.add_node(index);
        }
        for (i, dep) in self.dependencies.iter().enumerate() {
            if let Some(target) = dep.selected() {
                graph.add_edge(dep.from, target, DependencyIndex::new_usize(i));
            }
        }
        graph
    }
}
