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

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use resolveutil::{
    attributes::AttributeSet,
    identifier::{
        ComponentIdentifier, ComponentSelector, ModuleComponentSelector, ModuleIdentifier,
        ModuleVersionIdentifier, VersionConstraint,
    },
    reason::{ComponentSelectionCause, SelectionDescriptor, SelectionReason},
    variant::{ResolvedVariant, VariantRef},
    version::{VersionSelector, compare_versions},
};

use super::{Resolver, RootComponent, env::ResolverEnv, variants::select_variant};
use crate::{
    builder::{EdgeTarget, GraphEdge, ResolutionResultGraphBuilder},
    failure::ModuleVersionResolveError,
    repository::{ComponentMetadata, DependencyMetadata},
    result::{ComponentDetails, ResolutionResult},
    search::FoundComponent,
};

/// Resolves a dependency graph in three steps: gather every candidate
/// version reachable from the root, keep the highest version of each module,
/// then walk the graph again following only the winners and selecting
/// variants along the way.
pub struct GraphWalker;

impl Resolver for GraphWalker {
    fn resolve(&mut self, env: &mut ResolverEnv, root: &RootComponent) -> Option<ResolutionResult> {
        let gathered = gather(env, root);
        let winners = select_winners(gathered);
        Walk::new(env, winners, root).run()
    }
}

fn selector_of(dep: &DependencyMetadata) -> ModuleComponentSelector {
    ModuleComponentSelector {
        module: dep.module.clone(),
        constraint: dep.version.clone(),
        attributes: dep.attributes.clone(),
        capabilities: dep.capabilities.clone(),
    }
}

fn exact_selector(id: &ModuleVersionIdentifier) -> ModuleComponentSelector {
    ModuleComponentSelector::new(id.module.clone(), VersionConstraint::required(id.version.clone()))
}

/// Every component version reachable from the root, per module, in the
/// order they were first seen.
///
/// A constraint only contributes candidates once a hard dependency has
/// reached its module. Until then it is kept pending.
fn gather(env: &mut ResolverEnv, root: &RootComponent) -> HashMap<ModuleIdentifier, Vec<FoundComponent>> {
    let mut gathered = HashMap::<ModuleIdentifier, Vec<FoundComponent>>::new();
    let mut visited = HashSet::new();
    let mut reached = HashSet::<ModuleIdentifier>::new();
    let mut pending = HashMap::<ModuleIdentifier, Vec<ModuleComponentSelector>>::new();
    let mut working_list = root
        .dependencies
        .iter()
        .rev()
        .map(|dep| (selector_of(dep), dep.constraint))
        .collect::<Vec<_>>();

    log::debug!("Gathering candidate versions for {}", root.component_id);
    // Do a DFS in the graph. Failures are reported on the edges later.
    while let Some((selector, constraint)) = working_list.pop() {
        if constraint {
            if !reached.contains(&selector.module) {
                log::debug!("-- pending constraint {}", selector);
                pending.entry(selector.module.clone()).or_default().push(selector);
                continue;
            }
        } else if reached.insert(selector.module.clone())
            && let Some(constraints) = pending.remove(&selector.module)
        {
            working_list.extend(constraints.into_iter().rev().map(|c| (c, false)));
        }
        let Ok(found) = env.resolve(&selector) else {
            continue;
        };
        let id = found.metadata.id.clone();
        let versions = gathered.entry(id.module.clone()).or_default();
        if !versions.iter().any(|f| f.metadata.id == id) {
            log::debug!("-- seen {} from {}", id, found.repository);
            versions.push(found.clone());
        }
        if !visited.insert(id) {
            continue;
        }
        for variant in found.metadata.variants.iter().rev() {
            if let Some(target) = &variant.available_at {
                working_list.push((exact_selector(target), false));
            }
            working_list.extend(
                variant
                    .dependencies
                    .iter()
                    .rev()
                    .map(|dep| (selector_of(dep), dep.constraint)),
            );
        }
    }
    gathered
}

#[derive(Clone)]
struct Winner {
    found: FoundComponent,
    reason: SelectionReason,
}

fn describe_conflict(mut versions: Vec<&str>) -> String {
    versions.sort_by(|a, b| compare_versions(b, a));
    match versions.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            format!("between versions {} and {}", rest.join(", "), last)
        }
        _ => format!("between versions {}", versions.join(", ")),
    }
}

/// Keeps the highest version of each module. Equal versions keep the one
/// seen first.
fn select_winners(
    gathered: HashMap<ModuleIdentifier, Vec<FoundComponent>>,
) -> HashMap<ModuleIdentifier, Winner> {
    let mut winners = HashMap::new();
    for (module, candidates) in gathered {
        let Some((first, rest)) = candidates.split_first() else {
            continue;
        };
        let mut best = first;
        for candidate in rest {
            if compare_versions(&candidate.metadata.id.version, &best.metadata.id.version)
                == Ordering::Greater
            {
                best = candidate;
            }
        }
        let mut reason = SelectionReason::requested();
        if candidates.len() > 1 {
            reason.add(SelectionDescriptor::with_description(
                ComponentSelectionCause::ConflictResolution,
                describe_conflict(
                    candidates
                        .iter()
                        .map(|c| c.metadata.id.version.as_str())
                        .collect(),
                ),
            ));
        }
        log::debug!("-- selected {} ({})", best.metadata.id, reason);
        winners.insert(
            module,
            Winner {
                found: best.clone(),
                reason,
            },
        );
    }
    winners
}

/// Describes how `version` violates the strict or reject parts of
/// `constraint`, if it does.
fn constraint_violation(
    module: &ModuleIdentifier,
    constraint: &VersionConstraint,
    version: &str,
) -> Option<String> {
    let accepted_by = |selector: &str| VersionSelector::parse(selector).is_ok_and(|s| s.accepts(version));
    let strict_violated = constraint.is_strict() && !accepted_by(&constraint.strictly);
    let rejected = constraint.rejected.iter().any(|r| accepted_by(r.as_str()));
    (strict_violated || rejected).then(|| {
        format!(
            "Cannot find a version of '{module}' that satisfies the version constraints {constraint}: '{version}' was selected"
        )
    })
}

enum PendingTarget {
    Selected { node: usize, variant: Option<usize> },
    Failed {
        failure: ModuleVersionResolveError,
        reason: SelectionReason,
    },
}

struct PendingEdge {
    requested: ComponentSelector,
    constraint: bool,
    from_variant: Option<usize>,
    target: PendingTarget,
}

struct Node {
    module_version: ModuleVersionIdentifier,
    component_id: ComponentIdentifier,
    reason: SelectionReason,
    repository: Option<String>,
    metadata: Option<Arc<ComponentMetadata>>,
    variants: Vec<VariantRef>,
    selected: BTreeSet<usize>,
    /// Variant index -> `(node, variant)` of the variant it is available at.
    externals: HashMap<usize, (usize, usize)>,
    /// The node this one was first reached from.
    parent: Option<usize>,
    edges: Vec<PendingEdge>,
}

impl Node {
    fn result_id(index: usize) -> i64 {
        index as i64
    }
}

struct Walk<'w, 'a> {
    env: &'w mut ResolverEnv<'a>,
    root: &'w RootComponent,
    winners: HashMap<ModuleIdentifier, Winner>,
    nodes: Vec<Node>,
    by_id: HashMap<ModuleVersionIdentifier, usize>,
    creating: HashSet<ModuleVersionIdentifier>,
    queue: VecDeque<(usize, Option<usize>)>,
    /// Constraint edges, attached once it is known which modules are in
    /// the graph.
    constraints: Vec<(usize, Option<usize>, DependencyMetadata)>,
}

impl<'w, 'a> Walk<'w, 'a> {
    fn new(
        env: &'w mut ResolverEnv<'a>,
        winners: HashMap<ModuleIdentifier, Winner>,
        root: &'w RootComponent,
    ) -> Self {
        let root_node = Node {
            module_version: root.module_version.clone(),
            component_id: root.component_id.clone(),
            reason: SelectionReason::root(),
            repository: None,
            metadata: None,
            variants: vec![],
            selected: BTreeSet::new(),
            externals: HashMap::new(),
            parent: None,
            edges: vec![],
        };
        Walk {
            env,
            root,
            winners,
            nodes: vec![root_node],
            by_id: HashMap::new(),
            creating: HashSet::new(),
            queue: VecDeque::from([(0, None)]),
            constraints: vec![],
        }
    }

    fn run(mut self) -> Option<ResolutionResult> {
        log::debug!("Building resolution result");
        while let Some((node, variant)) = self.queue.pop_front() {
            self.expand(node, variant);
        }
        self.attach_constraints();
        self.emit()
    }

    fn node_for(&mut self, winner: &Winner, parent: usize) -> usize {
        let metadata = winner.found.metadata.clone();
        let id = &metadata.id;
        if let Some(&index) = self.by_id.get(id) {
            return index;
        }
        let owner = ComponentIdentifier::Module(id.clone());
        self.creating.insert(id.clone());
        let mut variants = Vec::with_capacity(metadata.variants.len());
        let mut externals = HashMap::new();
        for (i, v) in metadata.variants.iter().enumerate() {
            let external = v
                .available_at
                .as_ref()
                .and_then(|target| self.external_variant(target, &v.attributes, parent));
            let external_ref = external.map(|(node, variant)| {
                externals.insert(i, (node, variant));
                self.nodes[node].variants[variant].clone()
            });
            variants.push(
                ResolvedVariant::new(
                    owner.clone(),
                    v.name.clone(),
                    v.attributes.clone(),
                    v.capabilities_or_implicit(id),
                )
                .with_external_variant(external_ref)
                .into_ref(),
            );
        }
        self.creating.remove(id);

        let index = self.nodes.len();
        log::debug!("---- {} -> {}", id, index);
        self.nodes.push(Node {
            module_version: id.clone(),
            component_id: owner,
            reason: winner.reason.clone(),
            repository: Some(winner.found.repository.clone()),
            metadata: Some(metadata.clone()),
            variants,
            selected: BTreeSet::new(),
            externals,
            parent: Some(parent),
            edges: vec![],
        });
        self.by_id.insert(id.clone(), index);
        index
    }

    /// The node and variant that a variant published at `target` points to.
    fn external_variant(
        &mut self,
        target: &ModuleVersionIdentifier,
        attributes: &AttributeSet,
        parent: usize,
    ) -> Option<(usize, usize)> {
        if self.creating.contains(target) {
            log::warn!("Ignoring circular available-at reference to {}", target);
            return None;
        }
        let winner = self.winners.get(&target.module)?.clone();
        let node = self.node_for(&winner, parent);
        let metadata = self.nodes[node].metadata.clone()?;
        let requested = ComponentSelector::Module(exact_selector(target));
        let variant = select_variant(&requested, &metadata, attributes, &[]).ok()?;
        Some((node, variant))
    }

    fn select(&mut self, node: usize, variant: usize) {
        if self.nodes[node].selected.insert(variant) {
            self.queue.push_back((node, Some(variant)));
        }
    }

    fn expand(&mut self, node: usize, variant: Option<usize>) {
        let dependencies = match (variant, &self.nodes[node].metadata) {
            (Some(v), Some(metadata)) => metadata.variants[v].dependencies.clone(),
            _ => self.root.dependencies.clone(),
        };
        for dep in dependencies {
            if dep.constraint {
                self.constraints.push((node, variant, dep));
                continue;
            }
            let edge = self.edge_for(node, variant, &dep);
            self.nodes[node].edges.push(edge);
        }

        let external = variant.and_then(|v| self.nodes[node].externals.get(&v).copied());
        if let (Some(from_variant), Some((target, target_variant))) = (variant, external) {
            let requested =
                ComponentSelector::Module(exact_selector(&self.nodes[target].module_version));
            self.select(target, target_variant);
            self.nodes[node].edges.push(PendingEdge {
                requested,
                constraint: false,
                from_variant: Some(from_variant),
                target: PendingTarget::Selected {
                    node: target,
                    variant: Some(target_variant),
                },
            });
        }
    }

    fn edge_for(&mut self, from: usize, from_variant: Option<usize>, dep: &DependencyMetadata) -> PendingEdge {
        let selector = selector_of(dep);
        let requested = ComponentSelector::Module(selector.clone());
        let target = match self.env.resolve(&selector) {
            Err(failure) => PendingTarget::Failed {
                failure: (*failure).clone(),
                reason: SelectionReason::requested(),
            },
            Ok(found) => {
                let winner = self.winners.get(&dep.module).cloned().unwrap_or(Winner {
                    found,
                    reason: SelectionReason::requested(),
                });
                self.target_for(from, &requested, dep, winner)
            }
        };
        PendingEdge {
            requested,
            constraint: false,
            from_variant,
            target,
        }
    }

    fn target_for(
        &mut self,
        from: usize,
        requested: &ComponentSelector,
        dep: &DependencyMetadata,
        winner: Winner,
    ) -> PendingTarget {
        let selected = &winner.found.metadata.id;
        if let Some(message) = constraint_violation(&dep.module, &dep.version, &selected.version) {
            return PendingTarget::Failed {
                failure: ModuleVersionResolveError::with_message(requested.clone(), message, None),
                reason: winner.reason,
            };
        }
        let node = self.node_for(&winner, from);
        let attributes = self.root.attributes.concat(&dep.attributes);
        match select_variant(requested, &winner.found.metadata, &attributes, &dep.capabilities) {
            Ok(variant) => {
                self.select(node, variant);
                PendingTarget::Selected {
                    node,
                    variant: Some(variant),
                }
            }
            Err(failure) => PendingTarget::Failed {
                failure,
                reason: winner.reason,
            },
        }
    }

    fn attach_constraints(&mut self) {
        for (from, from_variant, dep) in std::mem::take(&mut self.constraints) {
            let Some(winner) = self.winners.get(&dep.module) else {
                continue;
            };
            let Some(&node) = self.by_id.get(&winner.found.metadata.id) else {
                continue;
            };
            if self.nodes[node].selected.is_empty() {
                continue;
            }
            let requested = ComponentSelector::Module(selector_of(&dep));
            let target = match constraint_violation(&dep.module, &dep.version, &winner.found.metadata.id.version) {
                Some(message) => PendingTarget::Failed {
                    failure: ModuleVersionResolveError::with_message(requested.clone(), message, None),
                    reason: winner.reason.clone(),
                },
                None => {
                    let mut reason = self.nodes[node].reason.clone();
                    reason.add(SelectionDescriptor::of(ComponentSelectionCause::Constraint));
                    self.nodes[node].reason = reason;
                    PendingTarget::Selected {
                        node,
                        variant: None,
                    }
                }
            };
            self.nodes[from].edges.push(PendingEdge {
                requested,
                constraint: true,
                from_variant,
                target,
            });
        }
    }

    /// Component ids from the root down to `node`, following first discovery.
    fn path_to(&self, node: usize) -> Vec<ComponentIdentifier> {
        let mut path = vec![];
        let mut current = Some(node);
        while let Some(index) = current {
            path.push(self.nodes[index].component_id.clone());
            current = self.nodes[index].parent;
        }
        path.reverse();
        path
    }

    fn emit(mut self) -> Option<ResolutionResult> {
        let mut builder = ResolutionResultGraphBuilder::new(self.root.attributes.clone());
        for (index, node) in self.nodes.iter().enumerate() {
            let variants = &node.variants;
            builder.visit_component(ComponentDetails {
                result_id: Node::result_id(index),
                module_version: node.module_version.clone(),
                selection_reason: node.reason.clone(),
                component_id: node.component_id.clone(),
                all_variants: variants.clone(),
                selected_variants: node.selected.iter().map(|&i| variants[i].clone()).collect(),
                repository_name: node.repository.clone(),
            });
        }

        for index in 0..self.nodes.len() {
            let pending = std::mem::take(&mut self.nodes[index].edges);
            let edges = pending
                .into_iter()
                .map(|edge| self.graph_edge(index, edge))
                .collect::<Vec<_>>();
            if let Err(e) = builder.visit_outgoing_edges(Node::result_id(index), edges) {
                self.env.report_error(e.into());
                return None;
            }
        }

        if let Some((state, mode)) = self.env.lock_state() {
            let failures = state.validate(self.nodes.iter().skip(1).map(|n| &n.module_version), mode);
            if let Err(e) = builder.add_extra_failures(0, failures) {
                self.env.report_error(e.into());
                return None;
            }
        }

        match builder.complete(0) {
            Ok(result) => Some(result),
            Err(e) => {
                self.env.report_error(e.into());
                None
            }
        }
    }

    fn graph_edge(&self, from: usize, edge: PendingEdge) -> GraphEdge {
        let from_variant = edge
            .from_variant
            .map(|v| self.nodes[from].variants[v].clone());
        let target = match edge.target {
            PendingTarget::Selected { node, variant } => EdgeTarget::Selected {
                result_id: Node::result_id(node),
                variant: variant.map(|v| self.nodes[node].variants[v].clone()),
            },
            PendingTarget::Failed { failure, reason } => EdgeTarget::Failed {
                failure: Arc::new(failure.with_incoming_paths(vec![self.path_to(from)])),
                reason,
            },
        };
        GraphEdge {
            requested: edge.requested,
            constraint: edge.constraint,
            from_variant,
            target,
        }
    }
}

#[cfg(test)]
mod test {
    use resolveutil::config::LockMode;
    use test_log::test;

    use super::*;
    use crate::{
        failure::ResolveFailureKind,
        lock::DependencyLockState,
        repository::{
            RepositoryList, VariantMetadata,
            mock::{MockRepository, create_mock_component},
        },
        resolver::resolve_with_default_env,
        result::DependencyResult,
    };

    fn root() -> RootComponent {
        RootComponent::new(
            ModuleVersionIdentifier::new("org.example", "app", "1.0"),
            ComponentIdentifier::project(":", ":"),
            AttributeSet::empty().with("usage", "runtime"),
        )
    }

    fn resolve(repo: MockRepository, root: &RootComponent) -> ResolutionResult {
        let repos = RepositoryList::new().with_repository(Box::new(repo));
        resolve_with_default_env(&repos, &mut GraphWalker, root).unwrap()
    }

    fn describe(result: &ResolutionResult) -> String {
        let mut out = String::new();
        for index in result.reachable_components() {
            let component = result.component(index);
            out.push_str(&format!(
                "{} ({})\n",
                component.id(),
                component.selection_reason()
            ));
            for dep in result.dependencies_of(index) {
                let target = match dep.selected() {
                    Some(selected) => result.component(selected).id().to_string(),
                    None => "FAILED".to_string(),
                };
                out.push_str(&format!("  {} -> {}\n", dep.requested(), target));
            }
        }
        out
    }

    fn constraint_on(module: &str, version: VersionConstraint) -> DependencyMetadata {
        DependencyMetadata {
            module: module.parse().unwrap(),
            version,
            constraint: true,
            attributes: AttributeSet::empty(),
            capabilities: vec![],
        }
    }

    fn failures(result: &ResolutionResult) -> Vec<&DependencyResult> {
        result.unresolved_dependencies().collect()
    }

    #[test]
    fn highest_version_wins_conflicts() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:c", "1.0")])
            .add_module_full("org.example:b", "1.0", [("org.example:c", "1.1")])
            .add_module_full("org.example:c", "1.0", [])
            .add_module_full("org.example:c", "1.1", []);
        let root = root()
            .depends_on("org.example:a", "1.0")
            .unwrap()
            .depends_on("org.example:b", "1.0")
            .unwrap();
        let result = resolve(repo, &root);
        expect_test::expect![[r#"
            project : (root)
              org.example:a:1.0 -> org.example:a:1.0
              org.example:b:1.0 -> org.example:b:1.0
            org.example:a:1.0 (requested)
              org.example:c:1.0 -> org.example:c:1.1
            org.example:b:1.0 (requested)
              org.example:c:1.1 -> org.example:c:1.1
            org.example:c:1.1 (requested, between versions 1.1 and 1.0)
        "#]]
        .assert_eq(&describe(&result));
        assert_eq!(result.components().count(), 4);
        let c = result
            .components()
            .find(|(_, c)| c.module_version().name() == "c")
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(result.dependents_of(c).count(), 2);
        assert_eq!(result.component(c).repository_name(), Some("repo"));
    }

    #[test]
    fn cycles_are_walked_once() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:b", "1.0")])
            .add_module_full("org.example:b", "1.0", [("org.example:a", "1.0")]);
        let root = root().depends_on("org.example:a", "1.0").unwrap();
        let result = resolve(repo, &root);
        assert_eq!(result.components().count(), 3);
        assert_eq!(result.all_dependencies().count(), 3);
        assert!(petgraph::algo::is_cyclic_directed(&result.graph()));
    }

    #[test]
    fn missing_module_is_a_failed_edge() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:missing", "2.0")]);
        let root = root().depends_on("org.example:a", "1.0").unwrap();
        let result = resolve(repo, &root);

        let failed = failures(&result);
        assert_eq!(failed.len(), 1);
        let failure = failed[0].failure().unwrap();
        assert_eq!(
            failure.selector(),
            &ComponentSelector::module("org.example", "missing", "2.0")
        );
        assert!(matches!(failure.kind(), ResolveFailureKind::NotFound { .. }));
        assert_eq!(
            failure.incoming_paths(),
            &[vec![
                ComponentIdentifier::project(":", ":"),
                ComponentIdentifier::module("org.example", "a", "1.0"),
            ]]
        );
    }

    #[test]
    fn strict_constraint_violated_by_conflict_resolution() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:c", "1.1")])
            .add_module_full("org.example:c", "1.0", [])
            .add_module_full("org.example:c", "1.1", []);
        let root = root()
            .depends_on("org.example:a", "1.0")
            .unwrap()
            .with_dependency(DependencyMetadata {
                module: "org.example:c".parse().unwrap(),
                version: VersionConstraint::strictly("1.0"),
                constraint: false,
                attributes: AttributeSet::empty(),
                capabilities: vec![],
            });
        let result = resolve(repo, &root);

        let failed = failures(&result);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].from(), result.root_index());
        expect_test::expect![[r#"Cannot find a version of 'org.example:c' that satisfies the version constraints {strictly 1.0}: '1.1' was selected"#]]
            .assert_eq(&failed[0].failure().unwrap().message());
    }

    #[test]
    fn rejected_version_fails_the_edge() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:c", "1.1")])
            .add_module_full("org.example:c", "1.1", []);
        let root = root().depends_on("org.example:a", "1.0").unwrap().with_dependency(
            constraint_on(
                "org.example:c",
                VersionConstraint {
                    rejected: vec!["1.1".into()],
                    ..Default::default()
                },
            ),
        );
        let result = resolve(repo, &root);
        let failed = failures(&result);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_constraint());
    }

    #[test]
    fn constraints_only_apply_to_modules_in_the_graph() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [])
            .add_module_full("org.example:absent", "1.0", []);
        let root = root()
            .depends_on("org.example:a", "1.0")
            .unwrap()
            .with_dependency(constraint_on(
                "org.example:a",
                VersionConstraint::required("1.0"),
            ))
            .with_dependency(constraint_on(
                "org.example:absent",
                VersionConstraint::required("1.0"),
            ));
        let result = resolve(repo, &root);

        assert_eq!(result.components().count(), 2);
        let deps = result.dependencies_of(result.root_index()).collect::<Vec<_>>();
        assert_eq!(deps.len(), 2);
        assert!(!deps[0].is_constraint());
        assert!(deps[1].is_constraint());
        assert_eq!(deps[0].selected(), deps[1].selected());
        let a = result.component(deps[0].selected().unwrap());
        assert!(a.selection_reason().is_constrained());
    }

    #[test]
    fn constraint_on_absent_module_does_not_upgrade() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:c", "1.0")])
            .add_module_full("org.example:absent", "1.0", [("org.example:c", "2.0")])
            .add_module_full("org.example:c", "1.0", [])
            .add_module_full("org.example:c", "2.0", []);
        let root = root()
            .depends_on("org.example:a", "1.0")
            .unwrap()
            .with_dependency(constraint_on(
                "org.example:absent",
                VersionConstraint::required("1.0"),
            ));
        let result = resolve(repo, &root);

        expect_test::expect![[r#"
            project : (root)
              org.example:a:1.0 -> org.example:a:1.0
            org.example:a:1.0 (requested)
              org.example:c:1.0 -> org.example:c:1.0
            org.example:c:1.0 (requested)
        "#]]
        .assert_eq(&describe(&result));
    }

    #[test]
    fn constraint_applies_once_its_module_is_reached() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", [("org.example:b", "1.0")])
            .add_module_full("org.example:b", "1.0", [])
            .add_module_full("org.example:b", "1.1", []);
        let root = root()
            .with_dependency(constraint_on(
                "org.example:b",
                VersionConstraint::required("1.1"),
            ))
            .depends_on("org.example:a", "1.0")
            .unwrap();
        let result = resolve(repo, &root);

        let (_, b) = result
            .components()
            .find(|(_, c)| c.module_version().name() == "b")
            .unwrap();
        assert_eq!(b.module_version().version, "1.1");
        assert!(b.selection_reason().is_constrained());
    }

    #[test]
    fn variant_selection_failure_is_reported_on_the_edge() {
        let mut repo = MockRepository::new("repo");
        let mut docs = create_mock_component("org.example:docs", "1.0", []);
        docs.variants[0].name = "javadoc".into();
        docs.variants[0].attributes = AttributeSet::empty().with("usage", "javadoc");
        repo.add_component(docs);
        let root = root().depends_on("org.example:docs", "1.0").unwrap();
        let result = resolve(repo, &root);

        let failed = failures(&result);
        assert_eq!(failed.len(), 1);
        assert!(matches!(
            failed[0].failure().unwrap().kind(),
            ResolveFailureKind::RejectedByAttributes { .. }
        ));
    }

    #[test]
    fn available_at_links_external_variants() {
        let mut repo = MockRepository::new("repo");
        let mut kmp = create_mock_component("org.example:kmp", "1.0", []);
        kmp.variants[0] = VariantMetadata {
            name: "jvmRuntime".into(),
            attributes: AttributeSet::empty().with("usage", "runtime"),
            capabilities: vec![],
            dependencies: vec![],
            available_at: Some(ModuleVersionIdentifier::new("org.example", "kmp-jvm", "1.0")),
        };
        repo.add_component(kmp)
            .add_module_full("org.example:kmp-jvm", "1.0", []);
        let root = root().depends_on("org.example:kmp", "1.0").unwrap();
        let result = resolve(repo, &root);

        expect_test::expect![[r#"
            project : (root)
              org.example:kmp:1.0 -> org.example:kmp:1.0
            org.example:kmp:1.0 (requested)
              org.example:kmp-jvm:1.0 -> org.example:kmp-jvm:1.0
            org.example:kmp-jvm:1.0 (requested)
        "#]]
        .assert_eq(&describe(&result));

        let (kmp, kmp_result) = result
            .components()
            .find(|(_, c)| c.module_version().name() == "kmp")
            .unwrap();
        let (jvm, jvm_result) = result
            .components()
            .find(|(_, c)| c.module_version().name() == "kmp-jvm")
            .unwrap();
        let variant = &kmp_result.selected_variants()[0];
        assert_eq!(
            variant.external_variant(),
            Some(&jvm_result.selected_variants()[0])
        );
        let edges = result.dependencies_for_variant(kmp, variant).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].selected(), Some(jvm));
    }

    #[test]
    fn lock_state_mismatches_become_root_failures() {
        let mut repo = MockRepository::new("repo");
        repo.add_module_full("org.example:a", "1.0", []);
        let repos = RepositoryList::new().with_repository(Box::new(repo));
        let state = DependencyLockState::parse("org.example:a:0.9\norg.example:gone:1.0\n").unwrap();
        let root = root().depends_on("org.example:a", "1.0").unwrap();

        let mut env = ResolverEnv::new(&repos).with_lock_state(&state, LockMode::Strict);
        let result = GraphWalker.resolve(&mut env, &root).unwrap();
        assert!(!env.any_errors());

        let failed = failures(&result);
        assert_eq!(failed.len(), 2);
        for dep in &failed {
            assert_eq!(dep.from(), result.root_index());
            assert_eq!(
                dep.failure().unwrap().message(),
                crate::builder::LOCK_STATE_OUT_OF_DATE
            );
        }

        let mut env = ResolverEnv::new(&repos).with_lock_state(&state, LockMode::Lenient);
        let result = GraphWalker.resolve(&mut env, &root).unwrap();
        assert_eq!(failures(&result).len(), 0);
    }

    #[test]
    fn conflict_description_lists_every_version() {
        assert_eq!(
            describe_conflict(vec!["1.0", "1.2", "1.1"]),
            "between versions 1.2, 1.1 and 1.0"
        );
        assert_eq!(describe_conflict(vec!["1.0"]), "between versions 1.0");
    }
}
