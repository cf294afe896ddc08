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

use resolveutil::config::ResolveConfig;

use super::{
    component::ComponentResultSerializer,
    failure::{read_failure, write_failure},
    ids::{
        read_attributes, read_component_selector, read_selection_reason, write_attributes,
        write_component_selector, write_selection_reason,
    },
};
use crate::{
    builder::{EdgeTarget, GraphEdge, ResolutionResultGraphBuilder},
    codec::{CodecError, Decoder, Encoder},
    result::{DependencyOutcome, DependencyResult, ResolutionResult},
};

const RESOLVED: u8 = 0;
const UNRESOLVED: u8 = 1;

/// Writes a whole [`ResolutionResult`] and replays it into a fresh builder
/// on read.
///
/// Layout: request attributes, root result id, the components, then the
/// dependency results as runs of consecutive edges sharing a source
/// component. Keeping the runs in arena order makes the graph read back
/// identical to the one written.
pub struct ResolutionResultSerializer {
    components: ComponentResultSerializer,
}

impl ResolutionResultSerializer {
    pub fn new(return_all_variants: bool) -> Self {
        ResolutionResultSerializer {
            components: ComponentResultSerializer::new(return_all_variants),
        }
    }

    pub fn from_config(config: &ResolveConfig) -> Self {
        ResolutionResultSerializer {
            components: ComponentResultSerializer::from_config(config),
        }
    }

    /// Number of distinct variants written in full by the last `write`.
    pub fn written_variants(&mut self) -> usize {
        self.components.variants().written_len()
    }

    pub fn write(
        &mut self,
        e: &mut (impl Encoder + ?Sized),
        result: &ResolutionResult,
    ) -> Result<(), CodecError> {
        self.components.reset();
        write_attributes(e, result.request_attributes())?;
        e.write_small_long(result.root().result_id())?;

        e.write_len(result.components().count())?;
        for (_, component) in result.components() {
            self.components.write(e, component.details())?;
        }

        let dependencies = result.all_dependencies().collect::<Vec<_>>();
        let runs = dependencies
            .chunk_by(|a, b| a.from() == b.from())
            .collect::<Vec<_>>();
        e.write_len(runs.len())?;
        for run in runs {
            e.write_small_long(result.component(run[0].from()).result_id())?;
            e.write_len(run.len())?;
            for dep in run {
                self.write_dependency(e, result, dep)?;
            }
        }
        log::debug!(
            "wrote resolution result with {} components, {} distinct variants",
            result.components().count(),
            self.components.variants().written_len()
        );
        Ok(())
    }

    fn write_dependency(
        &mut self,
        e: &mut (impl Encoder + ?Sized),
        result: &ResolutionResult,
        dep: &DependencyResult,
    ) -> Result<(), CodecError> {
        write_component_selector(e, dep.requested())?;
        e.write_boolean(dep.is_constraint())?;
        self.components.variants().write(e, dep.from_variant())?;
        match dep.outcome() {
            DependencyOutcome::Resolved {
                selected,
                selected_variant,
            } => {
                e.write_byte(RESOLVED)?;
                e.write_small_long(result.component(*selected).result_id())?;
                self.components
                    .variants()
                    .write(e, selected_variant.as_ref())
            }
            DependencyOutcome::Unresolved { failure, reason } => {
                e.write_byte(UNRESOLVED)?;
                write_failure(e, failure)?;
                write_selection_reason(e, reason)
            }
        }
    }

    pub fn read(&mut self, d: &mut (impl Decoder + ?Sized)) -> Result<ResolutionResult, CodecError> {
        self.components.reset();
        let request_attributes = read_attributes(d)?;
        let root = d.read_small_long()?;
        let mut builder = ResolutionResultGraphBuilder::new(request_attributes);

        let component_count = d.read_len()?;
        for _ in 0..component_count {
            let details = self.components.read(d)?;
            builder.visit_component(details);
        }

        let run_count = d.read_len()?;
        for _ in 0..run_count {
            let from = d.read_small_long()?;
            let len = d.read_len()?;
            let edges = (0..len)
                .map(|_| self.read_edge(d))
                .collect::<Result<Vec<_>, _>>()?;
            builder.visit_outgoing_edges(from, edges)?;
        }
        Ok(builder.complete(root)?)
    }

    fn read_edge(&mut self, d: &mut (impl Decoder + ?Sized)) -> Result<GraphEdge, CodecError> {
        let requested = read_component_selector(d)?;
        let constraint = d.read_boolean()?;
        let from_variant = self.components.variants().read(d)?;
        let target = match d.read_byte()? {
            RESOLVED => {
                let result_id = d.read_small_long()?;
                let variant = self.components.variants().read(d)?;
                EdgeTarget::Selected { result_id, variant }
            }
            UNRESOLVED => {
                let failure = read_failure(d)?;
                let reason = read_selection_reason(d)?;
                EdgeTarget::Failed {
                    failure: failure.into(),
                    reason,
                }
            }
            tag => {
                return Err(CodecError::InvalidTag {
                    what: "dependency result",
                    tag: tag.into(),
                });
            }
        };
        Ok(GraphEdge {
            requested,
            constraint,
            from_variant,
            target,
        })
    }
}
