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

use resolveutil::{config::ResolveConfig, variant::VariantRef};

use super::{
    ids::{
        read_component_identifier, read_module_version_identifier, read_selection_reason,
        write_component_identifier, write_module_version_identifier, write_selection_reason,
    },
    variant::ResolvedVariantSerializer,
};
use crate::{
    codec::{CodecError, Decoder, Encoder},
    result::ComponentDetails,
};

/// Whether each variant of a component is followed by a "selected" flag.
///
/// When every variant is selected the counts are equal and the flags would
/// all be `true`, so they are left out. Both the writer and the reader decide
/// through this function.
pub fn writes_selection_flags(all_count: usize, selected_count: usize) -> bool {
    all_count != selected_count
}

/// Writes and reads [`ComponentDetails`].
///
/// In all-variants mode the full variant list is kept. Otherwise only the
/// selected variants are written, and a component read back reports them as
/// its whole variant list.
pub struct ComponentResultSerializer {
    variants: ResolvedVariantSerializer,
    return_all_variants: bool,
}

impl ComponentResultSerializer {
    pub fn new(return_all_variants: bool) -> Self {
        ComponentResultSerializer {
            variants: ResolvedVariantSerializer::new(),
            return_all_variants,
        }
    }

    pub fn from_config(config: &ResolveConfig) -> Self {
        Self::new(config.return_all_variants)
    }

    pub fn returns_all_variants(&self) -> bool {
        self.return_all_variants
    }

    /// The variant dictionary, shared with anything else written to the same
    /// stream.
    pub fn variants(&mut self) -> &mut ResolvedVariantSerializer {
        &mut self.variants
    }

    pub fn reset(&mut self) {
        self.variants.reset();
    }

    pub fn write(
        &mut self,
        e: &mut (impl Encoder + ?Sized),
        component: &ComponentDetails,
    ) -> Result<(), CodecError> {
        e.write_small_long(component.result_id)?;
        write_module_version_identifier(e, &component.module_version)?;
        write_selection_reason(e, &component.selection_reason)?;
        write_component_identifier(e, &component.component_id)?;
        if self.return_all_variants {
            self.write_all_variants(e, component)?;
        } else {
            e.write_len(component.selected_variants.len())?;
            for v in &component.selected_variants {
                self.variants.write(e, Some(v))?;
            }
        }
        e.write_nullable_string(component.repository_name.as_deref())
    }

    fn write_all_variants(
        &mut self,
        e: &mut (impl Encoder + ?Sized),
        component: &ComponentDetails,
    ) -> Result<(), CodecError> {
        let all_count = component.all_variants.len();
        let selected_count = component.selected_variants.len();
        e.write_len(all_count)?;
        e.write_len(selected_count)?;
        let flags = writes_selection_flags(all_count, selected_count);
        for v in &component.all_variants {
            self.variants.write(e, Some(v))?;
            if flags {
                e.write_boolean(component.is_selected(v))?;
            }
        }
        Ok(())
    }

    pub fn read(&mut self, d: &mut (impl Decoder + ?Sized)) -> Result<ComponentDetails, CodecError> {
        let result_id = d.read_small_long()?;
        let module_version = read_module_version_identifier(d)?;
        let selection_reason = read_selection_reason(d)?;
        let component_id = read_component_identifier(d)?;
        let (all_variants, selected_variants) = if self.return_all_variants {
            let all_count = d.read_len()?;
            let selected_count = d.read_len()?;
            let flags = writes_selection_flags(all_count, selected_count);
            let mut all = Vec::with_capacity(all_count.min(1024));
            let mut selected = Vec::with_capacity(selected_count.min(1024));
            for _ in 0..all_count {
                let v = self.read_variant(d)?;
                if !flags || d.read_boolean()? {
                    selected.push(v.clone());
                }
                all.push(v);
            }
            (all, selected)
        } else {
            let count = d.read_len()?;
            let selected = (0..count)
                .map(|_| self.read_variant(d))
                .collect::<Result<Vec<_>, _>>()?;
            (selected.clone(), selected)
        };
        let repository_name = d.read_nullable_string()?;
        Ok(ComponentDetails {
            result_id,
            module_version,
            selection_reason,
            component_id,
            all_variants,
            selected_variants,
            repository_name,
        })
    }

    fn read_variant(
        &mut self,
        d: &mut (impl Decoder + ?Sized),
    ) -> Result<VariantRef, CodecError> {
        self.variants.read(d)?.ok_or_else(|| {
            CodecError::Malformed("component variant list contains an absent variant".into())
        })
    }
}
