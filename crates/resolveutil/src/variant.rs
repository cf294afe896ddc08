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

use std::sync::Arc;

use crate::{attributes::AttributeSet, capability::Capability, identifier::ComponentIdentifier};

/// A shared handle to a variant. Graphs hand the same variant to many edges,
/// so variants are always passed around behind an [`Arc`].
pub type VariantRef = Arc<ResolvedVariant>;

/// A selected (or candidate) facet of a component.
///
/// Equality and hashing are structural over every field, including the
/// external variant, so two separately built but identical variants are
/// interchangeable.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResolvedVariant {
    owner: ComponentIdentifier,
    display_name: String,
    attributes: AttributeSet,
    capabilities: Vec<Capability>,
    /// A variant published by another component that this one points at.
    external_variant: Option<VariantRef>,
}

impl ResolvedVariant {
    pub fn new(
        owner: ComponentIdentifier,
        display_name: impl Into<String>,
        attributes: AttributeSet,
        capabilities: Vec<Capability>,
    ) -> Self {
        ResolvedVariant {
            owner,
            display_name: display_name.into(),
            attributes,
            capabilities,
            external_variant: None,
        }
    }

    pub fn with_external_variant(mut self, external: Option<VariantRef>) -> Self {
        self.external_variant = external;
        self
    }

    pub fn owner(&self) -> &ComponentIdentifier {
        &self.owner
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn external_variant(&self) -> Option<&VariantRef> {
        self.external_variant.as_ref()
    }

    pub fn into_ref(self) -> VariantRef {
        Arc::new(self)
    }
}

impl std::fmt::Debug for ResolvedVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ResolvedVariant");
        s.field("owner", &format_args!("{}", self.owner))
            .field("name", &self.display_name)
            .field("attributes", &self.attributes);
        if !self.capabilities.is_empty() {
            s.field("capabilities", &format_args!("{:?}", self.capabilities));
        }
        if let Some(external) = &self.external_variant {
            s.field(
                "external",
                &format_args!("{} of {}", external.display_name, external.owner),
            );
        }
        s.finish()
    }
}

impl std::fmt::Display for ResolvedVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name)
    }
}
