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

//! Variant selection by attribute matching.
//!
//! A variant is compatible with a request when every requested attribute it
//! declares has the requested value; attributes it does not declare are
//! ignored. Among compatible variants the one declaring the most requested
//! attributes wins, then the one with the fewest extra attributes. A tie is a
//! failure.

use resolveutil::{
    attributes::AttributeSet,
    capability::Capability,
    identifier::{ComponentSelector, ModuleVersionIdentifier},
};

use crate::{
    failure::{AttributeMatch, ModuleVersionResolveError},
    repository::{ComponentMetadata, VariantMetadata},
};

pub fn attribute_matches(requested: &AttributeSet, provided: &AttributeSet) -> Vec<AttributeMatch> {
    requested
        .iter()
        .map(|(name, value)| AttributeMatch {
            name: name.to_owned(),
            requested: value.clone(),
            provided: provided.get(name).cloned(),
        })
        .collect()
}

fn is_compatible(requested: &AttributeSet, variant: &VariantMetadata) -> bool {
    requested
        .iter()
        .all(|(name, value)| variant.attributes.get(name).is_none_or(|v| v == value))
}

/// `(declared requested attributes, extra attributes)`
fn score(requested: &AttributeSet, variant: &VariantMetadata) -> (usize, usize) {
    let matched = variant
        .attributes
        .names()
        .filter(|n| requested.contains(n))
        .count();
    (matched, variant.attributes.len() - matched)
}

/// Whether a variant provides what the request asks for. Without an explicit
/// capability request, only variants providing the module's own capability
/// qualify.
fn provides_capabilities(
    owner: &ModuleVersionIdentifier,
    variant: &VariantMetadata,
    requested: &[Capability],
) -> bool {
    let provided = variant.capabilities_or_implicit(owner);
    if requested.is_empty() {
        provided.iter().any(|c| c.is_for(&owner.module))
    } else {
        requested
            .iter()
            .all(|r| provided.iter().any(|p| p.same_as(r)))
    }
}

/// Picks the index of the variant of `metadata` to use for `requested`.
pub fn select_variant(
    selector: &ComponentSelector,
    metadata: &ComponentMetadata,
    requested: &AttributeSet,
    capabilities: &[Capability],
) -> Result<usize, ModuleVersionResolveError> {
    let candidates = metadata
        .variants
        .iter()
        .enumerate()
        .filter(|(_, v)| provides_capabilities(&metadata.id, v, capabilities))
        .collect::<Vec<_>>();

    let compatible = candidates
        .iter()
        .filter(|(_, v)| is_compatible(requested, v))
        .map(|&(i, v)| (i, score(requested, v)))
        .collect::<Vec<_>>();

    let best = compatible
        .iter()
        .map(|&(_, (matched, extra))| (matched, std::cmp::Reverse(extra)))
        .max();
    let winners = compatible
        .iter()
        .filter(|&&(_, (matched, extra))| Some((matched, std::cmp::Reverse(extra))) == best)
        .map(|&(i, _)| i)
        .collect::<Vec<_>>();

    if let [single] = winners[..] {
        log::debug!(
            "Selected variant '{}' of {} for {}",
            metadata.variants[single].name,
            metadata.id,
            requested
        );
        return Ok(single);
    }

    // Report against the closest candidate: a tied winner, or the variant
    // declaring the most requested attributes.
    let closest = winners.first().copied().or_else(|| {
        candidates
            .iter()
            .max_by_key(|(_, v)| score(requested, v).0)
            .map(|&(i, _)| i)
    });
    let matches = closest
        .map(|i| attribute_matches(requested, &metadata.variants[i].attributes))
        .unwrap_or_default();
    if winners.len() > 1 {
        log::debug!(
            "Ambiguous variants of {} for {}: {}",
            metadata.id,
            requested,
            winners
                .iter()
                .map(|&i| metadata.variants[i].name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Err(ModuleVersionResolveError::rejected_by_attributes(
        selector.clone(),
        metadata.id.version.clone(),
        matches,
    ))
}
