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

//! Why a component ended up in a graph.

/// The kinds of causes a selection can have. The order of the variants is
/// part of the persisted format, see [`ComponentSelectionCause::ordinal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentSelectionCause {
    Requested,
    Root,
    Forced,
    ConflictResolution,
    SelectedByRule,
    CompositeBuild,
    Constraint,
    Rejection,
    ByAncestor,
}

impl ComponentSelectionCause {
    const ALL: [ComponentSelectionCause; 9] = [
        ComponentSelectionCause::Requested,
        ComponentSelectionCause::Root,
        ComponentSelectionCause::Forced,
        ComponentSelectionCause::ConflictResolution,
        ComponentSelectionCause::SelectedByRule,
        ComponentSelectionCause::CompositeBuild,
        ComponentSelectionCause::Constraint,
        ComponentSelectionCause::Rejection,
        ComponentSelectionCause::ByAncestor,
    ];

    pub fn default_reason(self) -> &'static str {
        match self {
            ComponentSelectionCause::Requested => "requested",
            ComponentSelectionCause::Root => "root",
            ComponentSelectionCause::Forced => "forced",
            ComponentSelectionCause::ConflictResolution => "conflict resolution",
            ComponentSelectionCause::SelectedByRule => "selected by rule",
            ComponentSelectionCause::CompositeBuild => "composite build substitution",
            ComponentSelectionCause::Constraint => "constraint",
            ComponentSelectionCause::Rejection => "rejection",
            ComponentSelectionCause::ByAncestor => "by ancestor",
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }
}

/// One cause plus an optional custom description.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectionDescriptor {
    pub cause: ComponentSelectionCause,
    pub custom_description: Option<String>,
}

impl SelectionDescriptor {
    pub fn of(cause: ComponentSelectionCause) -> Self {
        SelectionDescriptor {
            cause,
            custom_description: None,
        }
    }

    pub fn with_description(cause: ComponentSelectionCause, description: impl Into<String>) -> Self {
        SelectionDescriptor {
            cause,
            custom_description: Some(description.into()),
        }
    }

    pub fn description(&self) -> &str {
        self.custom_description
            .as_deref()
            .unwrap_or_else(|| self.cause.default_reason())
    }
}

impl std::fmt::Display for SelectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// The ordered list of causes that led to a selection. Duplicate descriptors
/// are dropped on insertion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SelectionReason {
    descriptions: Vec<SelectionDescriptor>,
}

impl SelectionReason {
    pub fn of(descriptors: impl IntoIterator<Item = SelectionDescriptor>) -> Self {
        let mut reason = SelectionReason::default();
        for d in descriptors {
            reason.add(d);
        }
        reason
    }

    pub fn root() -> Self {
        Self::of([SelectionDescriptor::of(ComponentSelectionCause::Root)])
    }

    pub fn requested() -> Self {
        Self::of([SelectionDescriptor::of(ComponentSelectionCause::Requested)])
    }

    pub fn conflict_resolution() -> Self {
        Self::of([SelectionDescriptor::of(
            ComponentSelectionCause::ConflictResolution,
        )])
    }

    /// The reason attached to failures synthesized from dependency lock
    /// validation.
    pub fn dependency_locking() -> Self {
        Self::of([SelectionDescriptor::with_description(
            ComponentSelectionCause::Constraint,
            "Dependency locking",
        )])
    }

    pub fn add(&mut self, descriptor: SelectionDescriptor) -> &mut Self {
        if !self.descriptions.contains(&descriptor) {
            self.descriptions.push(descriptor);
        }
        self
    }

    pub fn descriptions(&self) -> &[SelectionDescriptor] {
        &self.descriptions
    }

    pub fn has_cause(&self, cause: ComponentSelectionCause) -> bool {
        self.descriptions.iter().any(|d| d.cause == cause)
    }

    pub fn is_conflict_resolution(&self) -> bool {
        self.has_cause(ComponentSelectionCause::ConflictResolution)
    }

    pub fn is_constrained(&self) -> bool {
        self.has_cause(ComponentSelectionCause::Constraint)
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.descriptions.is_empty() {
            return f.write_str("unknown");
        }
        for (i, d) in self.descriptions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordinals_round_trip() {
        for cause in ComponentSelectionCause::ALL {
            assert_eq!(
                ComponentSelectionCause::from_ordinal(cause.ordinal()),
                Some(cause)
            );
        }
        assert_eq!(ComponentSelectionCause::from_ordinal(42), None);
    }

    #[test]
    fn descriptors_are_deduplicated() {
        let mut reason = SelectionReason::requested();
        reason
            .add(SelectionDescriptor::of(ComponentSelectionCause::Requested))
            .add(SelectionDescriptor::of(
                ComponentSelectionCause::ConflictResolution,
            ));
        assert_eq!(reason.to_string(), "requested, conflict resolution");
        assert!(reason.is_conflict_resolution());
        assert_eq!(
            SelectionReason::dependency_locking().to_string(),
            "Dependency locking"
        );
        assert!(SelectionReason::dependency_locking().is_constrained());
    }
}
