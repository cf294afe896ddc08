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

//! Encodings of the identifier and selector value types.

use resolveutil::{
    attributes::{AttributeSet, AttributeValue},
    capability::Capability,
    identifier::{
        ComponentIdentifier, ComponentSelector, ModuleComponentSelector, ModuleIdentifier,
        ModuleVersionIdentifier, ProjectIdentifier, VersionConstraint,
    },
    reason::{ComponentSelectionCause, SelectionDescriptor, SelectionReason},
};

use crate::codec::{CodecError, Decoder, Encoder};

const MODULE: u8 = 0;
const PROJECT: u8 = 1;
const VCS: u8 = 2;

const BOOL: u8 = 0;
const INT: u8 = 1;
const STRING: u8 = 2;

pub fn write_module_identifier(
    e: &mut (impl Encoder + ?Sized),
    id: &ModuleIdentifier,
) -> Result<(), CodecError> {
    e.write_string(&id.group)?;
    e.write_string(&id.name)
}

pub fn read_module_identifier(d: &mut (impl Decoder + ?Sized)) -> Result<ModuleIdentifier, CodecError> {
    let group = d.read_string()?;
    let name = d.read_string()?;
    Ok(ModuleIdentifier::new(group, name))
}

pub fn write_module_version_identifier(
    e: &mut (impl Encoder + ?Sized),
    id: &ModuleVersionIdentifier,
) -> Result<(), CodecError> {
    write_module_identifier(e, &id.module)?;
    e.write_string(&id.version)
}

pub fn read_module_version_identifier(
    d: &mut (impl Decoder + ?Sized),
) -> Result<ModuleVersionIdentifier, CodecError> {
    let module = read_module_identifier(d)?;
    let version = d.read_string()?;
    Ok(module.with_version(version))
}

fn write_project(e: &mut (impl Encoder + ?Sized), project: &ProjectIdentifier) -> Result<(), CodecError> {
    e.write_string(&project.build_path)?;
    e.write_string(&project.project_path)
}

fn read_project(d: &mut (impl Decoder + ?Sized)) -> Result<ProjectIdentifier, CodecError> {
    let build_path = d.read_string()?;
    let project_path = d.read_string()?;
    Ok(ProjectIdentifier::new(build_path, project_path))
}

pub fn write_component_identifier(
    e: &mut (impl Encoder + ?Sized),
    id: &ComponentIdentifier,
) -> Result<(), CodecError> {
    match id {
        ComponentIdentifier::Module(mvi) => {
            e.write_byte(MODULE)?;
            write_module_version_identifier(e, mvi)
        }
        ComponentIdentifier::Project(project) => {
            e.write_byte(PROJECT)?;
            write_project(e, project)
        }
        ComponentIdentifier::Vcs {
            repository,
            module,
            canonical_id,
        } => {
            e.write_byte(VCS)?;
            e.write_string(repository)?;
            write_module_identifier(e, module)?;
            e.write_string(canonical_id)
        }
    }
}

pub fn read_component_identifier(
    d: &mut (impl Decoder + ?Sized),
) -> Result<ComponentIdentifier, CodecError> {
    match d.read_byte()? {
        MODULE => Ok(ComponentIdentifier::Module(read_module_version_identifier(d)?)),
        PROJECT => Ok(ComponentIdentifier::Project(read_project(d)?)),
        VCS => {
            let repository = d.read_string()?;
            let module = read_module_identifier(d)?;
            let canonical_id = d.read_string()?;
            Ok(ComponentIdentifier::Vcs {
                repository,
                module,
                canonical_id,
            })
        }
        tag => Err(CodecError::InvalidTag {
            what: "component identifier",
            tag: tag.into(),
        }),
    }
}

pub fn write_strings(e: &mut (impl Encoder + ?Sized), values: &[String]) -> Result<(), CodecError> {
    e.write_len(values.len())?;
    for v in values {
        e.write_string(v)?;
    }
    Ok(())
}

pub fn read_strings(d: &mut (impl Decoder + ?Sized)) -> Result<Vec<String>, CodecError> {
    let len = d.read_len()?;
    (0..len).map(|_| d.read_string()).collect()
}

pub fn write_version_constraint(
    e: &mut (impl Encoder + ?Sized),
    constraint: &VersionConstraint,
) -> Result<(), CodecError> {
    e.write_string(&constraint.required)?;
    e.write_string(&constraint.preferred)?;
    e.write_string(&constraint.strictly)?;
    write_strings(e, &constraint.rejected)?;
    e.write_nullable_string(constraint.branch.as_deref())
}

pub fn read_version_constraint(
    d: &mut (impl Decoder + ?Sized),
) -> Result<VersionConstraint, CodecError> {
    Ok(VersionConstraint {
        required: d.read_string()?,
        preferred: d.read_string()?,
        strictly: d.read_string()?,
        rejected: read_strings(d)?,
        branch: d.read_nullable_string()?,
    })
}

pub fn write_attribute_value(
    e: &mut (impl Encoder + ?Sized),
    value: &AttributeValue,
) -> Result<(), CodecError> {
    match value {
        AttributeValue::Bool(b) => {
            e.write_byte(BOOL)?;
            e.write_boolean(*b)
        }
        AttributeValue::Int(i) => {
            e.write_byte(INT)?;
            e.write_small_long(*i)
        }
        AttributeValue::String(s) => {
            e.write_byte(STRING)?;
            e.write_string(s)
        }
    }
}

pub fn read_attribute_value(d: &mut (impl Decoder + ?Sized)) -> Result<AttributeValue, CodecError> {
    match d.read_byte()? {
        BOOL => Ok(AttributeValue::Bool(d.read_boolean()?)),
        INT => Ok(AttributeValue::Int(d.read_small_long()?)),
        STRING => Ok(AttributeValue::String(d.read_string()?)),
        tag => Err(CodecError::InvalidTag {
            what: "attribute value",
            tag: tag.into(),
        }),
    }
}

pub fn write_attributes(
    e: &mut (impl Encoder + ?Sized),
    attributes: &AttributeSet,
) -> Result<(), CodecError> {
    e.write_len(attributes.len())?;
    for (name, value) in attributes.iter() {
        e.write_string(name)?;
        write_attribute_value(e, value)?;
    }
    Ok(())
}

pub fn read_attributes(d: &mut (impl Decoder + ?Sized)) -> Result<AttributeSet, CodecError> {
    let len = d.read_len()?;
    let mut entries = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        let name = d.read_string()?;
        let value = read_attribute_value(d)?;
        entries.push((name, value));
    }
    Ok(entries.into_iter().collect())
}

pub fn write_capabilities(
    e: &mut (impl Encoder + ?Sized),
    capabilities: &[Capability],
) -> Result<(), CodecError> {
    e.write_len(capabilities.len())?;
    for c in capabilities {
        e.write_string(&c.group)?;
        e.write_string(&c.name)?;
        e.write_nullable_string(c.version.as_deref())?;
    }
    Ok(())
}

pub fn read_capabilities(d: &mut (impl Decoder + ?Sized)) -> Result<Vec<Capability>, CodecError> {
    let len = d.read_len()?;
    if len == 0 {
        return Ok(vec![]);
    }
    let mut capabilities = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        let group = d.read_string()?;
        let name = d.read_string()?;
        let version = d.read_nullable_string()?;
        capabilities.push(Capability::new(group, name, version));
    }
    Ok(capabilities)
}

pub fn write_component_selector(
    e: &mut (impl Encoder + ?Sized),
    selector: &ComponentSelector,
) -> Result<(), CodecError> {
    match selector {
        ComponentSelector::Module(m) => {
            e.write_byte(MODULE)?;
            write_module_identifier(e, &m.module)?;
            write_version_constraint(e, &m.constraint)?;
            write_attributes(e, &m.attributes)?;
            write_capabilities(e, &m.capabilities)
        }
        ComponentSelector::Project {
            project,
            attributes,
            capabilities,
        } => {
            e.write_byte(PROJECT)?;
            write_project(e, project)?;
            write_attributes(e, attributes)?;
            write_capabilities(e, capabilities)
        }
    }
}

pub fn read_component_selector(
    d: &mut (impl Decoder + ?Sized),
) -> Result<ComponentSelector, CodecError> {
    match d.read_byte()? {
        MODULE => {
            let module = read_module_identifier(d)?;
            let constraint = read_version_constraint(d)?;
            let mut selector = ModuleComponentSelector::new(module, constraint);
            selector.attributes = read_attributes(d)?;
            selector.capabilities = read_capabilities(d)?;
            Ok(ComponentSelector::Module(selector))
        }
        PROJECT => Ok(ComponentSelector::Project {
            project: read_project(d)?,
            attributes: read_attributes(d)?,
            capabilities: read_capabilities(d)?,
        }),
        tag => Err(CodecError::InvalidTag {
            what: "component selector",
            tag: tag.into(),
        }),
    }
}

pub fn write_selection_reason(
    e: &mut (impl Encoder + ?Sized),
    reason: &SelectionReason,
) -> Result<(), CodecError> {
    e.write_len(reason.descriptions().len())?;
    for d in reason.descriptions() {
        e.write_byte(d.cause.ordinal())?;
        e.write_nullable_string(d.custom_description.as_deref())?;
    }
    Ok(())
}

pub fn read_selection_reason(d: &mut (impl Decoder + ?Sized)) -> Result<SelectionReason, CodecError> {
    let len = d.read_len()?;
    let mut descriptors = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        let ordinal = d.read_byte()?;
        let cause =
            ComponentSelectionCause::from_ordinal(ordinal).ok_or(CodecError::InvalidTag {
                what: "selection cause",
                tag: ordinal.into(),
            })?;
        descriptors.push(match d.read_nullable_string()? {
            Some(description) => SelectionDescriptor::with_description(cause, description),
            None => SelectionDescriptor::of(cause),
        });
    }
    Ok(SelectionReason::of(descriptors))
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use expect_test::expect;

    use super::*;

    #[test]
    fn selectors_and_reasons_read_back() {
        let mut selector = ModuleComponentSelector::new(
            ModuleIdentifier::new("org.example", "lib"),
            VersionConstraint {
                required: "1.0".into(),
                preferred: "1.2".into(),
                rejected: vec!["1.1".into()],
                ..Default::default()
            },
        );
        selector.attributes = AttributeSet::empty()
            .with("usage", "api")
            .with("jvm", 17i64)
            .with("docs", false);
        selector.capabilities = vec![Capability::new("org.example", "lib-feature", None)];
        let selector = ComponentSelector::Module(selector);
        let mut reason = SelectionReason::requested();
        reason.add(SelectionDescriptor::with_description(
            ComponentSelectionCause::SelectedByRule,
            "pinned by platform",
        ));
        let vcs = ComponentIdentifier::Vcs {
            repository: "Git repository at https://example.org/lib.git".into(),
            module: ModuleIdentifier::new("org.example", "lib"),
            canonical_id: "0a1b2c".into(),
        };

        let mut buf = BytesMut::new();
        write_component_selector(&mut buf, &selector).unwrap();
        write_selection_reason(&mut buf, &reason).unwrap();
        write_component_identifier(&mut buf, &vcs).unwrap();
        let mut bytes = buf.freeze();
        assert_eq!(read_component_selector(&mut bytes).unwrap(), selector);
        assert_eq!(read_selection_reason(&mut bytes).unwrap(), reason);
        assert_eq!(read_component_identifier(&mut bytes).unwrap(), vcs);
        assert!(bytes.is_empty());
    }

    #[test]
    fn empty_capabilities_take_one_byte() {
        let mut buf = BytesMut::new();
        write_capabilities(&mut buf, &[]).unwrap();
        assert_eq!(&buf[..], &[0]);
        let mut bytes = buf.freeze();
        assert!(read_capabilities(&mut bytes).unwrap().is_empty());
    }

    #[test]
    fn huge_counts_fail_at_end_of_stream() {
        let mut buf = BytesMut::new();
        buf.write_small_int(i32::MAX).unwrap();
        let bytes = buf.freeze();
        assert!(matches!(
            read_attributes(&mut bytes.clone()),
            Err(CodecError::UnexpectedEof)
        ));
        assert!(matches!(
            read_capabilities(&mut bytes.clone()),
            Err(CodecError::UnexpectedEof)
        ));
        assert!(matches!(
            read_selection_reason(&mut bytes.clone()),
            Err(CodecError::UnexpectedEof)
        ));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let mut bytes = bytes::Bytes::from_static(&[7]);
        let err = read_component_identifier(&mut bytes).unwrap_err();
        expect!["invalid component identifier tag 7"].assert_eq(&err.to_string());
    }
}
