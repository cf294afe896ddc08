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

//! Structural encoding of [`ModuleVersionResolveError`].
//!
//! Underlying causes cannot be restored as their original types. They are
//! written as their rendered message chain and come back as message causes.

use super::ids::{
    read_attribute_value, read_component_identifier, read_component_selector, read_strings,
    write_attribute_value, write_component_identifier, write_component_selector, write_strings,
};
use crate::{
    codec::{CodecError, Decoder, Encoder},
    failure::{
        AttributeMatch, FailureCause, ModuleVersionResolveError, RejectedVersion, RejectionReason,
        ResolveFailureKind,
    },
};

const NOT_FOUND: u8 = 0;
const ARTIFACT_NOT_FOUND: u8 = 1;
const REJECTED_BY_ATTRIBUTES: u8 = 2;
const GENERIC: u8 = 3;

const BY_RULE: u8 = 0;
const BY_ATTRIBUTES: u8 = 1;

fn write_matches(e: &mut (impl Encoder + ?Sized), matches: &[AttributeMatch]) -> Result<(), CodecError> {
    e.write_len(matches.len())?;
    for m in matches {
        e.write_string(&m.name)?;
        write_attribute_value(e, &m.requested)?;
        e.write_boolean(m.provided.is_some())?;
        if let Some(provided) = &m.provided {
            write_attribute_value(e, provided)?;
        }
    }
    Ok(())
}

fn read_matches(d: &mut (impl Decoder + ?Sized)) -> Result<Vec<AttributeMatch>, CodecError> {
    let len = d.read_len()?;
    let mut matches = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        let name = d.read_string()?;
        let requested = read_attribute_value(d)?;
        let provided = if d.read_boolean()? {
            Some(read_attribute_value(d)?)
        } else {
            None
        };
        matches.push(AttributeMatch {
            name,
            requested,
            provided,
        });
    }
    Ok(matches)
}

fn write_rejected(
    e: &mut (impl Encoder + ?Sized),
    rejected: &[RejectedVersion],
) -> Result<(), CodecError> {
    e.write_len(rejected.len())?;
    for r in rejected {
        e.write_string(&r.version)?;
        match &r.reason {
            RejectionReason::ByRule(reason) => {
                e.write_byte(BY_RULE)?;
                e.write_nullable_string(reason.as_deref())?;
            }
            RejectionReason::ByAttributes(matches) => {
                e.write_byte(BY_ATTRIBUTES)?;
                write_matches(e, matches)?;
            }
        }
    }
    Ok(())
}

fn read_rejected(d: &mut (impl Decoder + ?Sized)) -> Result<Vec<RejectedVersion>, CodecError> {
    let len = d.read_len()?;
    let mut rejected = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        let version = d.read_string()?;
        let reason = match d.read_byte()? {
            BY_RULE => RejectionReason::ByRule(d.read_nullable_string()?),
            BY_ATTRIBUTES => RejectionReason::ByAttributes(read_matches(d)?),
            tag => {
                return Err(CodecError::InvalidTag {
                    what: "rejection reason",
                    tag: tag.into(),
                });
            }
        };
        rejected.push(RejectedVersion { version, reason });
    }
    Ok(rejected)
}

pub fn write_failure(
    e: &mut (impl Encoder + ?Sized),
    failure: &ModuleVersionResolveError,
) -> Result<(), CodecError> {
    write_component_selector(e, failure.selector())?;
    match failure.kind() {
        ResolveFailureKind::NotFound {
            attempted,
            unmatched_versions,
            rejected_versions,
        } => {
            e.write_byte(NOT_FOUND)?;
            write_strings(e, attempted)?;
            write_strings(e, unmatched_versions)?;
            write_rejected(e, rejected_versions)?;
        }
        ResolveFailureKind::ArtifactNotFound {
            component,
            artifact,
            attempted,
        } => {
            e.write_byte(ARTIFACT_NOT_FOUND)?;
            write_component_identifier(e, component)?;
            e.write_string(artifact)?;
            write_strings(e, attempted)?;
        }
        ResolveFailureKind::RejectedByAttributes { version, matches } => {
            e.write_byte(REJECTED_BY_ATTRIBUTES)?;
            e.write_string(version)?;
            write_matches(e, matches)?;
        }
        ResolveFailureKind::Generic { message, causes } => {
            e.write_byte(GENERIC)?;
            e.write_nullable_string(message.as_deref())?;
            e.write_len(causes.len())?;
            for cause in causes {
                e.write_string(&cause.to_string())?;
            }
        }
    }
    let paths = failure.incoming_paths();
    e.write_len(paths.len())?;
    for path in paths {
        e.write_len(path.len())?;
        for id in path {
            write_component_identifier(e, id)?;
        }
    }
    Ok(())
}

pub fn read_failure(
    d: &mut (impl Decoder + ?Sized),
) -> Result<ModuleVersionResolveError, CodecError> {
    let selector = read_component_selector(d)?;
    let kind = match d.read_byte()? {
        NOT_FOUND => ResolveFailureKind::NotFound {
            attempted: read_strings(d)?,
            unmatched_versions: read_strings(d)?,
            rejected_versions: read_rejected(d)?,
        },
        ARTIFACT_NOT_FOUND => ResolveFailureKind::ArtifactNotFound {
            component: read_component_identifier(d)?,
            artifact: d.read_string()?,
            attempted: read_strings(d)?,
        },
        REJECTED_BY_ATTRIBUTES => ResolveFailureKind::RejectedByAttributes {
            version: d.read_string()?,
            matches: read_matches(d)?,
        },
        GENERIC => {
            let message = d.read_nullable_string()?;
            let len = d.read_len()?;
            let causes = (0..len)
                .map(|_| d.read_string().map(FailureCause::message))
                .collect::<Result<Vec<_>, _>>()?;
            ResolveFailureKind::Generic { message, causes }
        }
        tag => {
            return Err(CodecError::InvalidTag {
                what: "failure kind",
                tag: tag.into(),
            });
        }
    };
    let path_count = d.read_len()?;
    let mut paths = Vec::with_capacity(path_count.min(1024));
    for _ in 0..path_count {
        let len = d.read_len()?;
        let path = (0..len)
            .map(|_| read_component_identifier(d))
            .collect::<Result<Vec<_>, _>>()?;
        paths.push(path);
    }
    let failure = ModuleVersionResolveError::new(selector, kind);
    Ok(if paths.is_empty() {
        failure
    } else {
        failure.with_incoming_paths(paths)
    })
}

#[cfg(test)]
mod test {
    use anyhow::Context;
    use bytes::BytesMut;
    use resolveutil::identifier::{ComponentIdentifier, ComponentSelector};

    use super::*;

    fn read_back(failure: &ModuleVersionResolveError) -> ModuleVersionResolveError {
        let mut buf = BytesMut::new();
        write_failure(&mut buf, failure).unwrap();
        let mut bytes = buf.freeze();
        let read = read_failure(&mut bytes).unwrap();
        assert!(bytes.is_empty());
        read
    }

    #[test]
    fn failures_read_back_with_the_same_message() {
        let selector = ComponentSelector::module("org.example", "lib", "[1.0, 2.0)");
        let not_found = ModuleVersionResolveError::not_found(
            selector.clone(),
            vec!["file:/repo/org.example/lib".into()],
            vec!["0.9".into()],
            vec![
                RejectedVersion::by_rule("1.5", Some("broken".into())),
                RejectedVersion::by_attributes(
                    "1.4",
                    vec![AttributeMatch {
                        name: "usage".into(),
                        requested: "api".into(),
                        provided: Some("runtime".into()),
                    }],
                ),
            ],
        )
        .with_incoming_paths(vec![vec![
            ComponentIdentifier::project(":", ":"),
            ComponentIdentifier::module("org.example", "app", "1.0"),
        ]]);
        let read = read_back(&not_found);
        assert_eq!(read, not_found);
        assert_eq!(read.to_string(), not_found.to_string());

        let artifact = ModuleVersionResolveError::artifact_not_found(
            selector.clone(),
            ComponentIdentifier::module("org.example", "lib", "1.0"),
            "lib-1.0.jar",
            vec!["file:/repo/org.example/lib/1.0/lib-1.0.jar".into()],
        );
        assert_eq!(read_back(&artifact), artifact);
    }

    #[test]
    fn causes_come_back_as_messages() {
        let cause = Err::<(), _>(std::io::Error::other("connection reset"))
            .context("could not list versions of org.example:lib")
            .unwrap_err();
        let failure = ModuleVersionResolveError::generic(
            ComponentSelector::module("org.example", "lib", "1.0"),
            vec![FailureCause::new(cause)],
        );
        let read = read_back(&failure);
        assert_eq!(read, failure);
        assert_eq!(
            read.causes()[0].to_string(),
            "could not list versions of org.example:lib: connection reset"
        );
        assert!(read.causes()[0].error().downcast_ref::<std::io::Error>().is_none());
    }

    #[test]
    fn huge_path_count_fails_at_end_of_stream() {
        let failure = ModuleVersionResolveError::generic(
            ComponentSelector::module("org.example", "lib", "1.0"),
            vec![],
        );
        let mut buf = BytesMut::new();
        write_failure(&mut buf, &failure).unwrap();
        // the trailing byte is the empty path count
        assert_eq!(buf.last(), Some(&0));
        buf.truncate(buf.len() - 1);
        buf.write_small_int(i32::MAX).unwrap();
        assert!(matches!(
            read_failure(&mut buf.freeze()),
            Err(CodecError::UnexpectedEof)
        ));
    }
}
