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

//! Variants are written once per serializer and referenced by index
//! afterwards.
//!
//! Writing a variant emits its index. An index equal to the number of
//! variants read so far announces a full payload; a smaller index refers
//! back to a variant that was already read.

use std::collections::HashMap;

use resolveutil::variant::{ResolvedVariant, VariantRef};

use super::ids::{
    read_attributes, read_capabilities, read_component_identifier, write_attributes,
    write_capabilities, write_component_identifier,
};
use crate::codec::{CodecError, Decoder, Encoder};

/// Index written in place of a missing variant.
pub const NO_VARIANT: i32 = -1;

#[derive(Default)]
pub struct ResolvedVariantSerializer {
    written: HashMap<VariantRef, i32>,
    /// `None` marks a slot reserved for a variant whose payload is still
    /// being read.
    read: Vec<Option<VariantRef>>,
}

impl ResolvedVariantSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every variant written or read so far.
    pub fn reset(&mut self) {
        self.written.clear();
        self.read.clear();
    }

    /// Number of distinct variants written in full since the last reset.
    pub fn written_len(&self) -> usize {
        self.written.len()
    }

    pub fn write(
        &mut self,
        e: &mut (impl Encoder + ?Sized),
        variant: Option<&VariantRef>,
    ) -> Result<(), CodecError> {
        let Some(variant) = variant else {
            return e.write_small_int(NO_VARIANT);
        };
        if let Some(&index) = self.written.get(variant) {
            return e.write_small_int(index);
        }
        let index = self.written.len() as i32;
        self.written.insert(variant.clone(), index);
        e.write_small_int(index)?;
        write_component_identifier(e, variant.owner())?;
        e.write_string(variant.display_name())?;
        write_attributes(e, variant.attributes())?;
        write_capabilities(e, variant.capabilities())?;
        self.write(e, variant.external_variant())
    }

    pub fn read(&mut self, d: &mut (impl Decoder + ?Sized)) -> Result<Option<VariantRef>, CodecError> {
        let index = d.read_small_int()?;
        if index == NO_VARIANT {
            return Ok(None);
        }
        let known = self.read.len();
        let slot = usize::try_from(index)
            .ok()
            .filter(|&slot| slot <= known)
            .ok_or(CodecError::InvalidVariantIndex { index, known })?;
        if slot < known {
            return match &self.read[slot] {
                Some(variant) => Ok(Some(variant.clone())),
                None => Err(CodecError::UnfinishedVariant(index)),
            };
        }

        self.read.push(None);
        let owner = read_component_identifier(d)?;
        let display_name = d.read_string()?;
        let attributes = read_attributes(d)?;
        let capabilities = read_capabilities(d)?;
        let external = self.read(d)?;
        let variant = ResolvedVariant::new(owner, display_name, attributes, capabilities)
            .with_external_variant(external)
            .into_ref();
        self.read[slot] = Some(variant.clone());
        Ok(Some(variant))
    }
}

#[cfg(test)]
mod test {
    use bytes::{Bytes, BytesMut};
    use expect_test::expect;
    use resolveutil::{attributes::AttributeSet, identifier::ComponentIdentifier};

    use super::*;

    fn variant(name: &str) -> VariantRef {
        ResolvedVariant::new(
            ComponentIdentifier::module("org.example", "lib", "1.0"),
            name,
            AttributeSet::empty().with("usage", name),
            vec![],
        )
        .into_ref()
    }

    #[test]
    fn repeated_variants_become_back_references() {
        let runtime = variant("runtime");
        let api = ResolvedVariant::new(
            ComponentIdentifier::module("org.example", "lib", "1.0"),
            "api",
            AttributeSet::empty(),
            vec![],
        )
        .with_external_variant(Some(runtime.clone()))
        .into_ref();

        let mut serializer = ResolvedVariantSerializer::new();
        let mut buf = BytesMut::new();
        serializer.write(&mut buf, Some(&api)).unwrap();
        serializer.write(&mut buf, Some(&runtime)).unwrap();
        serializer.write(&mut buf, None).unwrap();
        serializer.write(&mut buf, Some(&api)).unwrap();
        assert_eq!(serializer.written_len(), 2);

        let mut bytes = buf.freeze();
        let mut reader = ResolvedVariantSerializer::new();
        let read_api = reader.read(&mut bytes).unwrap().unwrap();
        let read_runtime = reader.read(&mut bytes).unwrap().unwrap();
        assert!(reader.read(&mut bytes).unwrap().is_none());
        let read_api_again = reader.read(&mut bytes).unwrap().unwrap();
        assert!(bytes.is_empty());

        assert_eq!(read_api, api);
        assert_eq!(read_runtime, runtime);
        assert!(std::sync::Arc::ptr_eq(&read_api, &read_api_again));
        assert!(std::sync::Arc::ptr_eq(
            read_api.external_variant().unwrap(),
            &read_runtime
        ));
    }

    #[test]
    fn index_beyond_dictionary_is_fatal() {
        let mut buf = BytesMut::new();
        buf.write_small_int(3).unwrap();
        let err = ResolvedVariantSerializer::new()
            .read(&mut buf.freeze())
            .unwrap_err();
        expect!["variant index 3 is out of range, 0 variants have been read"]
            .assert_eq(&err.to_string());

        let mut bytes = Bytes::from_static(&[0x7e]);
        let err = ResolvedVariantSerializer::new().read(&mut bytes).unwrap_err();
        expect!["variant index 126 is out of range, 0 variants have been read"]
            .assert_eq(&err.to_string());
    }

    #[test]
    fn reserved_slot_cannot_be_referenced() {
        // a payload whose external variant points back at itself
        let mut buf = BytesMut::new();
        buf.write_small_int(0).unwrap();
        write_component_identifier(&mut buf, &ComponentIdentifier::module("g", "n", "1")).unwrap();
        buf.write_string("self").unwrap();
        write_attributes(&mut buf, &AttributeSet::empty()).unwrap();
        write_capabilities(&mut buf, &[]).unwrap();
        buf.write_small_int(0).unwrap();
        let err = ResolvedVariantSerializer::new()
            .read(&mut buf.freeze())
            .unwrap_err();
        expect!["variant index 0 refers to a variant that is still being read"]
            .assert_eq(&err.to_string());
    }

    #[test]
    fn reset_starts_a_new_dictionary() {
        let runtime = variant("runtime");
        let mut serializer = ResolvedVariantSerializer::new();
        let mut first = BytesMut::new();
        serializer.write(&mut first, Some(&runtime)).unwrap();
        serializer.reset();
        let mut second = BytesMut::new();
        serializer.write(&mut second, Some(&runtime)).unwrap();
        assert_eq!(first, second);
    }
}
