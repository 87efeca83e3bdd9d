//! AMF0 encoder
//!
//! AMF0 is the original Action Message Format used in Flash/RTMP.
//! Reference: AMF0 File Format Specification (amf0_spec_121207)
//!
//! Type Markers:
//! ```text
//! 0x00 - Number (IEEE 754 double)
//! 0x01 - Boolean
//! 0x02 - String (UTF-8, 16-bit length prefix)
//! 0x03 - Object (key-value pairs until 0x000009)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x07 - Reference (16-bit index)
//! 0x08 - ECMA Array (associative array)
//! 0x09 - Object End (0x000009 sequence)
//! 0x0A - Strict Array (dense array)
//! 0x0B - Date (double + timezone)
//! 0x0C - Long String (UTF-8, 32-bit length prefix)
//! 0x0F - XML Document
//! 0x10 - Typed Object (class name + properties)
//! 0x11 - AVM+ (switch to AMF3)
//! ```
//!
//! Composite values are entered in the session's reference table *before*
//! their body goes out; any later occurrence of the same value (by
//! identity) is a two-byte back reference. That ordering is what lets a
//! structure that contains itself serialize at all.

use crate::amf::context::{EncodingContext, ObjectEncoding};
use crate::amf::value::{read, AmfObject, AmfValue};
use crate::amf::Amf3Encoder;
use crate::error::{AmfError, Result};
use crate::registry::ClassDescription;
use crate::sink::ByteSink;

// AMF0 type markers
const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;
const MARKER_XML_DOCUMENT: u8 = 0x0F;
const MARKER_TYPED_OBJECT: u8 = 0x10;
const MARKER_AVMPLUS: u8 = 0x11;

/// AMF0 encoder over a session context and a byte sink
///
/// This is also the top-level entry point for AMF items: under
/// [`ObjectEncoding::Amf3`] each item is written as the `avmplus` escape
/// marker followed by the AMF3 encoding.
pub struct Amf0Encoder<'a> {
    ctx: &'a mut EncodingContext,
    sink: &'a mut ByteSink,
}

impl<'a> Amf0Encoder<'a> {
    pub fn new(ctx: &'a mut EncodingContext, sink: &'a mut ByteSink) -> Self {
        Self { ctx, sink }
    }

    /// Write one top-level AMF item under the session's object encoding
    pub fn write_item(&mut self, value: &AmfValue) -> Result<()> {
        match self.ctx.encoding {
            ObjectEncoding::Amf0 => self.write_value(value),
            ObjectEncoding::Amf3 => {
                self.sink.write_u8(MARKER_AVMPLUS)?;
                Amf3Encoder::new(self.ctx, self.sink).write_value(value)
            }
        }
    }

    /// Write a single AMF0 value, dispatching on its kind
    pub fn write_value(&mut self, value: &AmfValue) -> Result<()> {
        // values already emitted this session become back references
        if let Some(identity) = value.identity() {
            if let Some(index) = self.ctx.amf0_reference(identity) {
                self.sink.write_u8(MARKER_REFERENCE)?;
                return self.sink.write_u16_be(index);
            }
        }

        match value {
            AmfValue::Null => self.sink.write_u8(MARKER_NULL),
            AmfValue::Undefined => self.sink.write_u8(MARKER_UNDEFINED),
            AmfValue::Boolean(b) => {
                self.sink.write_u8(MARKER_BOOLEAN)?;
                self.sink.write_u8(if *b { 1 } else { 0 })
            }
            AmfValue::Number(n) => self.write_number(*n),
            // AMF0 has no integer type
            AmfValue::Integer(i) => self.write_number(*i as f64),
            AmfValue::String(s) => self.write_string(s),
            AmfValue::Date(ms) => {
                self.sink.write_u8(MARKER_DATE)?;
                self.sink.write_f64_be(*ms)?;
                // reserved time zone
                self.sink.write_u16_be(0)
            }
            AmfValue::XmlDocument(s) | AmfValue::Xml(s) => self.write_xml(value, s),
            AmfValue::Array(items) => {
                self.add_reference(value);
                let items = read(items);
                self.sink.write_u8(MARKER_STRICT_ARRAY)?;
                self.sink.write_u32_be(items.len() as u32)?;
                self.ctx.descend()?;
                for item in items.iter() {
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                Ok(())
            }
            AmfValue::Map(entries) => {
                self.add_reference(value);
                let entries = read(entries);
                self.sink.write_u8(MARKER_ECMA_ARRAY)?;
                self.sink.write_u32_be(entries.len() as u32)?;
                self.ctx.descend()?;
                for (key, item) in entries.iter() {
                    self.write_utf8(key)?;
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                self.write_object_end()
            }
            AmfValue::Dictionary(entries) => {
                // AMF0 has no dictionary; string-keyed entries go out as an
                // ECMA array, anything else cannot be represented
                self.add_reference(value);
                let entries = read(entries);
                self.sink.write_u8(MARKER_ECMA_ARRAY)?;
                self.sink.write_u32_be(entries.len() as u32)?;
                self.ctx.descend()?;
                for (key, item) in entries.iter() {
                    let key = key.as_str().ok_or_else(|| {
                        AmfError::InvalidArgument(
                            "AMF0 dictionary keys must be strings".to_string(),
                        )
                    })?;
                    self.write_utf8(key)?;
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                self.write_object_end()
            }
            AmfValue::Object(obj) => {
                self.add_reference(value);
                let obj = read(obj);
                self.write_object(&obj)
            }
            AmfValue::External(e) => Err(AmfError::InvalidArgument(format!(
                "externalizable type {} requires AMF3 object encoding",
                e.class_name()
            ))
            .into()),
            // vectors fall back to the native array form
            AmfValue::VectorInt(v) => {
                let items: Vec<AmfValue> =
                    read(v).items.iter().map(|i| AmfValue::Number(*i as f64)).collect();
                self.write_native_array(value, &items)
            }
            AmfValue::VectorUInt(v) => {
                let items: Vec<AmfValue> =
                    read(v).items.iter().map(|i| AmfValue::Number(*i as f64)).collect();
                self.write_native_array(value, &items)
            }
            AmfValue::VectorDouble(v) => {
                let items: Vec<AmfValue> =
                    read(v).items.iter().map(|i| AmfValue::Number(*i)).collect();
                self.write_native_array(value, &items)
            }
            AmfValue::VectorObject(v) => {
                let items = read(v).items.clone();
                self.write_native_array(value, &items)
            }
            AmfValue::ByteArray(bytes) => {
                let items: Vec<AmfValue> =
                    bytes.iter().map(|b| AmfValue::Number(*b as f64)).collect();
                self.write_native_array(value, &items)
            }
        }
    }

    fn write_number(&mut self, n: f64) -> Result<()> {
        self.sink.write_u8(MARKER_NUMBER)?;
        self.sink.write_f64_be(n)
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        if s.len() > u16::MAX as usize {
            self.sink.write_u8(MARKER_LONG_STRING)?;
            self.sink.write_u32_be(s.len() as u32)?;
            self.sink.write_bytes(s.as_bytes())
        } else {
            self.sink.write_u8(MARKER_STRING)?;
            self.write_utf8(s)
        }
    }

    fn write_xml(&mut self, value: &AmfValue, s: &str) -> Result<()> {
        self.add_reference(value);
        self.sink.write_u8(MARKER_XML_DOCUMENT)?;
        self.sink.write_u32_be(s.len() as u32)?;
        self.sink.write_bytes(s.as_bytes())
    }

    fn write_object(&mut self, obj: &AmfObject) -> Result<()> {
        let description = match &obj.class_name {
            Some(name) => self.ctx.registry.resolve(name)?,
            None => None,
        };

        match description {
            Some(desc) => self.write_typed_object(obj, &desc),
            None => {
                self.sink.write_u8(MARKER_OBJECT)?;
                self.ctx.descend()?;
                for (key, item) in &obj.entries {
                    self.write_utf8(key)?;
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                self.write_object_end()
            }
        }
    }

    fn write_typed_object(&mut self, obj: &AmfObject, desc: &ClassDescription) -> Result<()> {
        if desc.is_externalizable {
            return Err(AmfError::InvalidArgument(format!(
                "externalizable type {} requires AMF3 object encoding",
                desc.name
            ))
            .into());
        }

        self.sink.write_u8(MARKER_TYPED_OBJECT)?;
        self.write_utf8(&desc.name)?;
        self.ctx.descend()?;
        for member in &desc.members {
            self.write_utf8(member)?;
            match obj.get(member) {
                Some(item) => self.write_value(item)?,
                None => self.sink.write_u8(MARKER_UNDEFINED)?,
            }
        }
        if desc.is_dynamic {
            for (key, item) in &obj.entries {
                if !desc.members.iter().any(|m| m == key) {
                    self.write_utf8(key)?;
                    self.write_value(item)?;
                }
            }
        }
        self.ctx.ascend();
        self.write_object_end()
    }

    fn write_native_array(&mut self, value: &AmfValue, items: &[AmfValue]) -> Result<()> {
        self.add_reference(value);
        self.sink.write_u8(MARKER_STRICT_ARRAY)?;
        self.sink.write_u32_be(items.len() as u32)?;
        self.ctx.descend()?;
        for item in items {
            self.write_value(item)?;
        }
        self.ctx.ascend();
        Ok(())
    }

    /// Enter a composite into the reference table before its body
    fn add_reference(&mut self, value: &AmfValue) {
        if let Some(identity) = value.identity() {
            self.ctx.add_amf0_reference(identity);
        }
    }

    /// Write a UTF-8 string with a 16-bit length prefix (no type marker)
    fn write_utf8(&mut self, s: &str) -> Result<()> {
        if s.len() > u16::MAX as usize {
            return Err(AmfError::StringTooLong(s.len()).into());
        }
        self.sink.write_u16_be(s.len() as u16)?;
        self.sink.write_bytes(s.as_bytes())
    }

    fn write_object_end(&mut self) -> Result<()> {
        self.sink.write_u16_be(0)?;
        self.sink.write_u8(MARKER_OBJECT_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MissingTypeStrategy, TypeRegistry};
    use bytes::Bytes;
    use std::sync::Arc;

    fn encode(value: &AmfValue) -> Bytes {
        encode_with(value, Arc::new(TypeRegistry::default()))
    }

    fn encode_with(value: &AmfValue, registry: Arc<TypeRegistry>) -> Bytes {
        let mut ctx = EncodingContext::new(ObjectEncoding::Amf0, registry);
        let mut sink = ByteSink::buffered();
        Amf0Encoder::new(&mut ctx, &mut sink)
            .write_item(value)
            .unwrap();
        sink.take().unwrap()
    }

    #[test]
    fn test_short_string() {
        let encoded = encode(&AmfValue::String("hi".into()));
        assert_eq!(&encoded[..], &[0x02, 0x00, 0x02, 0x68, 0x69]);
    }

    #[test]
    fn test_number() {
        let encoded = encode(&AmfValue::Number(1.0));
        assert_eq!(
            &encoded[..],
            &[0x00, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_integer_becomes_number() {
        assert_eq!(encode(&AmfValue::Integer(1)), encode(&AmfValue::Number(1.0)));
    }

    #[test]
    fn test_boolean_and_null() {
        assert_eq!(&encode(&AmfValue::Boolean(true))[..], &[0x01, 0x01]);
        assert_eq!(&encode(&AmfValue::Boolean(false))[..], &[0x01, 0x00]);
        assert_eq!(&encode(&AmfValue::Null)[..], &[0x05]);
        assert_eq!(&encode(&AmfValue::Undefined)[..], &[0x06]);
    }

    #[test]
    fn test_long_string_marker() {
        let long = "x".repeat(70000);
        let encoded = encode(&AmfValue::String(long));
        assert_eq!(encoded[0], 0x0C);
        assert_eq!(&encoded[1..5], &70000u32.to_be_bytes());
        assert_eq!(encoded.len(), 5 + 70000);
    }

    #[test]
    fn test_date_has_timezone_pad() {
        let encoded = encode(&AmfValue::Date(0.0));
        assert_eq!(encoded.len(), 1 + 8 + 2);
        assert_eq!(encoded[0], 0x0B);
        assert_eq!(&encoded[9..], &[0x00, 0x00]);
    }

    #[test]
    fn test_strict_array() {
        let value = AmfValue::array(vec![AmfValue::Boolean(true), AmfValue::Null]);
        let encoded = encode(&value);
        assert_eq!(
            &encoded[..],
            &[0x0A, 0x00, 0x00, 0x00, 0x02, 0x01, 0x01, 0x05]
        );
    }

    #[test]
    fn test_ecma_array() {
        let value = AmfValue::map(vec![("a".to_string(), AmfValue::Boolean(true))]);
        let encoded = encode(&value);
        assert_eq!(
            &encoded[..],
            &[
                0x08, 0x00, 0x00, 0x00, 0x01, // marker + count
                0x00, 0x01, b'a', // key
                0x01, 0x01, // value
                0x00, 0x00, 0x09, // terminator
            ]
        );
    }

    #[test]
    fn test_anonymous_object() {
        let value = AmfValue::object(vec![("ok".to_string(), AmfValue::Boolean(true))]);
        let encoded = encode(&value);
        assert_eq!(
            &encoded[..],
            &[
                0x03, // marker
                0x00, 0x02, b'o', b'k', // key
                0x01, 0x01, // value
                0x00, 0x00, 0x09, // terminator
            ]
        );
    }

    #[test]
    fn test_typed_object() {
        let registry = Arc::new(TypeRegistry::default());
        registry.register(crate::registry::ClassDescription::sealed(
            "T",
            vec!["v".into()],
        ));
        let value = AmfValue::typed_object("T", vec![("v".to_string(), AmfValue::Null)]);
        let encoded = encode_with(&value, registry);
        assert_eq!(
            &encoded[..],
            &[
                0x10, // marker
                0x00, 0x01, b'T', // class name
                0x00, 0x01, b'v', // member name
                0x05, // member value
                0x00, 0x00, 0x09, // terminator
            ]
        );
    }

    #[test]
    fn test_unregistered_class_falls_back_to_anonymous() {
        let value = AmfValue::typed_object("nope.Missing", vec![]);
        let encoded = encode(&value);
        assert_eq!(&encoded[..], &[0x03, 0x00, 0x00, 0x09]);
    }

    #[test]
    fn test_exception_strategy_fails_unregistered_class() {
        let registry = Arc::new(TypeRegistry::new(MissingTypeStrategy::Exception));
        let value = AmfValue::typed_object("nope.Missing", vec![]);
        let mut ctx = EncodingContext::new(ObjectEncoding::Amf0, registry);
        let mut sink = ByteSink::buffered();
        let result = Amf0Encoder::new(&mut ctx, &mut sink).write_item(&value);
        assert!(result.is_err());
    }

    #[test]
    fn test_repeated_value_becomes_reference() {
        let obj = AmfValue::object(vec![]);
        let outer = AmfValue::array(vec![obj.clone(), obj]);

        let encoded = encode(&outer);
        assert_eq!(
            &encoded[..],
            &[
                0x0A, 0x00, 0x00, 0x00, 0x02, // outer array (index 0)
                0x03, 0x00, 0x00, 0x09, // object body (index 1)
                0x07, 0x00, 0x01, // reference to index 1
            ]
        );
    }

    #[test]
    fn test_self_reference_terminates() {
        let arr = AmfValue::array(vec![]);
        if let AmfValue::Array(cell) = &arr {
            crate::amf::value::write(cell).push(arr.clone());
        }

        let encoded = encode(&arr);
        assert_eq!(
            &encoded[..],
            &[
                0x0A, 0x00, 0x00, 0x00, 0x01, // array header (index 0)
                0x07, 0x00, 0x00, // reference to itself
            ]
        );
    }

    #[test]
    fn test_structurally_equal_values_not_shared() {
        let outer = AmfValue::array(vec![AmfValue::object(vec![]), AmfValue::object(vec![])]);
        let encoded = encode(&outer);
        // two full object bodies, no references
        assert_eq!(
            &encoded[..],
            &[
                0x0A, 0x00, 0x00, 0x00, 0x02, //
                0x03, 0x00, 0x00, 0x09, //
                0x03, 0x00, 0x00, 0x09,
            ]
        );
    }

    #[test]
    fn test_amf3_escape_marker() {
        let mut ctx = EncodingContext::new(
            ObjectEncoding::Amf3,
            Arc::new(TypeRegistry::default()),
        );
        let mut sink = ByteSink::buffered();
        Amf0Encoder::new(&mut ctx, &mut sink)
            .write_item(&AmfValue::Null)
            .unwrap();
        // avmplus marker, then the AMF3 null
        assert_eq!(&sink.take().unwrap()[..], &[0x11, 0x01]);
    }

    #[test]
    fn test_oversize_field_name_rejected() {
        let key = "k".repeat(70000);
        let value = AmfValue::object(vec![(key, AmfValue::Null)]);
        let mut ctx =
            EncodingContext::new(ObjectEncoding::Amf0, Arc::new(TypeRegistry::default()));
        let mut sink = ByteSink::buffered();
        let result = Amf0Encoder::new(&mut ctx, &mut sink).write_item(&value);
        assert!(matches!(
            result,
            Err(crate::error::Error::Amf(AmfError::StringTooLong(_)))
        ));
    }

    #[test]
    fn test_xml_document() {
        let encoded = encode(&AmfValue::XmlDocument("<a/>".into()));
        assert_eq!(
            &encoded[..],
            &[0x0F, 0x00, 0x00, 0x00, 0x04, b'<', b'a', b'/', b'>']
        );
    }
}
