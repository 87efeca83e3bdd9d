//! AMF3 encoder
//!
//! AMF3 is the ActionScript 3.0 serialization format.
//! Reference: AMF3 File Format Specification (amf3_spec_121207)
//!
//! Type Markers:
//! ```text
//! 0x00 - Undefined
//! 0x01 - Null
//! 0x02 - False
//! 0x03 - True
//! 0x04 - Integer (29-bit, U29)
//! 0x05 - Double (IEEE 754)
//! 0x06 - String (U29 length/reference)
//! 0x07 - XML Document
//! 0x08 - Date (reference + double)
//! 0x09 - Array (associative + dense)
//! 0x0A - Object (traits + members)
//! 0x0C - ByteArray
//! 0x0D - Vector<int>        (Flash 10)
//! 0x0E - Vector<uint>       (Flash 10)
//! 0x0F - Vector<double>     (Flash 10)
//! 0x10 - Vector<object>     (Flash 10)
//! 0x11 - Dictionary         (Flash 10)
//! ```
//!
//! Every value after its marker starts with a U29 whose low bit selects
//! inline body (1) or back reference (0). Strings, objects, and class
//! definitions each have their own reference table; composite writers
//! insert into the object table before recursing so cyclic graphs resolve
//! to the outer index.

use std::sync::Arc;

use crate::amf::context::{EncodingContext, RefKey};
use crate::amf::value::{read, AmfObject, AmfValue};
use crate::error::{AmfError, Result};
use crate::registry::ClassDescription;
use crate::sink::ByteSink;

// AMF3 type markers
const MARKER_UNDEFINED: u8 = 0x00;
const MARKER_NULL: u8 = 0x01;
const MARKER_FALSE: u8 = 0x02;
const MARKER_TRUE: u8 = 0x03;
const MARKER_INTEGER: u8 = 0x04;
const MARKER_DOUBLE: u8 = 0x05;
const MARKER_STRING: u8 = 0x06;
const MARKER_XML_DOC: u8 = 0x07;
const MARKER_DATE: u8 = 0x08;
const MARKER_ARRAY: u8 = 0x09;
const MARKER_OBJECT: u8 = 0x0A;
const MARKER_BYTE_ARRAY: u8 = 0x0C;
const MARKER_VECTOR_INT: u8 = 0x0D;
const MARKER_VECTOR_UINT: u8 = 0x0E;
const MARKER_VECTOR_DOUBLE: u8 = 0x0F;
const MARKER_VECTOR_OBJECT: u8 = 0x10;
const MARKER_DICTIONARY: u8 = 0x11;

/// Range representable by the 29-bit signed AMF3 integer
const INTEGER_MIN: i32 = -0x1000_0000;
const INTEGER_MAX: i32 = 0x0FFF_FFFF;

/// AMF3 encoder over a session context and a byte sink
///
/// Externalizable values receive a `&mut` handle to this type to emit
/// their own bodies; recursion through that handle shares the session's
/// depth limit.
pub struct Amf3Encoder<'a> {
    ctx: &'a mut EncodingContext,
    sink: &'a mut ByteSink,
}

impl<'a> Amf3Encoder<'a> {
    pub fn new(ctx: &'a mut EncodingContext, sink: &'a mut ByteSink) -> Self {
        Self { ctx, sink }
    }

    /// Write a single AMF3 value, dispatching on its kind
    pub fn write_value(&mut self, value: &AmfValue) -> Result<()> {
        match value {
            AmfValue::Undefined => self.sink.write_u8(MARKER_UNDEFINED),
            AmfValue::Null => self.sink.write_u8(MARKER_NULL),
            AmfValue::Boolean(false) => self.sink.write_u8(MARKER_FALSE),
            AmfValue::Boolean(true) => self.sink.write_u8(MARKER_TRUE),
            AmfValue::Integer(i) => {
                if (INTEGER_MIN..=INTEGER_MAX).contains(i) {
                    self.sink.write_u8(MARKER_INTEGER)?;
                    self.write_u29(*i as u32)
                } else {
                    self.write_double(*i as f64)
                }
            }
            AmfValue::Number(n) => self.write_double(*n),
            AmfValue::String(s) => {
                self.sink.write_u8(MARKER_STRING)?;
                self.write_utf8(s)
            }
            AmfValue::XmlDocument(s) | AmfValue::Xml(s) => {
                self.sink.write_u8(MARKER_XML_DOC)?;
                self.write_utf8(s)
            }
            AmfValue::Date(ms) => self.write_date(*ms),
            AmfValue::Array(items) => {
                self.sink.write_u8(MARKER_ARRAY)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let items = read(items);
                self.write_inline_header(items.len() as u32)?;
                // no associative portion
                self.write_utf8("")?;
                self.ctx.descend()?;
                for item in items.iter() {
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                Ok(())
            }
            AmfValue::Map(entries) => {
                self.sink.write_u8(MARKER_ARRAY)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let entries = read(entries);
                // no dense portion
                self.write_inline_header(0)?;
                self.ctx.descend()?;
                for (key, item) in entries.iter() {
                    self.write_utf8(key)?;
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                self.write_utf8("")
            }
            AmfValue::Dictionary(entries) => {
                if !self.ctx.settings.flash10_types {
                    return self.write_dictionary_fallback(value, &read(entries));
                }
                self.sink.write_u8(MARKER_DICTIONARY)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let entries = read(entries);
                self.write_inline_header(entries.len() as u32)?;
                // weak-key flag, never set
                self.sink.write_u8(0)?;
                self.ctx.descend()?;
                for (key, item) in entries.iter() {
                    self.write_value(key)?;
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                Ok(())
            }
            AmfValue::ByteArray(bytes) => {
                self.sink.write_u8(MARKER_BYTE_ARRAY)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                self.write_inline_header(bytes.len() as u32)?;
                self.sink.write_bytes(bytes)
            }
            AmfValue::Object(_) | AmfValue::External(_) => self.write_object(value),
            AmfValue::VectorInt(v) => {
                if !self.ctx.settings.flash10_types {
                    let items: Vec<AmfValue> =
                        read(v).items.iter().map(|i| AmfValue::Integer(*i)).collect();
                    return self.write_value(&AmfValue::array(items));
                }
                self.sink.write_u8(MARKER_VECTOR_INT)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let v = read(v);
                self.write_inline_header(v.items.len() as u32)?;
                self.sink.write_u8(v.fixed as u8)?;
                for item in &v.items {
                    self.sink.write_i32_be(*item)?;
                }
                Ok(())
            }
            AmfValue::VectorUInt(v) => {
                if !self.ctx.settings.flash10_types {
                    let items: Vec<AmfValue> =
                        read(v).items.iter().map(|i| AmfValue::Number(*i as f64)).collect();
                    return self.write_value(&AmfValue::array(items));
                }
                self.sink.write_u8(MARKER_VECTOR_UINT)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let v = read(v);
                self.write_inline_header(v.items.len() as u32)?;
                self.sink.write_u8(v.fixed as u8)?;
                for item in &v.items {
                    self.sink.write_u32_be(*item)?;
                }
                Ok(())
            }
            AmfValue::VectorDouble(v) => {
                if !self.ctx.settings.flash10_types {
                    let items: Vec<AmfValue> =
                        read(v).items.iter().map(|i| AmfValue::Number(*i)).collect();
                    return self.write_value(&AmfValue::array(items));
                }
                self.sink.write_u8(MARKER_VECTOR_DOUBLE)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let v = read(v);
                self.write_inline_header(v.items.len() as u32)?;
                self.sink.write_u8(v.fixed as u8)?;
                for item in &v.items {
                    self.sink.write_f64_be(*item)?;
                }
                Ok(())
            }
            AmfValue::VectorObject(v) => {
                if !self.ctx.settings.flash10_types {
                    let items = read(v).items.clone();
                    return self.write_value(&AmfValue::array(items));
                }
                self.sink.write_u8(MARKER_VECTOR_OBJECT)?;
                if self.check_reference(value)? {
                    return Ok(());
                }
                let v = read(v);
                self.write_inline_header(v.items.len() as u32)?;
                self.sink.write_u8(v.fixed as u8)?;
                // any-type element class name
                self.write_utf8("*")?;
                self.ctx.descend()?;
                for item in &v.items {
                    self.write_value(item)?;
                }
                self.ctx.ascend();
                Ok(())
            }
        }
    }

    /// Encode the low 29 bits of `n` in 1-4 bytes.
    ///
    /// The first three bytes carry 7 data bits with the high bit flagging
    /// continuation; a fourth byte carries a full 8 bits.
    pub fn write_u29(&mut self, n: u32) -> Result<()> {
        let n = n & 0x1FFF_FFFF;
        if n < 0x80 {
            self.sink.write_u8(n as u8)
        } else if n < 0x4000 {
            self.sink.write_u8(0x80 | (n >> 7) as u8)?;
            self.sink.write_u8((n & 0x7F) as u8)
        } else if n < 0x20_0000 {
            self.sink.write_u8(0x80 | (n >> 14) as u8)?;
            self.sink.write_u8(0x80 | ((n >> 7) & 0x7F) as u8)?;
            self.sink.write_u8((n & 0x7F) as u8)
        } else {
            self.sink.write_u8(0x80 | (n >> 22) as u8)?;
            self.sink.write_u8(0x80 | ((n >> 15) & 0x7F) as u8)?;
            self.sink.write_u8(0x80 | ((n >> 8) & 0x7F) as u8)?;
            self.sink.write_u8((n & 0xFF) as u8)
        }
    }

    /// U29 with the low bit set: an inline body with `n` as count/length
    fn write_inline_header(&mut self, n: u32) -> Result<()> {
        self.write_u29((n << 1) | 1)
    }

    /// U29 with the low bit clear: a back reference to `index`
    fn write_reference(&mut self, index: u32) -> Result<()> {
        self.write_u29(index << 1)
    }

    /// AMF3 string: empty inline, table reference, or inline body.
    ///
    /// The empty string is never entered in the string table.
    pub fn write_utf8(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            return self.write_inline_header(0);
        }
        if let Some(index) = self.ctx.amf3_string_reference(s) {
            return self.write_reference(index);
        }
        self.ctx.add_amf3_string(s);
        self.write_inline_header(s.len() as u32)?;
        self.sink.write_bytes(s.as_bytes())
    }

    fn write_double(&mut self, n: f64) -> Result<()> {
        self.sink.write_u8(MARKER_DOUBLE)?;
        self.sink.write_f64_be(n)
    }

    /// Dates key the object reference table on the timestamp value
    fn write_date(&mut self, ms: f64) -> Result<()> {
        self.sink.write_u8(MARKER_DATE)?;
        let key = RefKey::Date(ms.to_bits());
        if let Some(index) = self.ctx.amf3_object_reference(key) {
            return self.write_reference(index);
        }
        self.ctx.add_amf3_object(key);
        self.write_inline_header(0)?;
        self.sink.write_f64_be(ms)
    }

    /// After the type marker: emit a back reference if the value was
    /// already written this session, else enter it in the table
    fn check_reference(&mut self, value: &AmfValue) -> Result<bool> {
        let identity = match value.identity() {
            Some(id) => id,
            None => return Ok(false),
        };
        if let Some(index) = self.ctx.amf3_object_reference(RefKey::Identity(identity)) {
            self.write_reference(index)?;
            return Ok(true);
        }
        self.ctx.add_amf3_object(RefKey::Identity(identity));
        Ok(false)
    }

    fn write_object(&mut self, value: &AmfValue) -> Result<()> {
        self.sink.write_u8(MARKER_OBJECT)?;
        if self.check_reference(value)? {
            return Ok(());
        }

        match value {
            AmfValue::Object(obj) => {
                let obj = read(obj);
                let description = match &obj.class_name {
                    Some(name) => self.ctx.registry.resolve(name)?,
                    None => None,
                };
                match description {
                    Some(desc) => self.write_described_object(&obj, &desc),
                    None => {
                        // anonymous dynamic object, keeping the class name
                        // the registry declined to describe
                        let name = obj.class_name.clone().unwrap_or_default();
                        let desc = self.ctx.adhoc_class(&name, false);
                        self.write_traits(&desc)?;
                        self.ctx.descend()?;
                        for (key, item) in &obj.entries {
                            self.write_utf8(key)?;
                            self.write_value(item)?;
                        }
                        self.ctx.ascend();
                        self.write_utf8("")
                    }
                }
            }
            AmfValue::External(external) => {
                let desc = match self.ctx.registry.resolve(external.class_name())? {
                    Some(desc) if desc.is_externalizable => desc,
                    Some(desc) => {
                        return Err(AmfError::NotExternalizable(desc.name.clone()).into());
                    }
                    None => self.ctx.adhoc_class(external.class_name(), true),
                };
                self.write_traits(&desc)?;
                self.ctx.descend()?;
                external.write_external(self)?;
                self.ctx.ascend();
                Ok(())
            }
            _ => unreachable!("write_object called on a non-object value"),
        }
    }

    fn write_described_object(&mut self, obj: &AmfObject, desc: &Arc<ClassDescription>) -> Result<()> {
        if desc.is_externalizable {
            // the class claims to emit itself but the value has no
            // body-emit capability
            return Err(AmfError::NotExternalizable(desc.name.clone()).into());
        }

        self.write_traits(desc)?;
        self.ctx.descend()?;
        for member in &desc.members {
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
            self.write_utf8("")?;
        }
        self.ctx.ascend();
        Ok(())
    }

    /// Emit the traits header: a class-definition reference when the
    /// description was already defined this session, else the full
    /// definition (flags, class name, sealed member names)
    fn write_traits(&mut self, desc: &Arc<ClassDescription>) -> Result<()> {
        let identity = Arc::as_ptr(desc) as usize;
        if let Some(index) = self.ctx.amf3_class_reference(identity) {
            return self.write_u29((index << 2) | 0b01);
        }
        self.ctx.add_amf3_class(identity);

        let header = ((desc.members.len() as u32) << 4)
            | ((desc.is_dynamic as u32) << 3)
            | ((desc.is_externalizable as u32) << 2)
            | 0b11;
        self.write_u29(header)?;
        self.write_utf8(&desc.name)?;
        for member in &desc.members {
            self.write_utf8(member)?;
        }
        Ok(())
    }

    /// Dictionary form when Flash-10 markers are disabled: the
    /// string-keyed associative array
    fn write_dictionary_fallback(
        &mut self,
        value: &AmfValue,
        entries: &[(AmfValue, AmfValue)],
    ) -> Result<()> {
        self.sink.write_u8(MARKER_ARRAY)?;
        if self.check_reference(value)? {
            return Ok(());
        }
        self.write_inline_header(0)?;
        self.ctx.descend()?;
        for (key, item) in entries {
            let key = key.as_str().ok_or_else(|| {
                AmfError::InvalidArgument(
                    "dictionary keys must be strings when Flash-10 types are disabled".to_string(),
                )
            })?;
            self.write_utf8(key)?;
            self.write_value(item)?;
        }
        self.ctx.ascend();
        self.write_utf8("")
    }
}
