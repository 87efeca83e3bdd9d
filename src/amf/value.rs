//! AMF value types
//!
//! Both AMF0 and AMF3 share a common value representation. This enum
//! provides a unified type that can be serialized to either format.
//!
//! Composite variants (arrays, maps, objects, vectors) are held behind
//! `Arc<RwLock<_>>`. The `Arc` gives every value a stable identity for the
//! encoders' reference tables: a clone of the handle is the *same* value
//! on the wire, and a structure that contains itself encodes as a back
//! reference instead of recursing forever. The lock is what makes such
//! graphs constructible in the first place.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::registry::Externalizable;

/// Shared, identity-carrying interior of a composite value
pub type Shared<T> = Arc<RwLock<T>>;

pub(crate) fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Read a shared interior, ignoring lock poisoning (the data is still valid)
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

/// Write a shared interior, ignoring lock poisoning
pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// An anonymous or class-named object: an ordered, string-keyed map of
/// properties, plus the optional type name the registry oracle resolves.
#[derive(Debug, Default)]
pub struct AmfObject {
    /// Registered type name; `None` encodes as an anonymous object
    pub class_name: Option<String>,
    /// Properties in insertion order
    pub entries: Vec<(String, AmfValue)>,
}

impl AmfObject {
    /// Look up a property by name
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A Flash-10 typed vector with its fixed-length flag
#[derive(Debug, Default)]
pub struct AmfVector<T> {
    pub items: Vec<T>,
    pub fixed: bool,
}

/// Unified AMF value representation
///
/// This enum represents all value types supported by AMF0 and AMF3.
/// Some types (ByteArray, Dictionary, the vectors) are AMF3-only but
/// included for completeness.
#[derive(Debug, Clone)]
pub enum AmfValue {
    /// Null value (AMF0: 0x05, AMF3: 0x01)
    Null,

    /// Undefined value (AMF0: 0x06, AMF3: 0x00)
    Undefined,

    /// Boolean value (AMF0: 0x01, AMF3: 0x02/0x03)
    Boolean(bool),

    /// 29-bit integer in AMF3 (0x04); encoded as a Number in AMF0
    Integer(i32),

    /// IEEE 754 double-precision floating point (AMF0: 0x00, AMF3: 0x05)
    Number(f64),

    /// UTF-8 string (AMF0: 0x02/0x0C, AMF3: 0x06)
    String(String),

    /// Date value as milliseconds since the Unix epoch, UTC
    /// (AMF0: 0x0B, AMF3: 0x08)
    Date(f64),

    /// XML document (AMF0: 0x0F, AMF3: 0x07)
    XmlDocument(String),

    /// XML element, serialized (AMF3: 0x07 via the same string form)
    Xml(String),

    /// Raw byte array (AMF3 only: 0x0C)
    ByteArray(Bytes),

    /// Dense ordered array (AMF0: 0x0A StrictArray, AMF3: 0x09)
    Array(Shared<Vec<AmfValue>>),

    /// String-keyed associative map, insertion ordered
    /// (AMF0: 0x08 EcmaArray, AMF3: 0x09 associative form)
    Map(Shared<Vec<(String, AmfValue)>>),

    /// Arbitrary-keyed map (AMF3 only: 0x11 Dictionary)
    Dictionary(Shared<Vec<(AmfValue, AmfValue)>>),

    /// Anonymous or class-described object (AMF0: 0x03/0x10, AMF3: 0x0A)
    Object(Shared<AmfObject>),

    /// A value that emits its own AMF3 body (AMF3 trait flag)
    External(Arc<dyn Externalizable>),

    /// Flash-10 vector of 32-bit signed integers (AMF3: 0x0D)
    VectorInt(Shared<AmfVector<i32>>),

    /// Flash-10 vector of 32-bit unsigned integers (AMF3: 0x0E)
    VectorUInt(Shared<AmfVector<u32>>),

    /// Flash-10 vector of doubles (AMF3: 0x0F)
    VectorDouble(Shared<AmfVector<f64>>),

    /// Flash-10 vector of objects (AMF3: 0x10)
    VectorObject(Shared<AmfVector<AmfValue>>),
}

impl AmfValue {
    /// Create a dense array value
    pub fn array(items: Vec<AmfValue>) -> Self {
        AmfValue::Array(shared(items))
    }

    /// Create a string-keyed map value
    pub fn map(entries: Vec<(String, AmfValue)>) -> Self {
        AmfValue::Map(shared(entries))
    }

    /// Create an arbitrary-keyed dictionary value
    pub fn dictionary(entries: Vec<(AmfValue, AmfValue)>) -> Self {
        AmfValue::Dictionary(shared(entries))
    }

    /// Create an anonymous object value
    pub fn object(entries: Vec<(String, AmfValue)>) -> Self {
        AmfValue::Object(shared(AmfObject {
            class_name: None,
            entries,
        }))
    }

    /// Create an object carrying a registered type name
    pub fn typed_object(class_name: impl Into<String>, entries: Vec<(String, AmfValue)>) -> Self {
        AmfValue::Object(shared(AmfObject {
            class_name: Some(class_name.into()),
            entries,
        }))
    }

    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            AmfValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    /// Get a property from an object value
    pub fn get(&self, key: &str) -> Option<AmfValue> {
        match self {
            AmfValue::Object(obj) => read(obj).get(key).cloned(),
            AmfValue::Map(map) => read(map)
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Session-stable identity key for the reference tables.
    ///
    /// Only values that participate in back referencing have one. Clones
    /// of a composite handle share the key; structurally equal but
    /// distinct values do not.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            AmfValue::Array(a) => Some(Arc::as_ptr(a) as usize),
            AmfValue::Map(m) => Some(Arc::as_ptr(m) as usize),
            AmfValue::Dictionary(d) => Some(Arc::as_ptr(d) as usize),
            AmfValue::Object(o) => Some(Arc::as_ptr(o) as usize),
            AmfValue::External(e) => Some(Arc::as_ptr(e) as *const () as usize),
            AmfValue::VectorInt(v) => Some(Arc::as_ptr(v) as usize),
            AmfValue::VectorUInt(v) => Some(Arc::as_ptr(v) as usize),
            AmfValue::VectorDouble(v) => Some(Arc::as_ptr(v) as usize),
            AmfValue::VectorObject(v) => Some(Arc::as_ptr(v) as usize),
            AmfValue::ByteArray(b) => Some(b.as_ptr() as usize),
            // XML participates in the AMF0 table; a String's buffer address
            // is stable for the encoding session
            AmfValue::XmlDocument(s) | AmfValue::Xml(s) => Some(s.as_ptr() as usize),
            _ => None,
        }
    }
}

impl Default for AmfValue {
    fn default() -> Self {
        AmfValue::Null
    }
}

impl PartialEq for AmfValue {
    fn eq(&self, other: &Self) -> bool {
        use AmfValue::*;
        match (self, other) {
            (Null, Null) | (Undefined, Undefined) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (XmlDocument(a), XmlDocument(b)) => a == b,
            (Xml(a), Xml(b)) => a == b,
            (ByteArray(a), ByteArray(b)) => a == b,
            (Array(a), Array(b)) => Arc::ptr_eq(a, b) || *read(a) == *read(b),
            (Map(a), Map(b)) => Arc::ptr_eq(a, b) || *read(a) == *read(b),
            (Dictionary(a), Dictionary(b)) => Arc::ptr_eq(a, b) || *read(a) == *read(b),
            (Object(a), Object(b)) => {
                Arc::ptr_eq(a, b) || {
                    let (a, b) = (read(a), read(b));
                    a.class_name == b.class_name && a.entries == b.entries
                }
            }
            (External(a), External(b)) => Arc::ptr_eq(a, b),
            (VectorInt(a), VectorInt(b)) => vector_eq(a, b),
            (VectorUInt(a), VectorUInt(b)) => vector_eq(a, b),
            (VectorDouble(a), VectorDouble(b)) => vector_eq(a, b),
            (VectorObject(a), VectorObject(b)) => vector_eq(a, b),
            _ => false,
        }
    }
}

fn vector_eq<T: PartialEq>(a: &Shared<AmfVector<T>>, b: &Shared<AmfVector<T>>) -> bool {
    Arc::ptr_eq(a, b) || {
        let (a, b) = (read(a), read(b));
        a.fixed == b.fixed && a.items == b.items
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Number(v)
    }
}

impl From<i32> for AmfValue {
    fn from(v: i32) -> Self {
        AmfValue::Integer(v)
    }
}

impl From<u32> for AmfValue {
    fn from(v: u32) -> Self {
        AmfValue::Number(v as f64)
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}

impl From<Bytes> for AmfValue {
    fn from(v: Bytes) -> Self {
        AmfValue::ByteArray(v)
    }
}

impl<V: Into<AmfValue>> From<Vec<V>> for AmfValue {
    fn from(v: Vec<V>) -> Self {
        AmfValue::array(v.into_iter().map(|x| x.into()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let s = AmfValue::String("test".into());
        assert_eq!(s.as_str(), Some("test"));
        assert_eq!(s.as_number(), None);

        let n = AmfValue::Number(42.0);
        assert_eq!(n.as_number(), Some(42.0));

        let i = AmfValue::Integer(7);
        assert_eq!(i.as_number(), Some(7.0));

        let o = AmfValue::object(vec![("key".to_string(), "value".into())]);
        assert_eq!(o.get("key"), Some(AmfValue::String("value".into())));
        assert_eq!(o.get("missing"), None);
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = AmfValue::array(vec![AmfValue::Integer(1)]);
        let b = a.clone();
        assert_eq!(a.identity(), b.identity());

        let c = AmfValue::array(vec![AmfValue::Integer(1)]);
        assert_ne!(a.identity(), c.identity());
        // still structurally equal
        assert_eq!(a, c);
    }

    #[test]
    fn test_scalars_have_no_identity() {
        assert_eq!(AmfValue::Null.identity(), None);
        assert_eq!(AmfValue::Number(1.0).identity(), None);
        assert_eq!(AmfValue::String("x".into()).identity(), None);
        assert_eq!(AmfValue::Date(0.0).identity(), None);
    }

    #[test]
    fn test_self_referential_construction() {
        let arr = AmfValue::array(vec![]);
        if let AmfValue::Array(cell) = &arr {
            write(cell).push(arr.clone());
        }
        if let AmfValue::Array(cell) = &arr {
            let items = read(cell);
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].identity(), arr.identity());
        }
    }

    #[test]
    fn test_from_conversions() {
        let v: AmfValue = "test".into();
        assert!(matches!(v, AmfValue::String(_)));

        let v: AmfValue = 42.0.into();
        assert!(matches!(v, AmfValue::Number(_)));

        let v: AmfValue = 7i32.into();
        assert!(matches!(v, AmfValue::Integer(7)));

        let v: AmfValue = vec![1i32, 2, 3].into();
        assert!(matches!(v, AmfValue::Array(_)));
    }
}
