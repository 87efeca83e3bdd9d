//! Per-session encoding state
//!
//! Reference indices must never leak across message boundaries, so each
//! message body gets a context of its own (or an explicit [`reset`]).
//!
//! [`reset`]: EncodingContext::reset

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AmfError, Result};
use crate::registry::{ClassDescription, TypeRegistry};

/// Maximum nesting depth for objects/arrays/externalizable re-entry
/// (prevent stack overflow)
pub(crate) const MAX_NESTING_DEPTH: usize = 64;

/// Which AMF encoding top-level items are written in
///
/// Under `Amf3`, every top-level item is an AMF0 `avmplus` escape (0x11)
/// followed by the AMF3 encoding of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectEncoding {
    #[default]
    Amf0,
    Amf3,
}

/// Optional AMF3 behavior toggles
#[derive(Debug, Clone, Copy)]
pub struct Amf3Settings {
    /// Emit Flash-10 vector and dictionary markers. When disabled, vector
    /// values fall back to the plain array writers and dictionaries to the
    /// associative array form.
    pub flash10_types: bool,
}

impl Default for Amf3Settings {
    fn default() -> Self {
        Self { flash10_types: true }
    }
}

/// Key into the AMF3 object reference table.
///
/// Composites key on their shared identity; dates key on the timestamp
/// value itself, per the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RefKey {
    Identity(usize),
    Date(u64),
}

/// Reference tables and limits for one encoding session
///
/// Holds the four tables of the AMF formats: AMF0 objects, AMF3 objects,
/// AMF3 strings, and AMF3 class definitions. Indices are assigned
/// 0,1,2,… in insertion order, and composite writers insert *before*
/// recursing into their contents so self-referential graphs terminate.
#[derive(Debug)]
pub struct EncodingContext {
    pub(crate) encoding: ObjectEncoding,
    pub(crate) settings: Amf3Settings,
    pub(crate) registry: Arc<TypeRegistry>,
    amf0_objects: HashMap<usize, u16>,
    amf3_objects: HashMap<RefKey, u32>,
    amf3_strings: HashMap<String, u32>,
    amf3_classes: HashMap<usize, u32>,
    /// Trait descriptions synthesized this session for anonymous and
    /// unregistered classes, keyed by (name, externalizable). Retained so
    /// their identities in `amf3_classes` stay valid for the session.
    adhoc_classes: HashMap<(String, bool), Arc<ClassDescription>>,
    depth: usize,
}

impl EncodingContext {
    /// Create a fresh context for one encoding session
    pub fn new(encoding: ObjectEncoding, registry: Arc<TypeRegistry>) -> Self {
        Self::with_settings(encoding, registry, Amf3Settings::default())
    }

    /// Create a context with explicit AMF3 settings
    pub fn with_settings(
        encoding: ObjectEncoding,
        registry: Arc<TypeRegistry>,
        settings: Amf3Settings,
    ) -> Self {
        Self {
            encoding,
            settings,
            registry,
            amf0_objects: HashMap::new(),
            amf3_objects: HashMap::new(),
            amf3_strings: HashMap::new(),
            amf3_classes: HashMap::new(),
            adhoc_classes: HashMap::new(),
            depth: 0,
        }
    }

    /// Clear all four reference tables, starting a new session
    pub fn reset(&mut self) {
        self.amf0_objects.clear();
        self.amf3_objects.clear();
        self.amf3_strings.clear();
        self.amf3_classes.clear();
        self.adhoc_classes.clear();
        self.depth = 0;
    }

    pub(crate) fn amf0_reference(&self, identity: usize) -> Option<u16> {
        self.amf0_objects.get(&identity).copied()
    }

    /// Assign the next AMF0 index to a value, before its body is written
    pub(crate) fn add_amf0_reference(&mut self, identity: usize) {
        let index = self.amf0_objects.len() as u16;
        self.amf0_objects.insert(identity, index);
    }

    pub(crate) fn amf3_object_reference(&self, key: RefKey) -> Option<u32> {
        self.amf3_objects.get(&key).copied()
    }

    pub(crate) fn add_amf3_object(&mut self, key: RefKey) {
        let index = self.amf3_objects.len() as u32;
        self.amf3_objects.insert(key, index);
    }

    pub(crate) fn amf3_string_reference(&self, s: &str) -> Option<u32> {
        self.amf3_strings.get(s).copied()
    }

    /// The empty string is never entered in the string table
    pub(crate) fn add_amf3_string(&mut self, s: &str) {
        debug_assert!(!s.is_empty());
        let index = self.amf3_strings.len() as u32;
        self.amf3_strings.insert(s.to_string(), index);
    }

    pub(crate) fn amf3_class_reference(&self, class_identity: usize) -> Option<u32> {
        self.amf3_classes.get(&class_identity).copied()
    }

    pub(crate) fn add_amf3_class(&mut self, class_identity: usize) {
        let index = self.amf3_classes.len() as u32;
        self.amf3_classes.insert(class_identity, index);
    }

    /// Trait description for a class the registry does not describe:
    /// anonymous objects, unregistered dynamic classes, and ad-hoc
    /// externalizable values. One description per (name, flavor) per
    /// session, so repeat emissions reuse the trait definition.
    pub(crate) fn adhoc_class(&mut self, name: &str, externalizable: bool) -> Arc<ClassDescription> {
        if let Some(desc) = self.adhoc_classes.get(&(name.to_string(), externalizable)) {
            return desc.clone();
        }
        let desc = Arc::new(ClassDescription {
            name: name.to_string(),
            members: Vec::new(),
            is_dynamic: !externalizable,
            is_externalizable: externalizable,
        });
        self.adhoc_classes
            .insert((name.to_string(), externalizable), desc.clone());
        desc
    }

    /// Enter one level of composite/externalizable recursion
    pub(crate) fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(AmfError::NestingTooDeep.into());
        }
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> EncodingContext {
        EncodingContext::new(ObjectEncoding::Amf0, Arc::new(TypeRegistry::default()))
    }

    #[test]
    fn test_indices_in_insertion_order() {
        let mut ctx = context();
        ctx.add_amf0_reference(0x1000);
        ctx.add_amf0_reference(0x2000);
        ctx.add_amf0_reference(0x3000);
        assert_eq!(ctx.amf0_reference(0x1000), Some(0));
        assert_eq!(ctx.amf0_reference(0x2000), Some(1));
        assert_eq!(ctx.amf0_reference(0x3000), Some(2));
        assert_eq!(ctx.amf0_reference(0x4000), None);
    }

    #[test]
    fn test_reset_clears_all_tables() {
        let mut ctx = context();
        ctx.add_amf0_reference(1);
        ctx.add_amf3_object(RefKey::Identity(1));
        ctx.add_amf3_object(RefKey::Date(123));
        ctx.add_amf3_string("hello");
        ctx.add_amf3_class(7);

        ctx.reset();

        assert_eq!(ctx.amf0_reference(1), None);
        assert_eq!(ctx.amf3_object_reference(RefKey::Identity(1)), None);
        assert_eq!(ctx.amf3_object_reference(RefKey::Date(123)), None);
        assert_eq!(ctx.amf3_string_reference("hello"), None);
        assert_eq!(ctx.amf3_class_reference(7), None);
    }

    #[test]
    fn test_depth_guard() {
        let mut ctx = context();
        for _ in 0..MAX_NESTING_DEPTH {
            ctx.descend().unwrap();
        }
        assert!(ctx.descend().is_err());
    }
}
