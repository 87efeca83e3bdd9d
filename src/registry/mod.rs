//! Class-description registry
//!
//! The encoders never inspect application types directly; they ask this
//! oracle. A registered [`ClassDescription`] turns an object with a class
//! name into a typed AMF object (AMF0 `TypedObject`, AMF3 trait-described
//! object). Unregistered names follow the configured
//! [`MissingTypeStrategy`].
//!
//! The registry is shared process-wide across encoders on concurrent
//! connections, so lookups take a read lock and the dynamic-fallback memo
//! is maintained with a check/lock/check insert.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::amf::Amf3Encoder;
use crate::error::{AmfError, Result};

/// The encoder's view of a named type's member layout and flags
///
/// Identity matters: the AMF3 class-definition reference table keys on the
/// `Arc` handle, so the same description registered once is emitted as a
/// trait reference on every reuse.
#[derive(Debug)]
pub struct ClassDescription {
    /// Fully qualified class name as it appears on the wire
    pub name: String,
    /// Sealed member names, in serialization order
    pub members: Vec<String>,
    /// Whether trailing dynamic string-keyed entries are permitted
    pub is_dynamic: bool,
    /// Whether the value emits its own AMF3 body
    pub is_externalizable: bool,
}

impl ClassDescription {
    /// Describe a sealed class with the given ordered members
    pub fn sealed(name: impl Into<String>, members: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members,
            is_dynamic: false,
            is_externalizable: false,
        })
    }

    /// Describe a dynamic class: sealed members plus free-form entries
    pub fn dynamic(name: impl Into<String>, members: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members,
            is_dynamic: true,
            is_externalizable: false,
        })
    }

    /// Describe an externalizable class
    pub fn externalizable(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members: Vec::new(),
            is_dynamic: false,
            is_externalizable: true,
        })
    }
}

/// A value whose AMF3 body serialization is delegated to the value itself
///
/// The implementation receives a re-entrant handle onto the AMF3 encoder
/// and writes its body through it. Recursion through nested values is
/// bounded by the encoder's depth limit.
pub trait Externalizable: fmt::Debug + Send + Sync {
    /// Class name emitted in the trait header
    fn class_name(&self) -> &str;

    /// Emit the body through the encoder handle
    fn write_external(&self, encoder: &mut Amf3Encoder<'_>) -> Result<()>;
}

/// What to do when an object names a type the registry does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTypeStrategy {
    /// Encode the value as an anonymous dynamic object
    #[default]
    DynamicObject,
    /// Fail the emission with `MissingClassDescription`
    Exception,
}

/// Process-wide mapping from class names to descriptions
pub struct TypeRegistry {
    classes: RwLock<HashMap<String, Arc<ClassDescription>>>,
    /// Names already resolved to the dynamic-object fallback, memoized so
    /// repeated encodes skip the miss path
    dynamic_memo: RwLock<HashSet<String>>,
    strategy: MissingTypeStrategy,
}

impl TypeRegistry {
    /// Create a registry with the given fallback strategy
    pub fn new(strategy: MissingTypeStrategy) -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            dynamic_memo: RwLock::new(HashSet::new()),
            strategy,
        }
    }

    /// Register a class description under its wire name
    pub fn register(&self, description: Arc<ClassDescription>) {
        let mut classes = self.classes.write().unwrap_or_else(|e| e.into_inner());
        classes.insert(description.name.clone(), description);
    }

    /// Resolve a class name to its description.
    ///
    /// `Ok(None)` means "encode as a dynamic object". Under the
    /// `Exception` strategy an unknown name is an error instead.
    pub fn resolve(&self, name: &str) -> Result<Option<Arc<ClassDescription>>> {
        {
            let classes = self.classes.read().unwrap_or_else(|e| e.into_inner());
            if let Some(desc) = classes.get(name) {
                return Ok(Some(desc.clone()));
            }
        }

        if self.strategy == MissingTypeStrategy::Exception {
            return Err(AmfError::MissingClassDescription(name.to_string()).into());
        }

        {
            let memo = self.dynamic_memo.read().unwrap_or_else(|e| e.into_inner());
            if memo.contains(name) {
                return Ok(None);
            }
        }

        // check/lock/check: another encoder may have memoized concurrently
        let mut memo = self.dynamic_memo.write().unwrap_or_else(|e| e.into_inner());
        if !memo.contains(name) {
            tracing::trace!(class = name, "memoizing dynamic-object fallback");
            memo.insert(name.to_string());
        }
        Ok(None)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(MissingTypeStrategy::DynamicObject)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self.classes.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("TypeRegistry")
            .field("classes", &classes.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = TypeRegistry::default();
        let desc = ClassDescription::sealed("com.example.User", vec!["name".into(), "age".into()]);
        registry.register(desc.clone());

        let resolved = registry.resolve("com.example.User").unwrap().unwrap();
        assert!(Arc::ptr_eq(&resolved, &desc));
        assert_eq!(resolved.members, vec!["name", "age"]);
    }

    #[test]
    fn test_dynamic_fallback() {
        let registry = TypeRegistry::new(MissingTypeStrategy::DynamicObject);
        assert!(registry.resolve("nope.Missing").unwrap().is_none());
        // second resolve hits the memo
        assert!(registry.resolve("nope.Missing").unwrap().is_none());
    }

    #[test]
    fn test_exception_fallback() {
        let registry = TypeRegistry::new(MissingTypeStrategy::Exception);
        let err = registry.resolve("nope.Missing").unwrap_err();
        assert!(err.to_string().contains("nope.Missing"));
    }

    #[test]
    fn test_concurrent_resolution() {
        let registry = Arc::new(TypeRegistry::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let name = format!("dyn.Type{}", i % 10);
                    assert!(registry.resolve(&name).unwrap().is_none());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
