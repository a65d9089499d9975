//! Custom validators and the name registry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bp_ir::{short_type_name, ObjectType};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A single-argument predicate over a property value.
///
/// `Target` must be exactly the property's type; a mismatch is an
/// authoring error reported when the validator is compiled.
pub trait CustomValidator: Send + Sync + 'static {
    type Target: Any;

    fn is_valid(&self, value: &Self::Target) -> bool;

    /// Name used in failure messages.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

trait ErasedValidator: Send + Sync {
    fn target(&self) -> ObjectType;
    fn name(&self) -> &str;
    /// `None` when `value` is not a `Target`.
    fn check(&self, value: &dyn Any) -> Option<bool>;
}

struct Erased<V>(V);

impl<V: CustomValidator> ErasedValidator for Erased<V> {
    fn target(&self) -> ObjectType {
        ObjectType::of::<V::Target>()
    }

    fn name(&self) -> &str {
        self.0.name()
    }

    fn check(&self, value: &dyn Any) -> Option<bool> {
        value
            .downcast_ref::<V::Target>()
            .map(|target| self.0.is_valid(target))
    }
}

/// Shared handle to a type-erased custom validator.
#[derive(Clone)]
pub struct CustomRef(Arc<dyn ErasedValidator>);

impl CustomRef {
    pub fn new<V: CustomValidator>(validator: V) -> Self {
        CustomRef(Arc::new(Erased(validator)))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Type the validator accepts.
    pub fn target(&self) -> ObjectType {
        self.0.target()
    }

    pub(crate) fn check(&self, value: &dyn Any) -> Option<bool> {
        self.0.check(value)
    }
}

impl fmt::Debug for CustomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomRef({} over {})", self.name(), self.target().name())
    }
}

/// Named custom validators, resolved when a validator is compiled.
///
/// Registration is first-wins: registering a name twice keeps the original.
#[derive(Default)]
pub struct ValidatorRegistry {
    entries: RwLock<FxHashMap<String, CustomRef>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `validator` under `name`. Returns `false` if the name was
    /// already taken.
    pub fn register<V: CustomValidator>(&self, name: impl Into<String>, validator: V) -> bool {
        let name = name.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            tracing::warn!(%name, "custom validator already registered, keeping the first");
            return false;
        }
        entries.insert(name, CustomRef::new(validator));
        true
    }

    pub fn resolve(&self, name: &str) -> Option<CustomRef> {
        self.entries.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let mut names: Vec<&str> = entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ValidatorRegistry")
            .field("names", &names)
            .finish()
    }
}
