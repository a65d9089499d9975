//! Exceptions and type tokens.
//!
//! A routine raises and catches [`Thrown`] values. Catch clauses name an
//! [`ExceptionType`]: a type token carrying a stable identity (used in cache
//! keys) and a matcher deciding whether a thrown value belongs to the type.

use std::any::{Any, TypeId};
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Strip the module path from a type name produced by `std::any::type_name`.
///
/// Generic types keep their full argument list: `Option<alloc::string::String>`
/// becomes `Option<alloc::string::String>`, `my::Account` becomes `Account`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let head_end = full.find('<').unwrap_or(full.len());
    match full[..head_end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// A raised exception.
///
/// Wraps any `Error + Send + Sync` value behind an `Arc` so it can be stored
/// on the operand stack, handed to handlers by reference and propagated to
/// the caller without losing the original error. Deliberately does not
/// implement `Error` itself so that `?` converts any error into it.
#[derive(Clone)]
pub struct Thrown {
    inner: Arc<dyn Error + Send + Sync + 'static>,
    type_name: &'static str,
}

impl Thrown {
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Thrown {
            inner: Arc::new(error),
            type_name: short_type_name(std::any::type_name::<E>()),
        }
    }

    /// Wrap an already boxed error. The concrete type name is not known.
    pub fn from_boxed(error: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Thrown {
            inner: Arc::from(error),
            type_name: "dyn Error",
        }
    }

    /// Short name of the concrete error type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the wrapped error is of concrete type `E`.
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// The wrapped error as a trait object.
    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.inner
    }
}

impl<E: Error + Send + Sync + 'static> From<E> for Thrown {
    fn from(error: E) -> Self {
        Thrown::new(error)
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.type_name, self.inner)
    }
}

/// Marker identity of the catch-all exception type.
struct AnyException;

fn matches_type<E: Error + 'static>(thrown: &Thrown) -> bool {
    thrown.is::<E>()
}

fn matches_any(_: &Thrown) -> bool {
    true
}

/// Type token for a catch clause.
///
/// Equality and hashing use only the identity, so two tokens built for the
/// same error type compare equal regardless of how they were constructed.
#[derive(Clone, Copy)]
pub struct ExceptionType {
    id: TypeId,
    name: &'static str,
    matcher: fn(&Thrown) -> bool,
}

impl ExceptionType {
    /// Token matching errors whose concrete type is exactly `E`.
    pub fn of<E: Error + Send + Sync + 'static>() -> Self {
        ExceptionType {
            id: TypeId::of::<E>(),
            name: short_type_name(std::any::type_name::<E>()),
            matcher: matches_type::<E>,
        }
    }

    /// The catch-all base type: matches every thrown value.
    pub fn any() -> Self {
        ExceptionType {
            id: TypeId::of::<AnyException>(),
            name: "Exception",
            matcher: matches_any,
        }
    }

    /// A family of exceptions identified by marker type `K` and decided by
    /// an arbitrary matcher (for example "every I/O error").
    pub fn family<K: Any>(name: &'static str, matcher: fn(&Thrown) -> bool) -> Self {
        ExceptionType {
            id: TypeId::of::<K>(),
            name,
            matcher,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn matches(&self, thrown: &Thrown) -> bool {
        (self.matcher)(thrown)
    }
}

impl PartialEq for ExceptionType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExceptionType {}

impl Hash for ExceptionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExceptionType({})", self.name)
    }
}

/// Type token for casts and typed parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectType {
    id: TypeId,
    name: &'static str,
}

impl ObjectType {
    pub fn of<T: Any>() -> Self {
        ObjectType {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `value` is an instance of this type.
    pub fn is_instance(&self, value: &dyn Any) -> bool {
        value.type_id() == self.id
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectType({})", self.name)
    }
}

#[cfg(test)]
mod tests;
