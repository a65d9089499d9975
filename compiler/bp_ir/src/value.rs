//! Values manipulated by emitted routines.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::Thrown;

/// Constant operand of [`Op::LoadConst`](crate::Op::LoadConst).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum Const {
    Unit,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(Arc<str>),
}

/// Coarse classification of a [`Value`], used for locals and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    Any,
    Unit,
    Null,
    Bool,
    Int,
    UInt,
    Str,
    Arg,
    Thrown,
    Object,
}

impl ValueKind {
    /// Lower-case name used in listings and error messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::Unit => "unit",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Str => "str",
            ValueKind::Arg => "arg",
            ValueKind::Thrown => "exception",
            ValueKind::Object => "object",
        }
    }
}

/// A value on the operand stack or in a local slot.
///
/// Cloning is cheap: strings, exceptions and objects are reference counted.
#[derive(Clone)]
pub enum Value {
    Unit,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(Arc<str>),
    /// Reference to routine argument `n`; resolved through the call frame
    /// by whichever method receives it.
    Arg(u16),
    /// A caught exception.
    Thrown(Thrown),
    /// Opaque host object (validation results, recovery values, ...).
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap a host value as an opaque object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    /// Borrow the object payload as `T`, if this is an object of that type.
    pub fn downcast_object<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unit => ValueKind::Unit,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Str(_) => ValueKind::Str,
            Value::Arg(_) => ValueKind::Arg,
            Value::Thrown(_) => ValueKind::Thrown,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Integer view widened to `i128`, exact for both `Int` and `UInt`.
    pub fn as_wide_int(&self) -> Option<i128> {
        match *self {
            Value::Int(v) => Some(i128::from(v)),
            Value::UInt(v) => Some(i128::from(v)),
            _ => None,
        }
    }
}

impl From<&Const> for Value {
    fn from(c: &Const) -> Self {
        match c {
            Const::Unit => Value::Unit,
            Const::Null => Value::Null,
            Const::Bool(b) => Value::Bool(*b),
            Const::Int(i) => Value::Int(*i),
            Const::UInt(u) => Value::UInt(*u),
            Const::Str(s) => Value::Str(Arc::clone(s)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "unit"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}u"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Arg(n) => write!(f, "arg{n}"),
            Value::Thrown(t) => write!(f, "exception({})", t.type_name()),
            Value::Object(_) => write!(f, "object"),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Unit => write!(f, "unit"),
            Const::Null => write!(f, "null"),
            Const::Bool(b) => write!(f, "{b}"),
            Const::Int(i) => write!(f, "{i}"),
            Const::UInt(u) => write!(f, "{u}u"),
            Const::Str(s) => write!(f, "{s:?}"),
        }
    }
}
