//! Call frames: the arguments a routine runs against.

use std::any::Any;
use std::fmt;

use bp_ir::{short_type_name, ObjectType, ParamKind, Signature, Thrown, Value};
use smallvec::SmallVec;

use crate::errors::{null_reference, type_mismatch, wrong_arg_count, wrong_arg_kind, ExecError};
use crate::Raise;

/// A user action the routine can invoke. Its output, if any, is kept by the
/// caller; the routine only observes success or the raised exception.
pub type Action<'a> = dyn FnMut() -> Result<(), Thrown> + 'a;

/// One bound argument.
pub enum Arg<'a> {
    /// Shared reference to a host value.
    Ref(&'a dyn Any),
    Action(&'a mut Action<'a>),
}

impl Arg<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Arg::Ref(_) => "reference",
            Arg::Action(_) => "action",
        }
    }
}

/// Arguments of a single routine invocation.
///
/// Routines push [`Value::Arg`] placeholders; host methods resolve them
/// against the frame with [`resolve`](Frame::resolve) or run them with
/// [`invoke_action`](Frame::invoke_action).
#[derive(Default)]
pub struct Frame<'a> {
    args: SmallVec<[Arg<'a>; 2]>,
}

impl<'a> Frame<'a> {
    pub fn new() -> Self {
        Frame {
            args: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_ref<T: Any>(mut self, value: &'a T) -> Self {
        self.args.push(Arg::Ref(value));
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: &'a mut Action<'a>) -> Self {
        self.args.push(Arg::Action(action));
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Borrow reference argument `index` as `T`.
    pub fn arg_ref<T: Any>(&self, index: u16) -> Result<&T, ExecError> {
        match self.args.get(usize::from(index)) {
            Some(Arg::Ref(value)) => value
                .downcast_ref::<T>()
                .ok_or_else(|| type_mismatch(type_label::<T>(), "reference")),
            Some(other) => Err(type_mismatch("reference", other.describe())),
            None => Err(ExecError::UnboundArgument(index)),
        }
    }

    /// Borrow the host value `value` denotes: an argument placeholder or an
    /// object on the stack.
    pub fn resolve<'v, T: Any>(&'v self, value: &'v Value) -> Result<&'v T, ExecError> {
        match value {
            Value::Arg(index) => self.arg_ref::<T>(*index),
            Value::Object(_) => value
                .downcast_object::<T>()
                .ok_or_else(|| type_mismatch(type_label::<T>(), "object")),
            Value::Null => Err(null_reference("resolve")),
            other => Err(type_mismatch(type_label::<T>(), other.kind().name())),
        }
    }

    /// Run action argument `index`, turning its failure into a catchable
    /// exception.
    pub fn invoke_action(&mut self, index: u16) -> Result<(), Raise> {
        match self.args.get_mut(usize::from(index)) {
            Some(Arg::Action(action)) => action().map_err(Raise::Throw),
            Some(other) => Err(type_mismatch("action", other.describe()).into()),
            None => Err(ExecError::UnboundArgument(index).into()),
        }
    }

    /// Whether argument `index` is a reference to a `ty` instance.
    pub(crate) fn holds(&self, index: u16, ty: &ObjectType) -> bool {
        matches!(self.args.get(usize::from(index)), Some(Arg::Ref(value)) if ty.is_instance(*value))
    }

    /// Check the bound arguments against a routine signature.
    pub(crate) fn check(&self, routine: &str, signature: &Signature) -> Result<(), ExecError> {
        if self.args.len() != signature.params.len() {
            return Err(wrong_arg_count(routine, signature.params.len(), self.args.len()));
        }
        for (index, (arg, param)) in self.args.iter().zip(&signature.params).enumerate() {
            let ok = match (arg, param) {
                (Arg::Ref(value), ParamKind::Ref(ty)) => ty.is_instance(*value),
                (Arg::Action(_), ParamKind::Action) => true,
                _ => false,
            };
            if !ok {
                return Err(wrong_arg_kind(routine, index, param.describe()));
            }
        }
        Ok(())
    }
}

fn type_label<T: Any>() -> &'static str {
    short_type_name(std::any::type_name::<T>())
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.args.iter().map(Arg::describe))
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
