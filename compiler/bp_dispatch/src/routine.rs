//! Running compiled dispatch routines.

use std::any::Any;
use std::sync::Arc;

use bp_eval::{ExecError, Frame, Raise, Routine};
use bp_ir::{short_type_name, Listing, Thrown, Value};

use crate::{DispatchKey, ErrorContext};

/// How a dispatched action finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<O> {
    /// An attempt returned normally.
    Completed(O),
    /// A handler ran; carries the recovery value of a recovering handler.
    Handled(Option<O>),
}

impl<O> Outcome<O> {
    #[inline]
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }

    /// The action's output or the recovery value.
    pub fn into_value(self) -> Option<O> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Handled(value) => value,
        }
    }
}

/// A compiled dispatcher for one ordered set of exception types.
///
/// Shared by every context with the same [`DispatchKey`]; run it against
/// the context whose handlers and policies should apply.
#[derive(Clone, Debug)]
pub struct DispatchRoutine {
    key: DispatchKey,
    routine: Routine,
}

impl DispatchRoutine {
    pub(crate) fn new(key: DispatchKey, routine: Routine) -> Self {
        DispatchRoutine { key, routine }
    }

    #[inline]
    pub fn key(&self) -> &DispatchKey {
        &self.key
    }

    pub fn listing(&self) -> Listing {
        self.routine.listing()
    }

    #[inline]
    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    /// Run `action` under `ctx`.
    ///
    /// Exceptions no handler matches are returned unchanged. A recovery
    /// value whose type is not `O` is reported as an engine fault.
    pub fn run<O, F>(&self, ctx: &ErrorContext, mut action: F) -> Result<Outcome<O>, Thrown>
    where
        O: Any + Send + Sync,
        F: FnMut() -> Result<O, Thrown>,
    {
        if ctx.key() != self.key {
            return Err(Thrown::new(ExecError::ArgumentKind {
                routine: self.routine.name().to_owned(),
                index: 1,
                expected: "an error context with the compiled handler types",
            }));
        }

        let mut output: Option<O> = None;
        let mut attempt = || -> Result<(), Thrown> {
            output = Some(action()?);
            Ok(())
        };
        let mut frame = Frame::new().with_action(&mut attempt).with_ref(ctx);
        let returned = match self.routine.invoke(&mut frame) {
            Ok(value) => value,
            Err(Raise::Throw(thrown)) => return Err(thrown),
            Err(Raise::Fault(fault)) => return Err(Thrown::new(fault)),
        };
        drop(frame);

        match returned {
            Value::Unit => output.map(Outcome::Completed).ok_or_else(|| {
                Thrown::new(ExecError::TypeMismatch {
                    expected: "action output",
                    got: "nothing",
                })
            }),
            other => recovery::<O>(other).map(Outcome::Handled),
        }
    }
}

fn recovery<O: Any + Send + Sync>(value: Value) -> Result<Option<O>, Thrown> {
    let expected = short_type_name(std::any::type_name::<O>());
    match value {
        Value::Null => Ok(None),
        Value::Object(object) => {
            let typed = object.downcast::<O>().map_err(|_| {
                Thrown::new(ExecError::TypeMismatch {
                    expected,
                    got: "recovery value of another type",
                })
            })?;
            Arc::try_unwrap(typed).map(Some).map_err(|_| {
                Thrown::new(ExecError::TypeMismatch {
                    expected,
                    got: "shared recovery value",
                })
            })
        }
        other => Err(Thrown::new(ExecError::TypeMismatch {
            expected,
            got: other.kind().name(),
        })),
    }
}
