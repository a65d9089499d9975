//! Run-time errors of emitted routines.
//!
//! A routine can fail in two ways. [`Raise::Throw`] carries a catchable
//! exception and participates in the routine's exception table. A
//! [`Raise::Fault`] is an engine fault (bad arguments, type confusion inside
//! an intrinsic, null receiver) and is never seen by emitted handlers.
//!
//! Constructors are `#[cold]` free functions so the interpreter's hot path
//! stays small.

use std::fmt;
use std::io;

use bp_ir::Thrown;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("routine `{routine}` expects {expected} argument(s), got {got}")]
    ArgumentCount {
        routine: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of `{routine}` must be {expected}")]
    ArgumentKind {
        routine: String,
        index: usize,
        expected: &'static str,
    },

    #[error("argument {0} is not bound in this frame")]
    UnboundArgument(u16),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("null reference in `{0}`")]
    NullReference(&'static str),

    #[error("cannot cast {got} to {target}")]
    InvalidCast {
        target: &'static str,
        got: &'static str,
    },

    #[error("integer overflow in `{0}`")]
    IntegerOverflow(&'static str),

    #[error("operand stack underflow at IL_{0:04x}")]
    StackUnderflow(u32),

    #[error("instruction refers to missing {what} {index}")]
    MissingEntry { what: &'static str, index: u32 },

    #[error("rethrow with no exception being handled at IL_{0:04x}")]
    NothingToRethrow(u32),

    #[error("control fell off the end of the routine")]
    FellOffEnd,
}

/// Why a routine stopped without returning.
#[derive(Clone)]
pub enum Raise {
    /// Catchable exception.
    Throw(Thrown),
    /// Engine fault; bypasses every emitted handler.
    Fault(ExecError),
}

impl Raise {
    /// Raise a catchable exception from any error value.
    pub fn throw<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Raise::Throw(Thrown::new(error))
    }
}

impl From<ExecError> for Raise {
    fn from(error: ExecError) -> Self {
        Raise::Fault(error)
    }
}

impl From<Thrown> for Raise {
    fn from(thrown: Thrown) -> Self {
        Raise::Throw(thrown)
    }
}

impl fmt::Display for Raise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raise::Throw(thrown) => write!(f, "unhandled exception: {thrown}"),
            Raise::Fault(error) => write!(f, "routine fault: {error}"),
        }
    }
}

impl fmt::Debug for Raise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raise::Throw(thrown) => f.debug_tuple("Throw").field(thrown).finish(),
            Raise::Fault(error) => f.debug_tuple("Fault").field(error).finish(),
        }
    }
}

/// Failure writing or reading a persisted routine unit.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("i/o error on persisted unit: {0}")]
    Io(#[from] io::Error),

    #[error("cannot encode routine unit: {0}")]
    Encode(String),

    #[error("cannot decode routine unit: {0}")]
    Decode(String),
}

// Constructors

#[cold]
pub fn wrong_arg_count(routine: &str, expected: usize, got: usize) -> ExecError {
    ExecError::ArgumentCount {
        routine: routine.to_owned(),
        expected,
        got,
    }
}

#[cold]
pub fn wrong_arg_kind(routine: &str, index: usize, expected: &'static str) -> ExecError {
    ExecError::ArgumentKind {
        routine: routine.to_owned(),
        index,
        expected,
    }
}

#[cold]
pub fn type_mismatch(expected: &'static str, got: &'static str) -> ExecError {
    ExecError::TypeMismatch { expected, got }
}

#[cold]
pub fn null_reference(op: &'static str) -> ExecError {
    ExecError::NullReference(op)
}

#[cold]
pub fn invalid_cast(target: &'static str, got: &'static str) -> ExecError {
    ExecError::InvalidCast { target, got }
}

#[cold]
pub fn integer_overflow(op: &'static str) -> ExecError {
    ExecError::IntegerOverflow(op)
}

#[cold]
pub fn missing_entry(what: &'static str, index: u32) -> ExecError {
    ExecError::MissingEntry { what, index }
}
