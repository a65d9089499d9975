//! Generation-time errors.
//!
//! Every variant indicates a bug in the component that wrote the routine,
//! never bad user input. They surface when a routine is finished or
//! verified and are not retried.

use crate::MethodKind;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("label L{0} is not defined in this routine")]
    UnknownLabel(u32),

    #[error("label L{0} is marked more than once")]
    LabelMarkedTwice(u32),

    #[error("label L{0} is referenced but never marked")]
    UnmarkedLabel(u32),

    #[error("local V{0} is not declared")]
    UnknownLocal(u32),

    #[error("method #{0} is not declared")]
    UnknownMethod(u32),

    #[error("argument {index} is out of range for {count} parameter(s)")]
    UnknownArgument { index: u16, count: usize },

    #[error("`{op}` cannot invoke {kind:?} method `{method}`")]
    MethodKindMismatch {
        op: &'static str,
        method: String,
        kind: MethodKind,
    },

    #[error("stack underflow at IL_{pc:04x}: needs {needed}, has {depth}")]
    StackUnderflow { pc: u32, needed: u32, depth: u32 },

    #[error("inconsistent stack depth at IL_{pc:04x}: reached with {expected} and {found}")]
    InconsistentDepth { pc: u32, expected: u32, found: u32 },

    #[error("return at IL_{pc:04x} with {depth} value(s) on the stack, expected {expected}")]
    UnbalancedReturn { pc: u32, depth: u32, expected: u32 },

    #[error("protected region at IL_{pc:04x} entered with {depth} value(s) on the stack")]
    NonEmptyStackAtTry { pc: u32, depth: u32 },

    #[error("rethrow outside a catch handler at IL_{pc:04x}")]
    RethrowOutsideHandler { pc: u32 },

    #[error("control falls off the end of the routine")]
    FallsOffEnd,

    #[error("catch block opened outside a protected region")]
    CatchOutsideTry,

    #[error("protected region closed without being opened")]
    EndWithoutTry,

    #[error("{0} protected region(s) left open")]
    UnclosedRegion(usize),
}
