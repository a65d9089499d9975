//! Exception dispatch compiler.
//!
//! An [`ErrorContext`] holds exception handlers in registration order. The
//! [`DispatchCompiler`] turns the ordered handler types into one routine
//! that runs a user action inside a protected region with one catch clause
//! per handler, retrying with backoff while a handler's retry budget lasts.
//! Routines are cached by the ordered type sequence, so every context
//! registering the same types in the same order shares one routine; retry
//! settings and handler bodies are read from the context at run time.

mod compiler;
mod context;
mod errors;
mod handler;
mod policy;
mod routine;

pub use compiler::DispatchCompiler;
pub use context::{DispatchKey, ErrorContext};
pub use errors::DispatchError;
pub use handler::ExceptionHandler;
pub use policy::{spin_wait, BackoffStrategy, RetryPolicy};
pub use routine::{DispatchRoutine, Outcome};
