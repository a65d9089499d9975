//! Routine factory and interpreter for the boilerplate engine.
//!
//! [`RoutineFactory::create`] runs a body-writing callback against a fresh
//! [`RoutineBuilder`](bp_ir::RoutineBuilder), verifies the result and wraps
//! it in an immutable [`Routine`]. [`Routine::invoke`] executes it against a
//! [`Frame`] of borrowed arguments.
//!
//! Method-table entries are [`HostMethod`] closures captured when the
//! routine is generated, so no per-call lookup or reflection happens at run
//! time.

mod errors;
mod factory;
mod frame;
mod host;
mod routine;

pub use errors::{ExecError, PersistError, Raise};
#[cfg(feature = "persist")]
pub use factory::read_unit;
pub use factory::{unit_file_stem, write_unit, FactoryMode, RoutineFactory};
pub use frame::{Action, Arg, Frame};
pub use host::HostMethod;
pub use routine::Routine;

/// Builder type routines are written with.
pub type Builder = bp_ir::RoutineBuilder<HostMethod>;
