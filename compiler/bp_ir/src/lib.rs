//! Routine IR for the boilerplate engine.
//!
//! This crate provides the vocabulary compilers use to lay down executable
//! routines without touching raw opcodes:
//!
//! - **Values** ([`Value`], [`Const`]): what lives on the operand stack and
//!   in locals while a routine runs.
//! - **Exceptions** ([`Thrown`], [`ExceptionType`]): the catchable error
//!   object and the type tokens catch clauses match against.
//! - **Instructions** ([`Op`], [`Label`], [`Local`], [`MethodId`]): a small
//!   stack-machine instruction set with structured try/catch regions.
//! - **Emitter** ([`RoutineBuilder`]): appends instructions, tracks labels,
//!   locals, the method table and nested protected regions, and offers
//!   higher-level helpers (`try_catch`, `if_less_than`, ...).
//! - **Verifier** ([`verify`]): abstract interpretation over the finished
//!   instruction stream checking stack discipline.
//!
//! # Design
//!
//! Follows the "position, emit, terminate" shape of a basic-block IR builder,
//! but the target is a linear stack machine modelled on CIL: branches refer
//! to labels, protected regions are recorded in an exception table, and a
//! `leave` empties the operand stack while exiting a region. The emitter is
//! generic over the method payload `M` so that the executing crate decides
//! what a callable method actually is; this crate only needs signatures.

mod builder;
mod error;
#[cfg(feature = "persist")]
mod image;
mod listing;
mod method;
mod op;
mod thrown;
mod value;
mod verify;

pub use builder::{CatchWriter, RoutineBody, RoutineBuilder};
pub use error::EmitError;
#[cfg(feature = "persist")]
pub use image::{ImageInstr, ImageRegion, UnitImage};
pub use listing::Listing;
pub use method::{Method, MethodKind, MethodSig, ParamKind, ReturnKind, Signature};
pub use op::{CatchHandler, Label, Local, MethodId, Op, TryRegion};
pub use thrown::{short_type_name, ExceptionType, ObjectType, Thrown};
pub use value::{Const, Value, ValueKind};
pub use verify::{verify, Effect, Flow, RegionSpan, RoutineShape, StackReport};
