//! Validation compiler.
//!
//! Types declare their validated properties once through [`Validatable`].
//! The first [`ValidationCompiler::validate`] call for a type reads the
//! declarations, builds one routine evaluating every rule in order, and
//! caches it by type; later calls only run the routine.
//!
//! Rule order within a property is fixed: `NotNull`, `StringLength`,
//! `IntegerRange`, pattern match, custom. Properties are checked in
//! declaration order and the first applicable failure wins.

mod annotation;
mod compiler;
mod custom;
mod errors;
mod property;
mod result;
mod rules;
mod schema;
mod validator;

pub use annotation::{Annotation, CustomSource, ValidationKind};
pub use compiler::ValidationCompiler;
pub use custom::{CustomRef, CustomValidator, ValidatorRegistry};
pub use errors::ValidationConfigError;
pub use property::{Property, PropertyShape, PropertyView};
pub use result::ValidationResult;
pub use schema::{PropertyBuilder, SchemaBuilder, Validatable};
pub use validator::Validator;
