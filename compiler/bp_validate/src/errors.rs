//! Authoring errors.
//!
//! A [`ValidationConfigError`] means the rules declared for a type cannot be
//! compiled, or the compiled routine misbehaved. Ordinary validation
//! failures are [`ValidationResult`](crate::ValidationResult) values, never
//! errors.

use bp_eval::ExecError;
use bp_ir::{EmitError, Thrown};

#[derive(Clone, Debug, thiserror::Error)]
pub enum ValidationConfigError {
    #[error("{type_name}.{property}: integer range minimum {minimum} exceeds maximum {maximum}")]
    InvertedIntegerRange {
        type_name: &'static str,
        property: &'static str,
        minimum: i128,
        maximum: i128,
    },

    #[error(
        "{type_name}.{property}: custom validator `{validator}` accepts {accepts}, \
         but the property is {property_type}"
    )]
    IncompatibleCustomValidator {
        type_name: &'static str,
        property: &'static str,
        validator: String,
        accepts: &'static str,
        property_type: &'static str,
    },

    #[error("{type_name}.{property}: no custom validator registered as `{name}`")]
    UnknownCustomValidator {
        type_name: &'static str,
        property: &'static str,
        name: String,
    },

    #[error("{type_name}.{property}: invalid pattern '{pattern}'")]
    InvalidPattern {
        type_name: &'static str,
        property: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("validator generation failed: {0}")]
    Generator(#[from] EmitError),

    #[error("validator faulted: {0}")]
    Execution(#[from] ExecError),

    #[error("validator raised an exception: {0}")]
    Raised(Thrown),
}
