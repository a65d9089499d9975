//! Outcome of validating one instance.

/// Result of a validation rule or a whole validator.
///
/// Created fresh for every evaluation and never mutated. An inapplicable
/// result means the rule does not apply to the property's type and is
/// skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_applicable: bool,
    pub is_success: bool,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn success() -> Self {
        ValidationResult {
            is_applicable: true,
            is_success: true,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ValidationResult {
            is_applicable: true,
            is_success: false,
            message: Some(message.into()),
        }
    }

    pub fn not_applicable() -> Self {
        ValidationResult {
            is_applicable: false,
            is_success: true,
            message: None,
        }
    }

    /// An applicable rule that did not pass.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.is_applicable && !self.is_success
    }
}
