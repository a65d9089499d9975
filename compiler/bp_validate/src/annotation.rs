//! Declarative validation annotations.

use crate::CustomRef;

/// Rule kinds in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationKind {
    NotNull,
    StringLength,
    IntegerRange,
    RegularExpressionMatch,
    Custom,
}

/// Reference to a custom validator: an instance, or a name resolved through
/// the [`ValidatorRegistry`](crate::ValidatorRegistry) at compile time.
#[derive(Clone, Debug)]
pub enum CustomSource {
    Instance(CustomRef),
    Named(String),
}

/// A constraint attached to one property. Immutable once declared.
#[derive(Clone, Debug)]
pub enum Annotation {
    NotNull,
    /// `maximum == 0` means no upper bound. Lengths count characters.
    StringLength { minimum: usize, maximum: usize },
    /// Inclusive bounds.
    IntegerRange { minimum: i128, maximum: i128 },
    /// An absent or empty pattern always succeeds.
    RegularExpressionMatch { pattern: Option<String> },
    Custom(CustomSource),
}

impl Annotation {
    pub fn kind(&self) -> ValidationKind {
        match self {
            Annotation::NotNull => ValidationKind::NotNull,
            Annotation::StringLength { .. } => ValidationKind::StringLength,
            Annotation::IntegerRange { .. } => ValidationKind::IntegerRange,
            Annotation::RegularExpressionMatch { .. } => ValidationKind::RegularExpressionMatch,
            Annotation::Custom(_) => ValidationKind::Custom,
        }
    }
}
