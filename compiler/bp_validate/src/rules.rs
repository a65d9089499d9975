//! Rule evaluation.
//!
//! Each annotation becomes one [`Rule`]: a closure from the instance to a
//! [`ValidationResult`], with its message text and compiled pattern fixed
//! at compile time. The emitted routine calls rules in order through its
//! method table.

use std::sync::Arc;

use regex::Regex;

use crate::annotation::{Annotation, CustomSource, ValidationKind};
use crate::schema::PropertyDecl;
use crate::{
    CustomRef, PropertyShape, PropertyView, ValidationConfigError, ValidationResult,
    ValidatorRegistry,
};

pub(crate) type RuleFn<T> = Arc<dyn Fn(&T) -> ValidationResult + Send + Sync>;

pub(crate) struct Rule<T> {
    /// Method-table name, `property.Kind`.
    pub label: String,
    pub kind: ValidationKind,
    pub eval: RuleFn<T>,
}

/// Build the rules for every declared property, properties in declaration
/// order and rules within a property in kind order.
pub(crate) fn build_rules<T: 'static>(
    type_name: &'static str,
    properties: &[PropertyDecl<T>],
    registry: &ValidatorRegistry,
) -> Result<Vec<Rule<T>>, ValidationConfigError> {
    let mut rules = Vec::new();
    for decl in properties {
        let mut annotations: Vec<&Annotation> = decl.annotations.iter().collect();
        annotations.sort_by_key(|a| a.kind());
        for annotation in annotations {
            let eval = build_rule(type_name, decl, annotation, registry)?;
            rules.push(Rule {
                label: format!("{}.{:?}", decl.name, annotation.kind()),
                kind: annotation.kind(),
                eval,
            });
        }
    }
    Ok(rules)
}

fn build_rule<T: 'static>(
    type_name: &'static str,
    decl: &PropertyDecl<T>,
    annotation: &Annotation,
    registry: &ValidatorRegistry,
) -> Result<RuleFn<T>, ValidationConfigError> {
    let subject = format!("{type_name}.{}", decl.name);
    let access = Arc::clone(&decl.access);

    match annotation {
        Annotation::NotNull => {
            if !decl.nullable {
                return Ok(not_applicable());
            }
            let message = format!("{subject} cannot be null");
            Ok(Arc::new(move |target: &T| {
                if access.view(target).is_null() {
                    ValidationResult::failure(message.as_str())
                } else {
                    ValidationResult::success()
                }
            }))
        }

        &Annotation::StringLength { minimum, maximum } => {
            if decl.shape != PropertyShape::Text {
                return Ok(not_applicable());
            }
            let null = format!("{subject} cannot be null");
            let short = format!("{subject} is too short (minimum length {minimum})");
            let long = format!("{subject} is too long (maximum length {maximum})");
            Ok(Arc::new(move |target: &T| match access.view(target) {
                PropertyView::Str(s) => {
                    let length = s.chars().count();
                    if length < minimum {
                        ValidationResult::failure(short.as_str())
                    } else if maximum != 0 && length > maximum {
                        ValidationResult::failure(long.as_str())
                    } else {
                        ValidationResult::success()
                    }
                }
                PropertyView::Null => ValidationResult::failure(null.as_str()),
                _ => ValidationResult::not_applicable(),
            }))
        }

        &Annotation::IntegerRange { minimum, maximum } => {
            // Inverted bounds are misdeclared whatever the property type.
            if minimum > maximum {
                return Err(ValidationConfigError::InvertedIntegerRange {
                    type_name,
                    property: decl.name,
                    minimum,
                    maximum,
                });
            }
            if decl.shape != PropertyShape::Integer {
                return Ok(not_applicable());
            }
            let below = format!("{subject} is below minimum {minimum}");
            let above = format!("{subject} is above maximum {maximum}");
            Ok(Arc::new(move |target: &T| match access.view(target) {
                PropertyView::Integer(value) if value < minimum => {
                    ValidationResult::failure(below.as_str())
                }
                PropertyView::Integer(value) if value > maximum => {
                    ValidationResult::failure(above.as_str())
                }
                PropertyView::Integer(_) => ValidationResult::success(),
                // Nothing to compare against.
                _ => ValidationResult::not_applicable(),
            }))
        }

        Annotation::RegularExpressionMatch { pattern } => {
            let Some(pattern) = pattern.as_deref().filter(|p| !p.is_empty()) else {
                return Ok(Arc::new(|_: &T| ValidationResult::success()));
            };
            let regex =
                Regex::new(pattern).map_err(|source| ValidationConfigError::InvalidPattern {
                    type_name,
                    property: decl.name,
                    pattern: pattern.to_owned(),
                    source,
                })?;
            let message = format!("{subject} does not match pattern '{pattern}'");
            Ok(Arc::new(move |target: &T| match access.view(target).render() {
                Some(text) if regex.is_match(&text) => ValidationResult::success(),
                Some(_) => ValidationResult::failure(message.as_str()),
                None => ValidationResult::success(),
            }))
        }

        Annotation::Custom(source) => {
            let validator = resolve_custom(type_name, decl, source, registry)?;
            let message = format!("{subject} failed custom validator {}", validator.name());
            Ok(Arc::new(move |target: &T| {
                match validator.check(access.value(target)) {
                    Some(true) => ValidationResult::success(),
                    Some(false) => ValidationResult::failure(message.as_str()),
                    // Ruled out when the rule was built.
                    None => ValidationResult::not_applicable(),
                }
            }))
        }
    }
}

fn resolve_custom<T>(
    type_name: &'static str,
    decl: &PropertyDecl<T>,
    source: &CustomSource,
    registry: &ValidatorRegistry,
) -> Result<CustomRef, ValidationConfigError> {
    let validator = match source {
        CustomSource::Instance(validator) => validator.clone(),
        CustomSource::Named(name) => registry.resolve(name).ok_or_else(|| {
            ValidationConfigError::UnknownCustomValidator {
                type_name,
                property: decl.name,
                name: name.clone(),
            }
        })?,
    };
    let accepts = validator.target();
    if accepts.id() != decl.type_id {
        return Err(ValidationConfigError::IncompatibleCustomValidator {
            type_name,
            property: decl.name,
            validator: validator.name().to_owned(),
            accepts: accepts.name(),
            property_type: decl.type_name,
        });
    }
    Ok(validator)
}

fn not_applicable<T: 'static>() -> RuleFn<T> {
    Arc::new(|_: &T| ValidationResult::not_applicable())
}
