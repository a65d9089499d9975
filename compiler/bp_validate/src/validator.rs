use std::fmt;
use std::marker::PhantomData;

use bp_eval::{Frame, Raise, Routine};

use crate::errors::ValidationConfigError;
use crate::{Validatable, ValidationResult};

/// The compiled validator for `T`. Cheap to clone; shares the cached
/// routine with every other validator for the same type.
pub struct Validator<T> {
    routine: Routine,
    _target: PhantomData<fn(&T)>,
}

impl<T: Validatable> Validator<T> {
    pub(crate) fn new(routine: Routine) -> Self {
        Validator {
            routine,
            _target: PhantomData,
        }
    }

    pub fn validate(&self, instance: &T) -> Result<ValidationResult, ValidationConfigError> {
        let mut frame = Frame::new().with_ref(instance);
        let value = self.routine.invoke(&mut frame).map_err(|raise| match raise {
            Raise::Fault(error) => ValidationConfigError::Execution(error),
            Raise::Throw(thrown) => ValidationConfigError::Raised(thrown),
        })?;
        value
            .downcast_object::<ValidationResult>()
            .cloned()
            .ok_or_else(|| {
                ValidationConfigError::Execution(bp_eval::ExecError::TypeMismatch {
                    expected: "ValidationResult",
                    got: value.kind().name(),
                })
            })
    }

    #[inline]
    pub fn routine(&self) -> &Routine {
        &self.routine
    }
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Validator {
            routine: self.routine.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.routine.name()).finish()
    }
}
