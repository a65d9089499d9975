//! The engine: both compilers behind one configuration.

use bp_dispatch::{DispatchCompiler, ErrorContext, Outcome, RetryPolicy};
use bp_ir::Thrown;
use bp_validate::{Validatable, ValidationCompiler, ValidationConfigError, ValidationResult};
use tracing::debug;

use crate::{Contract, ContractExit, ContractViolation, EngineConfig};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ValidationConfigError),

    #[error("validation failed: {0}")]
    Invalid(String),
}

/// Owns the validation and dispatch compilers and their caches.
///
/// Build one per process (or per test) and share it; compiled routines
/// live as long as the engine.
#[derive(Debug)]
pub struct Engine {
    validation: ValidationCompiler,
    dispatch: DispatchCompiler,
    default_retry: RetryPolicy,
}

impl Engine {
    /// Build an engine from `config`, installing its `log_filter` (or
    /// `RUST_LOG`) as the global subscriber if none is installed yet.
    pub fn new(config: &EngineConfig) -> Self {
        crate::init_tracing(config.log_filter.as_deref());
        let factory = config.factory();
        debug!(mode = ?factory.mode(), verify = factory.verifies(), "engine created");
        Engine {
            validation: ValidationCompiler::new(factory.clone()),
            dispatch: DispatchCompiler::new(factory),
            default_retry: config.default_retry.policy(),
        }
    }

    #[inline]
    pub fn validation(&self) -> &ValidationCompiler {
        &self.validation
    }

    #[inline]
    pub fn dispatch(&self) -> &DispatchCompiler {
        &self.dispatch
    }

    pub fn validate<T: Validatable>(
        &self,
        instance: &T,
    ) -> Result<ValidationResult, ValidationConfigError> {
        self.validation.validate(instance)
    }

    /// Validate `instance`, turning a failed result into an error.
    pub fn ensure_valid<T: Validatable>(&self, instance: &T) -> Result<(), EngineError> {
        let result = self.validate(instance)?;
        if result.is_failure() {
            return Err(EngineError::Invalid(result.message.unwrap_or_default()));
        }
        Ok(())
    }

    /// An empty error context carrying the configured default retry policy.
    pub fn error_context(&self) -> ErrorContext {
        ErrorContext::new().with_default_policy(self.default_retry)
    }

    /// Run `action` under `ctx`, guarded by `contract`.
    ///
    /// A failed precondition raises a [`ContractViolation`] without running
    /// the action. Postconditions are checked after the dispatcher returns
    /// or throws, except when the exception is itself a contract violation.
    /// A failed postcondition replaces the action's result.
    pub fn execute<O, F>(
        &self,
        contract: &Contract,
        ctx: &ErrorContext,
        action: F,
    ) -> Result<Outcome<O>, Thrown>
    where
        O: std::any::Any + Send + Sync,
        F: FnMut() -> Result<O, Thrown>,
    {
        contract.check_preconditions()?;
        let routine = self.dispatch.routine(ctx)?;
        match routine.run(ctx, action) {
            Ok(outcome) => {
                contract.check_postconditions(&ContractExit::Returned)?;
                Ok(outcome)
            }
            Err(thrown) if thrown.is::<ContractViolation>() => Err(thrown),
            Err(thrown) => {
                contract.check_postconditions(&ContractExit::ThrewException(&thrown))?;
                Err(thrown)
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
