//! Boilerplate engine.
//!
//! Chains cross-cutting concerns around user actions: declared validation
//! of inputs, ordered exception handling with retry and backoff, and
//! pre/postcondition contracts. Validators and dispatchers are generated
//! once per key and reused; see the `bp_validate` and `bp_dispatch` crates
//! for the compilers themselves.
//!
//! ```ignore
//! let engine = Engine::new(&EngineConfig::load("boilerplate.toml")?);
//! engine.ensure_valid(&order)?;
//! let ctx = engine
//!     .error_context()
//!     .with_handler(ExceptionHandler::action(|e: &Timeout| report(e)));
//! let outcome = engine.execute(&Contract::new(), &ctx, || submit(&order))?;
//! ```

mod config;
mod contract;
mod engine;
mod logging;

pub use config::{ConfigError, EngineConfig, PersistConfig, RetryConfig};
pub use contract::{ConditionKind, Contract, ContractExit, ContractViolation};
pub use engine::{Engine, EngineError};
pub use logging::init_tracing;

pub use bp_dispatch::{
    BackoffStrategy, DispatchCompiler, DispatchError, DispatchRoutine, ErrorContext,
    ExceptionHandler, Outcome, RetryPolicy,
};
pub use bp_eval::{FactoryMode, RoutineFactory};
pub use bp_ir::{ExceptionType, Thrown};
pub use bp_validate::{
    Annotation, CustomValidator, PropertyBuilder, SchemaBuilder, Validatable, ValidationCompiler,
    ValidationConfigError, ValidationKind, ValidationResult, Validator, ValidatorRegistry,
};
