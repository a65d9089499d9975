//! The validation compiler.
//!
//! Turns the declared rules of a type into one routine, compiled on first
//! use and cached by `TypeId`. The routine evaluates rules in order and
//! returns the first applicable failure, or success when none fails:
//!
//! ```text
//!     ldarg     0
//!     callvirt  #2 text.StringLength      ; rule result
//!     stloc     V0
//!     ldloc     V0
//!     getprop   #0 IsFailure
//!     brfalse   L0
//!     ldloc     V0
//!     castclass ValidationResult
//!     ret
//! L0:
//!     ...                                 ; next rule
//!     newobj    #1 ValidationResult.Success
//!     ret
//! ```

use std::any::TypeId;
use std::sync::Arc;

use bp_cache::{CacheStats, CompilationCache};
use bp_eval::{Builder, HostMethod, Routine, RoutineFactory};
use bp_ir::{short_type_name, MethodSig, ObjectType, ParamKind, Signature, Value, ValueKind};

use crate::rules::{build_rules, Rule};
use crate::schema::SchemaBuilder;
use crate::{Validatable, ValidationConfigError, ValidationResult, Validator, ValidatorRegistry};

pub struct ValidationCompiler {
    factory: RoutineFactory,
    cache: CompilationCache<TypeId, Routine>,
    registry: Arc<ValidatorRegistry>,
}

impl ValidationCompiler {
    pub fn new(factory: RoutineFactory) -> Self {
        ValidationCompiler {
            factory,
            cache: CompilationCache::new(),
            registry: Arc::new(ValidatorRegistry::new()),
        }
    }

    /// Resolve named custom validators through `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ValidatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[inline]
    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// The compiled validator for `T`, compiling it on first request.
    pub fn validator<T: Validatable>(&self) -> Result<Validator<T>, ValidationConfigError> {
        let routine = self
            .cache
            .try_get_or_add(TypeId::of::<T>(), |_| self.compile::<T>())?;
        Ok(Validator::new(routine))
    }

    /// Validate `instance` against the rules declared for `T`.
    pub fn validate<T: Validatable>(
        &self,
        instance: &T,
    ) -> Result<ValidationResult, ValidationConfigError> {
        self.validator::<T>()?.validate(instance)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of types with a compiled validator.
    pub fn compiled_types(&self) -> usize {
        self.cache.len()
    }

    pub fn is_compiled<T: Validatable>(&self) -> bool {
        self.cache.contains(&TypeId::of::<T>())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(target = short_type_name(std::any::type_name::<T>())))]
    fn compile<T: Validatable>(&self) -> Result<Routine, ValidationConfigError> {
        let type_name = short_type_name(std::any::type_name::<T>());
        let mut schema = SchemaBuilder::<T>::new();
        T::declare(&mut schema);
        let rules = build_rules(type_name, &schema.properties, &self.registry)?;
        tracing::debug!(
            properties = schema.len(),
            rules = rules.len(),
            "compiling validator"
        );

        let signature = Signature::function([ParamKind::Ref(ObjectType::of::<T>())]);
        let routine = self
            .factory
            .create(&format!("validate.{type_name}"), signature, |b| {
                emit_validator(b, rules);
            })?;
        Ok(routine)
    }
}

impl Default for ValidationCompiler {
    fn default() -> Self {
        Self::new(RoutineFactory::default())
    }
}

impl std::fmt::Debug for ValidationCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCompiler")
            .field("factory", &self.factory)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn emit_validator<T: Validatable>(b: &mut Builder, rules: Vec<Rule<T>>) {
    let is_failure = b.declare_method(
        MethodSig::getter("IsFailure"),
        HostMethod::new(|frame, args| {
            let result = frame.resolve::<ValidationResult>(&args[0])?;
            Ok(Value::Bool(result.is_failure()))
        }),
    );
    let success = b.declare_method(
        MethodSig::constructor("ValidationResult.Success", 0),
        HostMethod::new(|_, _| Ok(Value::object(ValidationResult::success()))),
    );
    let result = b.declare_local(ValueKind::Object);

    for rule in rules {
        tracing::trace!(rule = %rule.label, kind = ?rule.kind, "emitting rule");
        let eval = rule.eval;
        let check = b.declare_method(
            MethodSig::instance(rule.label, 0, true),
            HostMethod::new(move |frame, args| {
                let target = frame.resolve::<T>(&args[0])?;
                Ok(Value::object(eval(target)))
            }),
        );
        b.load_arg(0);
        b.call_instance(check);
        b.store_local(result);
        b.load_local(result);
        b.get_property(is_failure);
        let next = b.if_true();
        b.load_local(result);
        b.cast(ObjectType::of::<ValidationResult>());
        b.ret();
        b.mark_label(next);
    }

    b.new_object(success);
    b.ret();
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
