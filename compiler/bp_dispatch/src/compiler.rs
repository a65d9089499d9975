//! The dispatch compiler.
//!
//! One routine per ordered handler-type sequence. Arguments are the action
//! (0) and the error context (1); handler `i` of the context owns catch
//! clause `i`:
//!
//! ```text
//!     ldc       0
//!     stloc     V0                      ; attempt
//! L0:                                   ; retry
//!     ldloc     V0
//!     ldc       1
//!     add
//!     stloc     V0
//!     ldarg     0                       ; try
//!     callvirt  #0 Action.Invoke
//!     ldc       unit
//!     stloc     V1                      ; result
//!     leave     L1
//!     stloc     V2                      ; catch T0
//!     ldloc     V0
//!     ldarg     1
//!     ldc       0u
//!     callvirt  #1 Handler.AttemptLimit
//!     bge       L2
//!     ldarg     1
//!     ldc       0u
//!     ldloc     V0
//!     callvirt  #2 Handler.Backoff
//!     leave     L0
//! L2:
//!     ldarg     1
//!     ldc       0u
//!     ldloc     V2
//!     callvirt  #3 Handler.Handle      ; logs, runs handler 0
//!     stloc     V1
//!     leave     L1
//!     ...                               ; catch T1, T2, ...
//! L1:
//!     ldloc     V1
//!     ret
//! ```

use bp_cache::{CacheStats, CompilationCache};
use bp_eval::{Builder, ExecError, Frame, HostMethod, RoutineFactory};
use bp_ir::{
    CatchWriter, Const, ExceptionType, MethodSig, ObjectType, ParamKind, Signature, Value,
    ValueKind,
};
use tracing::{debug, warn};

use crate::{DispatchError, DispatchKey, DispatchRoutine, ErrorContext, ExceptionHandler};

pub struct DispatchCompiler {
    factory: RoutineFactory,
    cache: CompilationCache<DispatchKey, DispatchRoutine>,
}

impl DispatchCompiler {
    pub fn new(factory: RoutineFactory) -> Self {
        DispatchCompiler {
            factory,
            cache: CompilationCache::new(),
        }
    }

    /// The dispatch routine for `ctx`'s handler types, compiled on first
    /// request for that ordered sequence.
    pub fn routine(&self, ctx: &ErrorContext) -> Result<DispatchRoutine, DispatchError> {
        self.cache
            .try_get_or_add(ctx.key(), |key| self.compile(key, ctx))
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of distinct handler sequences compiled.
    pub fn compiled_routines(&self) -> usize {
        self.cache.len()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(handlers = key.len()))]
    fn compile(
        &self,
        key: &DispatchKey,
        ctx: &ErrorContext,
    ) -> Result<DispatchRoutine, DispatchError> {
        let catches: Vec<ExceptionType> = ctx.handlers().iter().map(ExceptionHandler::catch).collect();
        let name = if catches.is_empty() {
            "dispatch.none".to_owned()
        } else {
            let names: Vec<&str> = catches.iter().map(ExceptionType::name).collect();
            format!("dispatch.{}", names.join("+"))
        };
        debug!(routine = %name, "compiling dispatcher");

        let signature = Signature::function([
            ParamKind::Action,
            ParamKind::Ref(ObjectType::of::<ErrorContext>()),
        ]);
        let routine = self
            .factory
            .create(&name, signature, |b| emit_dispatcher(b, &catches))?;
        Ok(DispatchRoutine::new(key.clone(), routine))
    }
}

impl Default for DispatchCompiler {
    fn default() -> Self {
        Self::new(RoutineFactory::default())
    }
}

impl std::fmt::Debug for DispatchCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCompiler")
            .field("factory", &self.factory)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Method-table entries shared by every catch clause.
#[derive(Clone, Copy)]
struct Methods {
    attempt_limit: bp_ir::MethodId,
    backoff: bp_ir::MethodId,
    handle: bp_ir::MethodId,
}

fn emit_dispatcher(b: &mut Builder, catches: &[ExceptionType]) {
    let invoke = b.declare_method(
        MethodSig::instance("Action.Invoke", 0, false),
        HostMethod::new(|frame, args| {
            let Value::Arg(index) = args[0] else {
                return Err(mismatch("action", &args[0]).into());
            };
            frame.invoke_action(index)?;
            Ok(Value::Unit)
        }),
    );
    let methods = Methods {
        attempt_limit: b.declare_method(
            MethodSig::instance("Handler.AttemptLimit", 1, true),
            HostMethod::new(|frame, args| {
                let (ctx, handler) = handler_at(frame, args)?;
                Ok(Value::UInt(ctx.policy_of(handler).attempt_limit()))
            }),
        ),
        backoff: b.declare_method(
            MethodSig::instance("Handler.Backoff", 2, false),
            HostMethod::new(|frame, args| {
                let (ctx, handler) = handler_at(frame, args)?;
                let attempt = args[2]
                    .as_wide_int()
                    .and_then(|a| u32::try_from(a).ok())
                    .ok_or_else(|| mismatch("attempt", &args[2]))?;
                let delay = ctx.policy_of(handler).delay(attempt);
                debug!(
                    exception = handler.catch().name(),
                    attempt,
                    ?delay,
                    "retrying after failed attempt"
                );
                crate::spin_wait(delay);
                Ok(Value::Unit)
            }),
        ),
        handle: b.declare_method(
            MethodSig::instance("Handler.Handle", 2, true),
            HostMethod::new(|frame, args| {
                let (_, handler) = handler_at(frame, args)?;
                let Value::Thrown(thrown) = &args[2] else {
                    return Err(mismatch("exception", &args[2]).into());
                };
                warn!(
                    exception = %thrown,
                    kind = thrown.type_name(),
                    handler = handler.catch().name(),
                    "handling exception"
                );
                Ok(handler.invoke(thrown))
            }),
        ),
    };

    let attempt = b.declare_local(ValueKind::Int);
    let result = b.declare_local(ValueKind::Any);
    let error = b.declare_local(ValueKind::Thrown);

    b.load_int(0);
    b.store_local(attempt);
    let retry = b.define_label();
    b.mark_label(retry);
    b.load_local(attempt);
    b.load_int(1);
    b.add();
    b.store_local(attempt);

    let clauses: Vec<(ExceptionType, CatchWriter<'_, HostMethod>)> = catches
        .iter()
        .enumerate()
        .map(|(index, &catch)| {
            let index = index as u64;
            let write: CatchWriter<'_, HostMethod> = Box::new(move |b: &mut Builder| {
                b.store_local(error);

                b.load_local(attempt);
                b.load_arg(1);
                b.load_uint(index);
                b.call_instance(methods.attempt_limit);
                let exhausted = b.if_less_than();
                b.load_arg(1);
                b.load_uint(index);
                b.load_local(attempt);
                b.call_instance(methods.backoff);
                b.leave(retry);

                b.mark_label(exhausted);
                b.load_arg(1);
                b.load_uint(index);
                b.load_local(error);
                b.call_instance(methods.handle);
                b.store_local(result);
            });
            (catch, write)
        })
        .collect();

    b.try_catch(
        |b| {
            b.load_arg(0);
            b.call_instance(invoke);
            b.load_const(Const::Unit);
            b.store_local(result);
        },
        clauses,
    );
    b.load_local(result);
    b.ret();
}

/// Resolve the context receiver and the handler index operand.
fn handler_at<'f>(
    frame: &'f Frame<'_>,
    args: &'f [Value],
) -> Result<(&'f ErrorContext, &'f ExceptionHandler), ExecError> {
    let ctx = frame.resolve::<ErrorContext>(&args[0])?;
    let index = args[1]
        .as_wide_int()
        .ok_or_else(|| mismatch("handler index", &args[1]))?;
    let handler = usize::try_from(index)
        .ok()
        .and_then(|i| ctx.handlers().get(i))
        .ok_or(ExecError::MissingEntry {
            what: "handler",
            index: u32::try_from(index).unwrap_or(u32::MAX),
        })?;
    Ok((ctx, handler))
}

#[cold]
fn mismatch(expected: &'static str, got: &Value) -> ExecError {
    ExecError::TypeMismatch {
        expected,
        got: got.kind().name(),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
