//! Exception handler registrations.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use bp_ir::{ExceptionType, Thrown, Value};

use crate::RetryPolicy;

/// Erased handler body. Returns the recovery value as an object, or null.
type HandlerFn = dyn Fn(&Thrown) -> Value + Send + Sync;

/// A handler for one exception type, with an optional retry policy.
///
/// Action handlers observe the exception; recovering handlers also produce
/// the value the dispatch returns in place of the action's output.
#[derive(Clone)]
pub struct ExceptionHandler {
    catch: ExceptionType,
    body: Arc<HandlerFn>,
    policy: Option<RetryPolicy>,
}

impl ExceptionHandler {
    /// Handle errors of concrete type `E`.
    pub fn action<E, F>(f: F) -> Self
    where
        E: Error + Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self::with_body(
            ExceptionType::of::<E>(),
            Arc::new(move |thrown: &Thrown| {
                if let Some(error) = thrown.downcast_ref::<E>() {
                    f(error);
                }
                Value::Null
            }),
        )
    }

    /// Handle errors of concrete type `E`, recovering with a value.
    pub fn recover<E, O, F>(f: F) -> Self
    where
        E: Error + Send + Sync + 'static,
        O: Any + Send + Sync,
        F: Fn(&E) -> O + Send + Sync + 'static,
    {
        Self::with_body(
            ExceptionType::of::<E>(),
            Arc::new(move |thrown: &Thrown| match thrown.downcast_ref::<E>() {
                Some(error) => Value::object(f(error)),
                None => Value::Null,
            }),
        )
    }

    /// Handle every exception.
    pub fn any_action<F>(f: F) -> Self
    where
        F: Fn(&Thrown) + Send + Sync + 'static,
    {
        Self::matching(ExceptionType::any(), f)
    }

    /// Handle every exception, recovering with a value.
    pub fn any_recover<O, F>(f: F) -> Self
    where
        O: Any + Send + Sync,
        F: Fn(&Thrown) -> O + Send + Sync + 'static,
    {
        Self::with_body(
            ExceptionType::any(),
            Arc::new(move |thrown: &Thrown| Value::object(f(thrown))),
        )
    }

    /// Handle whatever `catch` matches, e.g. an [`ExceptionType::family`].
    pub fn matching<F>(catch: ExceptionType, f: F) -> Self
    where
        F: Fn(&Thrown) + Send + Sync + 'static,
    {
        Self::with_body(
            catch,
            Arc::new(move |thrown: &Thrown| {
                f(thrown);
                Value::Null
            }),
        )
    }

    fn with_body(catch: ExceptionType, body: Arc<HandlerFn>) -> Self {
        ExceptionHandler {
            catch,
            body,
            policy: None,
        }
    }

    /// Retry the action under `policy` before this handler runs.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[inline]
    pub fn catch(&self) -> ExceptionType {
        self.catch
    }

    /// The handler's own policy; `None` defers to the context default.
    #[inline]
    pub fn policy(&self) -> Option<RetryPolicy> {
        self.policy
    }

    pub(crate) fn invoke(&self, thrown: &Thrown) -> Value {
        (self.body)(thrown)
    }
}

impl fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionHandler")
            .field("catch", &self.catch)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
