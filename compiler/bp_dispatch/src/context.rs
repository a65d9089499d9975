//! Error contexts: ordered handler registrations.

use std::any::TypeId;

use smallvec::SmallVec;
use tracing::warn;

use crate::{ExceptionHandler, RetryPolicy};

/// Cache key of a dispatch routine: the handler types in catch order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DispatchKey(SmallVec<[TypeId; 4]>);

impl DispatchKey {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Exception handlers in registration order, which is also catch order.
///
/// Contexts are values: registering a handler returns a new context and
/// never changes one a routine may already be running against.
#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    handlers: Vec<ExceptionHandler>,
    default_policy: RetryPolicy,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`. The first registration for an exception type
    /// wins; registering the same type again leaves the context unchanged.
    #[must_use]
    pub fn with_handler(mut self, handler: ExceptionHandler) -> Self {
        let catch = handler.catch();
        if self.handles(catch.id()) {
            warn!(
                exception = catch.name(),
                "exception type already handled; registration ignored"
            );
            return self;
        }
        self.handlers.push(handler);
        self
    }

    /// Policy for handlers registered without one.
    #[must_use]
    pub fn with_default_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// A new context for the next link of a chain, keeping the default
    /// policy. Handlers are carried over only when `carry_handlers` is set.
    #[must_use]
    pub fn derive(&self, carry_handlers: bool) -> Self {
        ErrorContext {
            handlers: if carry_handlers {
                self.handlers.clone()
            } else {
                Vec::new()
            },
            default_policy: self.default_policy,
        }
    }

    #[inline]
    pub fn handlers(&self) -> &[ExceptionHandler] {
        &self.handlers
    }

    #[inline]
    pub fn default_policy(&self) -> RetryPolicy {
        self.default_policy
    }

    pub fn handles(&self, id: TypeId) -> bool {
        self.handlers.iter().any(|h| h.catch().id() == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn key(&self) -> DispatchKey {
        DispatchKey(self.handlers.iter().map(|h| h.catch().id()).collect())
    }

    /// Effective policy of `handler`.
    pub(crate) fn policy_of(&self, handler: &ExceptionHandler) -> RetryPolicy {
        handler.policy().unwrap_or(self.default_policy)
    }
}

#[cfg(test)]
mod tests;
