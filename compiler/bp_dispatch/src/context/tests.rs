use std::io;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::BackoffStrategy;

#[derive(Debug, thiserror::Error)]
#[error("timeout")]
struct Timeout;

fn names(ctx: &ErrorContext) -> Vec<&'static str> {
    ctx.handlers().iter().map(|h| h.catch().name()).collect()
}

#[test]
fn registration_order_is_kept() {
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}))
        .with_handler(ExceptionHandler::action(|_: &io::Error| {}))
        .with_handler(ExceptionHandler::any_action(|_| {}));
    assert_eq!(names(&ctx), vec!["Timeout", "Error", "Exception"]);
}

#[test]
fn re_registering_a_type_is_ignored() {
    let retrying = RetryPolicy::new(5, Duration::ZERO, BackoffStrategy::None);
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}))
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}).with_retry(retrying));
    assert_eq!(ctx.len(), 1);
    assert_eq!(ctx.handlers()[0].policy(), None);
}

#[test]
fn keys_are_order_sensitive() {
    let a = ErrorContext::new()
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}))
        .with_handler(ExceptionHandler::any_action(|_| {}));
    let b = ErrorContext::new()
        .with_handler(ExceptionHandler::any_action(|_| {}))
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}));
    let a_again = ErrorContext::new()
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}).with_retry(RetryPolicy::NONE))
        .with_handler(ExceptionHandler::any_action(|_| {}));
    assert_ne!(a.key(), b.key());
    assert_eq!(a.key(), a_again.key());
    assert_eq!(a.key().len(), 2);
    assert!(ErrorContext::new().key().is_empty());
}

#[test]
fn derive_carries_or_resets_handlers() {
    let policy = RetryPolicy::new(1, Duration::from_millis(5), BackoffStrategy::Exponential);
    let ctx = ErrorContext::new()
        .with_default_policy(policy)
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}));

    let carried = ctx.derive(true);
    assert_eq!(carried.key(), ctx.key());
    assert_eq!(carried.default_policy(), policy);

    let reset = ctx.derive(false);
    assert!(reset.is_empty());
    assert_eq!(reset.default_policy(), policy);
    // The source context is untouched.
    assert_eq!(ctx.len(), 1);
}

#[test]
fn handler_policy_falls_back_to_context_default() {
    let default = RetryPolicy::new(2, Duration::ZERO, BackoffStrategy::None);
    let own = RetryPolicy::new(7, Duration::ZERO, BackoffStrategy::None);
    let ctx = ErrorContext::new()
        .with_default_policy(default)
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}))
        .with_handler(ExceptionHandler::any_action(|_| {}).with_retry(own));
    let policies: Vec<_> = ctx.handlers().iter().map(|h| ctx.policy_of(h)).collect();
    assert_eq!(policies, vec![default, own]);
}
