use std::io;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use super::*;
use crate::{BackoffStrategy, Outcome, RetryPolicy};
use bp_ir::Thrown;

#[derive(Debug, thiserror::Error)]
#[error("timed out after {0} ms")]
struct Timeout(u64);

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct Refused;

fn compiler() -> DispatchCompiler {
    DispatchCompiler::new(RoutineFactory::ephemeral().with_verification(true))
}

/// Records which handler ran, in order.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    fn note(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn successful_action_completes_without_handlers_running() {
    let journal = Journal::default();
    let j = journal.clone();
    let ctx = ErrorContext::new().with_handler(ExceptionHandler::action(move |_: &Timeout| {
        j.note("timeout");
    }));
    let compiler = compiler();
    let outcome = compiler
        .routine(&ctx)
        .unwrap()
        .run(&ctx, || Ok::<_, Thrown>(7_i32))
        .unwrap();
    assert_eq!(outcome, Outcome::Completed(7));
    assert!(journal.entries().is_empty());
}

#[test]
fn registered_exception_is_handled_once() {
    let journal = Journal::default();
    let j = journal.clone();
    let ctx = ErrorContext::new().with_handler(ExceptionHandler::action(move |e: &Timeout| {
        assert_eq!(e.0, 30);
        j.note("timeout");
    }));
    let routine = compiler().routine(&ctx).unwrap();
    let outcome = routine
        .run(&ctx, || Err::<String, _>(Thrown::new(Timeout(30))))
        .unwrap();
    assert_eq!(outcome, Outcome::Handled(None));
    assert_eq!(journal.entries(), vec!["timeout"]);
}

#[test]
fn unregistered_exception_propagates_unchanged() {
    let ctx = ErrorContext::new().with_handler(ExceptionHandler::action(|_: &Timeout| {}));
    let routine = compiler().routine(&ctx).unwrap();
    let err = routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Refused)))
        .unwrap_err();
    assert!(err.is::<Refused>());
    assert_eq!(err.to_string(), "connection refused");
}

#[test]
fn empty_context_propagates_everything() {
    let ctx = ErrorContext::new();
    let routine = compiler().routine(&ctx).unwrap();
    assert!(routine.key().is_empty());
    let err = routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Timeout(1))))
        .unwrap_err();
    assert!(err.is::<Timeout>());
    assert_eq!(routine.run(&ctx, || Ok::<_, Thrown>("ok")).unwrap(), Outcome::Completed("ok"));
}

#[test]
fn specific_handler_registered_first_wins() {
    let journal = Journal::default();
    let (a, b) = (journal.clone(), journal.clone());
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::action(move |_: &Timeout| a.note("timeout")))
        .with_handler(ExceptionHandler::any_action(move |_| b.note("any")));
    let routine = compiler().routine(&ctx).unwrap();
    routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Timeout(5))))
        .unwrap();
    routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Refused)))
        .unwrap();
    assert_eq!(journal.entries(), vec!["timeout", "any"]);
}

#[test]
fn catch_all_registered_first_shadows_specific_handlers() {
    let journal = Journal::default();
    let (a, b) = (journal.clone(), journal.clone());
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::any_action(move |_| a.note("any")))
        .with_handler(ExceptionHandler::action(move |_: &Timeout| b.note("timeout")));
    let routine = compiler().routine(&ctx).unwrap();
    routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Timeout(5))))
        .unwrap();
    assert_eq!(journal.entries(), vec!["any"]);
}

#[test]
fn re_registered_type_keeps_first_handler() {
    let journal = Journal::default();
    let (a, b) = (journal.clone(), journal.clone());
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::action(move |_: &Timeout| a.note("first")))
        .with_handler(ExceptionHandler::action(move |_: &Timeout| b.note("second")));
    assert_eq!(ctx.len(), 1);
    let routine = compiler().routine(&ctx).unwrap();
    routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Timeout(5))))
        .unwrap();
    assert_eq!(journal.entries(), vec!["first"]);
}

#[test]
fn retry_count_two_makes_three_attempts_before_handling() {
    let attempts = counter();
    let handled = counter();
    let h = Arc::clone(&handled);
    let policy = RetryPolicy::new(2, Duration::ZERO, BackoffStrategy::None);
    let ctx = ErrorContext::new().with_handler(
        ExceptionHandler::action(move |_: &Timeout| {
            h.fetch_add(1, AtomicOrdering::Relaxed);
        })
        .with_retry(policy),
    );
    let routine = compiler().routine(&ctx).unwrap();
    let outcome = routine
        .run(&ctx, || {
            attempts.fetch_add(1, AtomicOrdering::Relaxed);
            Err::<(), _>(Thrown::new(Timeout(1)))
        })
        .unwrap();
    assert_eq!(outcome, Outcome::Handled(None));
    assert_eq!(attempts.load(AtomicOrdering::Relaxed), 3);
    assert_eq!(handled.load(AtomicOrdering::Relaxed), 1);
}

#[test]
fn retry_that_succeeds_completes_without_handling() {
    let handled = counter();
    let h = Arc::clone(&handled);
    let ctx = ErrorContext::new()
        .with_default_policy(RetryPolicy::new(3, Duration::ZERO, BackoffStrategy::None))
        .with_handler(ExceptionHandler::action(move |_: &Timeout| {
            h.fetch_add(1, AtomicOrdering::Relaxed);
        }));
    let routine = compiler().routine(&ctx).unwrap();
    let mut failures_left = 2;
    let outcome = routine
        .run(&ctx, || {
            if failures_left > 0 {
                failures_left -= 1;
                return Err(Thrown::new(Timeout(1)));
            }
            Ok(String::from("done"))
        })
        .unwrap();
    assert_eq!(outcome, Outcome::Completed("done".to_owned()));
    assert_eq!(handled.load(AtomicOrdering::Relaxed), 0);
}

#[test]
fn retries_follow_the_handler_matching_each_failure() {
    // Timeout retries once; Refused is handled immediately.
    let journal = Journal::default();
    let (a, b) = (journal.clone(), journal.clone());
    let ctx = ErrorContext::new()
        .with_handler(
            ExceptionHandler::action(move |_: &Timeout| a.note("timeout"))
                .with_retry(RetryPolicy::new(1, Duration::ZERO, BackoffStrategy::None)),
        )
        .with_handler(ExceptionHandler::action(move |_: &Refused| b.note("refused")));
    let routine = compiler().routine(&ctx).unwrap();
    let mut attempt = 0;
    routine
        .run(&ctx, || {
            attempt += 1;
            match attempt {
                1 => Err(Thrown::new(Timeout(1))),
                _ => Err::<(), _>(Thrown::new(Refused)),
            }
        })
        .unwrap();
    assert_eq!(attempt, 2);
    assert_eq!(journal.entries(), vec!["refused"]);
}

#[test]
fn exponential_backoff_waits_between_attempts() {
    let ctx = ErrorContext::new().with_handler(
        ExceptionHandler::action(|_: &Timeout| {}).with_retry(RetryPolicy::new(
            2,
            Duration::from_millis(2),
            BackoffStrategy::Exponential,
        )),
    );
    let routine = compiler().routine(&ctx).unwrap();
    let start = Instant::now();
    routine
        .run(&ctx, || Err::<(), _>(Thrown::new(Timeout(1))))
        .unwrap();
    // 2 ms after the first failure, 4 ms after the second.
    assert!(start.elapsed() >= Duration::from_millis(6));
}

#[test]
fn recovering_handler_supplies_the_result() {
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::recover(|e: &Timeout| e.0 * 2))
        .with_handler(ExceptionHandler::any_recover(|_| 0_u64));
    let routine = compiler().routine(&ctx).unwrap();
    assert_eq!(
        routine
            .run(&ctx, || Err::<u64, _>(Thrown::new(Timeout(21))))
            .unwrap(),
        Outcome::Handled(Some(42_u64))
    );
    assert_eq!(
        routine
            .run(&ctx, || Err::<u64, _>(Thrown::new(Refused)))
            .unwrap(),
        Outcome::Handled(Some(0_u64))
    );
    assert_eq!(
        routine.run(&ctx, || Ok::<_, Thrown>(5_u64)).unwrap().into_value(),
        Some(5)
    );
}

#[test]
fn recovery_of_the_wrong_type_is_a_fault() {
    let ctx = ErrorContext::new().with_handler(ExceptionHandler::recover(|_: &Timeout| "text"));
    let routine = compiler().routine(&ctx).unwrap();
    let err = routine
        .run(&ctx, || Err::<u64, _>(Thrown::new(Timeout(1))))
        .unwrap_err();
    assert!(err.is::<ExecError>());
}

#[test]
fn io_errors_are_caught_by_concrete_type() {
    let seen = counter();
    let s = Arc::clone(&seen);
    let ctx = ErrorContext::new().with_handler(ExceptionHandler::action(move |e: &io::Error| {
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
        s.fetch_add(1, AtomicOrdering::Relaxed);
    }));
    let routine = compiler().routine(&ctx).unwrap();
    routine
        .run(&ctx, || {
            std::fs::read("/definitely/not/here")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(seen.load(AtomicOrdering::Relaxed), 1);
}

#[test]
fn routines_are_shared_by_handler_sequence() {
    let compiler = compiler();
    let first = ErrorContext::new()
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}))
        .with_handler(ExceptionHandler::any_action(|_| {}));
    let same_types = ErrorContext::new()
        .with_handler(
            ExceptionHandler::action(|_: &Timeout| {})
                .with_retry(RetryPolicy::new(4, Duration::ZERO, BackoffStrategy::None)),
        )
        .with_handler(ExceptionHandler::any_action(|_| {}));
    let reordered = ErrorContext::new()
        .with_handler(ExceptionHandler::any_action(|_| {}))
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}));

    compiler.routine(&first).unwrap();
    compiler.routine(&same_types).unwrap();
    compiler.routine(&reordered).unwrap();

    let stats = compiler.stats();
    assert_eq!(stats.compilations, 2);
    assert_eq!(stats.hits, 1);
    assert_eq!(compiler.compiled_routines(), 2);
}

#[test]
fn running_against_a_context_with_other_types_is_rejected() {
    let compiler = compiler();
    let timeout_ctx = ErrorContext::new().with_handler(ExceptionHandler::action(|_: &Timeout| {}));
    let refused_ctx = ErrorContext::new().with_handler(ExceptionHandler::action(|_: &Refused| {}));
    let routine = compiler.routine(&timeout_ctx).unwrap();
    let err = routine
        .run(&refused_ctx, || Ok::<_, Thrown>(()))
        .unwrap_err();
    assert!(err.is::<ExecError>());
}

#[test]
fn listing_unrolls_one_catch_per_handler_in_order() {
    let ctx = ErrorContext::new()
        .with_handler(ExceptionHandler::action(|_: &Timeout| {}))
        .with_handler(ExceptionHandler::action(|_: &Refused| {}))
        .with_handler(ExceptionHandler::any_action(|_| {}));
    let routine = compiler().routine(&ctx).unwrap();
    assert_eq!(routine.routine().name(), "dispatch.Timeout+Refused+Exception");
    let listing = routine.listing();
    let text = listing.as_str();
    let exceptions = text
        .lines()
        .find(|line| line.trim_start().starts_with("try "))
        .unwrap();
    let order: Vec<usize> = ["catch Timeout", "catch Refused", "catch Exception"]
        .iter()
        .map(|clause| exceptions.find(clause).unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(text.matches("Handler.Handle\n").count(), 3);
}
