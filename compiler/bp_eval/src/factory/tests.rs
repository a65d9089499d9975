use bp_ir::{CatchWriter, ExceptionType, Value};
use pretty_assertions::assert_eq;

use super::*;
use crate::Frame;

fn constant(b: &mut crate::Builder) {
    b.load_int(42);
    b.ret();
}

#[test]
fn ephemeral_factory_creates_runnable_routine() {
    let routine = RoutineFactory::ephemeral()
        .create("answer", Signature::function([]), constant)
        .unwrap();
    assert_eq!(routine.name(), "answer");
    assert!(matches!(routine.invoke(&mut Frame::new()), Ok(Value::Int(42))));
}

#[test]
fn verification_rejects_unbalanced_body() {
    let err = RoutineFactory::ephemeral()
        .with_verification(true)
        .create("unbalanced", Signature::function([]), |b| {
            b.load_int(1);
            b.load_int(2);
            b.ret();
        })
        .unwrap_err();
    assert!(matches!(err, EmitError::UnbalancedReturn { .. }));
}

#[test]
fn structural_errors_fail_even_without_verification() {
    let factory = RoutineFactory::ephemeral().with_verification(false);
    assert!(!factory.verifies());
    let err = factory
        .create("open", Signature::function([]), |b| {
            b.begin_try();
            b.load_null();
            b.ret();
        })
        .unwrap_err();
    assert_eq!(err, EmitError::UnclosedRegion(1));
}

#[test]
fn persisted_factory_always_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let factory = RoutineFactory::persisted(dir.path()).with_verification(false);
    assert!(factory.verifies());
}

#[test]
fn persisted_factory_writes_listing_and_image() {
    let dir = tempfile::tempdir().unwrap();
    let factory = RoutineFactory::persisted(dir.path());
    let routine = factory
        .create("validate<Account>", Signature::function([]), |b| {
            b.try_catch(
                |b| {
                    b.load_int(1);
                    b.pop();
                },
                vec![(
                    ExceptionType::any(),
                    Box::new(crate::Builder::pop) as CatchWriter<'_, HostMethod>,
                )],
            );
            b.load_int(42);
            b.ret();
        })
        .unwrap();
    assert_eq!(routine.max_stack(), Some(1));

    let listing = std::fs::read_to_string(dir.path().join("validate_Account_.bpil")).unwrap();
    assert!(listing.starts_with(".routine validate<Account> () -> value\n"));
    assert!(listing.contains("catch Exception"));

    #[cfg(feature = "persist")]
    {
        let image = read_unit(&dir.path().join("validate_Account_.bpir")).unwrap();
        assert_eq!(image.name, "validate<Account>");
        assert_eq!(image.regions[0].catches, vec!["Exception".to_owned()]);
        assert_eq!(image.verify().unwrap().max_depth, 1);
    }
}

#[test]
fn persistence_failure_does_not_fail_creation() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the directory should be.
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"").unwrap();
    let routine = RoutineFactory::persisted(&blocked)
        .create("answer", Signature::function([]), constant)
        .unwrap();
    assert!(matches!(routine.invoke(&mut Frame::new()), Ok(Value::Int(42))));
}

#[test]
fn file_stems_are_sanitized() {
    assert_eq!(unit_file_stem("dispatch[Io,Any]"), "dispatch_Io_Any_");
    assert_eq!(unit_file_stem("validate.Account-1"), "validate.Account-1");
}
