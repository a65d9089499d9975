use std::cell::Cell;

use bp_ir::ObjectType;
use pretty_assertions::assert_eq;

use super::*;

#[derive(Debug)]
struct Account {
    owner: String,
}

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("refused")
    }
}

impl std::error::Error for Refused {}

#[test]
fn arguments_resolve_by_index_and_type() {
    let account = Account {
        owner: "ada".to_owned(),
    };
    let frame = Frame::new().with_ref(&account);

    assert_eq!(frame.arg_ref::<Account>(0).unwrap().owner, "ada");
    assert_eq!(
        frame.resolve::<Account>(&Value::Arg(0)).unwrap().owner,
        "ada"
    );
    assert_eq!(
        frame.arg_ref::<String>(0).unwrap_err(),
        ExecError::TypeMismatch {
            expected: "String",
            got: "reference"
        }
    );
    assert_eq!(
        frame.arg_ref::<Account>(1).unwrap_err(),
        ExecError::UnboundArgument(1)
    );
}

#[test]
fn resolve_reads_objects_and_rejects_null() {
    let frame = Frame::new();
    let boxed = Value::object(7_u32);
    assert_eq!(*frame.resolve::<u32>(&boxed).unwrap(), 7);
    assert_eq!(
        frame.resolve::<u32>(&Value::Null).unwrap_err(),
        ExecError::NullReference("resolve")
    );
    assert_eq!(
        frame.resolve::<u32>(&Value::Int(7)).unwrap_err(),
        ExecError::TypeMismatch {
            expected: "u32",
            got: "int"
        }
    );
}

#[test]
fn actions_run_and_raise_catchable_exceptions() {
    let calls = Cell::new(0);
    let mut ok = || -> Result<(), Thrown> {
        calls.set(calls.get() + 1);
        Ok(())
    };
    let mut failing = || -> Result<(), Thrown> { Err(Thrown::new(Refused)) };

    let mut frame = Frame::new().with_action(&mut ok);
    frame.invoke_action(0).unwrap();
    frame.invoke_action(0).unwrap();
    drop(frame);
    assert_eq!(calls.get(), 2);

    let mut frame = Frame::new().with_action(&mut failing);
    match frame.invoke_action(0) {
        Err(Raise::Throw(thrown)) => assert!(thrown.is::<Refused>()),
        other => panic!("expected a thrown exception, got {other:?}"),
    }
}

#[test]
fn check_matches_arguments_against_signature() {
    let account = Account {
        owner: String::new(),
    };
    let mut action = || -> Result<(), Thrown> { Ok(()) };
    let signature = Signature::function([
        ParamKind::Action,
        ParamKind::Ref(ObjectType::of::<Account>()),
    ]);

    let frame = Frame::new().with_action(&mut action).with_ref(&account);
    frame.check("dispatch", &signature).unwrap();

    let frame = Frame::new().with_ref(&account);
    assert_eq!(
        frame.check("dispatch", &signature).unwrap_err(),
        ExecError::ArgumentCount {
            routine: "dispatch".to_owned(),
            expected: 2,
            got: 1
        }
    );

    let frame = Frame::new().with_ref(&account).with_ref(&account);
    assert_eq!(
        frame.check("dispatch", &signature).unwrap_err(),
        ExecError::ArgumentKind {
            routine: "dispatch".to_owned(),
            index: 0,
            expected: "action"
        }
    );
}
