use pretty_assertions::assert_eq;

use super::*;
use crate::{ParamKind, ReturnKind};

#[derive(Debug)]
struct Boom;

impl std::fmt::Display for Boom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("boom")
    }
}

impl std::error::Error for Boom {}

fn one_arg() -> Signature {
    Signature::function([ParamKind::Ref(ObjectType::of::<String>())])
}

fn builder() -> RoutineBuilder<()> {
    RoutineBuilder::new("test", one_arg())
}

fn catch(
    ty: ExceptionType,
    write: impl FnOnce(&mut RoutineBuilder<()>) + 'static,
) -> (ExceptionType, CatchWriter<'static, ()>) {
    (ty, Box::new(write))
}

#[test]
fn straight_line_body_finishes_and_verifies() {
    let mut b = builder();
    b.load_int(1);
    b.load_int(2);
    b.add();
    assert_eq!(b.current_depth(), Some(1));
    b.ret();
    assert_eq!(b.current_depth(), None);

    let body = b.finish().unwrap();
    assert_eq!(body.ops, vec![
        Op::LoadConst(Const::Int(1)),
        Op::LoadConst(Const::Int(2)),
        Op::Add,
        Op::Ret,
    ]);
    let report = body.verify().unwrap();
    assert_eq!(report.max_depth, 2);
}

#[test]
fn if_helpers_emit_inverted_branches() {
    let mut b = builder();
    b.load_int(1);
    b.load_int(2);
    let else_ = b.if_less_than();
    b.load_bool(true);
    b.ret();
    b.mark_label(else_);
    b.load_bool(false);
    b.ret();

    let body = b.finish().unwrap();
    assert_eq!(body.ops[2], Op::BranchGe(else_));
    assert_eq!(body.target(else_), Some(5));
    body.verify().unwrap();
}

#[test]
fn marking_a_label_twice_is_reported_at_finish() {
    let mut b = builder();
    let l = b.define_label();
    b.mark_label(l);
    b.mark_label(l);
    b.load_null();
    b.ret();
    assert_eq!(b.finish().unwrap_err(), EmitError::LabelMarkedTwice(0));
}

#[test]
fn referenced_but_unmarked_label_is_reported() {
    let mut b = builder();
    let l = b.define_label();
    b.branch(l);
    assert_eq!(b.finish().unwrap_err(), EmitError::UnmarkedLabel(0));
}

#[test]
fn first_misuse_wins() {
    let mut b = builder();
    b.load_arg(3);
    b.load_local(Local::new(9));
    assert_eq!(
        b.finish().unwrap_err(),
        EmitError::UnknownArgument { index: 3, count: 1 }
    );
}

#[test]
fn call_kind_must_match_method_kind() {
    let mut b = builder();
    let getter = b.declare_method(MethodSig::getter("Length"), ());
    b.load_arg(0);
    b.call(getter);
    let err = b.finish().unwrap_err();
    assert_eq!(
        err,
        EmitError::MethodKindMismatch {
            op: "call",
            method: "Length".to_owned(),
            kind: MethodKind::Getter,
        }
    );
}

#[test]
fn call_effects_follow_method_signature() {
    let mut b = builder();
    let check = b.declare_method(MethodSig::instance("Check", 1, true), ());
    b.load_arg(0);
    b.load_int(5);
    b.call_instance(check);
    assert_eq!(b.current_depth(), Some(1));
    b.ret();
    b.finish().unwrap().verify().unwrap();
}

#[test]
fn try_catch_records_region_and_marks_exit() {
    let mut b = builder();
    let result = b.declare_local(ValueKind::Any);
    let exit = b.try_catch(
        |b| {
            b.load_int(1);
            b.store_local(result);
        },
        vec![
            catch(ExceptionType::of::<Boom>(), move |b| {
                b.pop();
                b.load_int(2);
                b.store_local(result);
            }),
            catch(ExceptionType::any(), RoutineBuilder::rethrow),
        ],
    );
    assert_eq!(b.current_depth(), Some(0));
    b.load_local(result);
    b.ret();

    let body = b.finish().unwrap();
    // try: ldc, stloc, leave | catch Boom: pop, ldc, stloc, leave | catch any: rethrow
    assert_eq!(body.regions.len(), 1);
    let region = &body.regions[0];
    assert_eq!((region.try_start, region.try_end), (0, 3));
    let spans: Vec<_> = region
        .handlers
        .iter()
        .map(|h| (h.catch.name(), h.start, h.end))
        .collect();
    assert_eq!(spans, vec![("Boom", 3, 7), ("Exception", 7, 8)]);
    assert_eq!(body.target(exit), Some(8));
    assert_eq!(body.ops[2], Op::Leave(exit));
    body.verify().unwrap();
}

#[test]
fn try_catch_without_handlers_still_frames_body() {
    let mut b = builder();
    let exit = b.try_catch(
        |b| {
            b.load_int(0);
            b.pop();
        },
        Vec::new(),
    );
    b.load_null();
    b.ret();
    let body = b.finish().unwrap();
    assert_eq!(body.target(exit), Some(3));
    assert!(body.regions[0].handlers.is_empty());
    body.verify().unwrap();
}

#[test]
fn nested_regions_are_stored_innermost_first() {
    let mut b = builder();
    b.begin_try();
    b.begin_try();
    b.load_int(1);
    b.pop();
    b.begin_catch(ExceptionType::of::<Boom>());
    b.pop();
    b.end_try();
    b.begin_catch(ExceptionType::any());
    b.pop();
    b.end_try();
    b.load_null();
    b.ret();

    let body = b.finish().unwrap();
    assert_eq!(body.regions.len(), 2);
    assert_eq!(body.regions[0].handlers[0].catch, ExceptionType::of::<Boom>());
    assert_eq!(body.regions[1].handlers[0].catch, ExceptionType::any());
    assert!(body.regions[1].try_start <= body.regions[0].try_start);
    assert!(body.regions[0].try_end <= body.regions[1].try_end);
    body.verify().unwrap();
}

#[test]
fn region_api_misuse_is_reported() {
    let mut b = builder();
    b.begin_catch(ExceptionType::any());
    assert_eq!(b.finish().unwrap_err(), EmitError::CatchOutsideTry);

    let mut b = builder();
    b.end_try();
    assert_eq!(b.finish().unwrap_err(), EmitError::EndWithoutTry);

    let mut b = builder();
    b.begin_try();
    assert_eq!(b.finish().unwrap_err(), EmitError::UnclosedRegion(1));
}

#[test]
fn verify_rejects_unbalanced_return() {
    let mut b = builder();
    b.load_int(1);
    b.load_int(2);
    b.ret();
    let body = b.finish().unwrap();
    assert!(matches!(
        body.verify(),
        Err(EmitError::UnbalancedReturn { pc: 2, .. })
    ));
}

#[test]
fn void_routine_returns_without_value() {
    let mut b: RoutineBuilder<()> = RoutineBuilder::new("noop", Signature::action([]));
    b.ret();
    let body = b.finish().unwrap();
    assert_eq!(body.signature.returns, ReturnKind::Void);
    body.verify().unwrap();
}

#[test]
fn listing_shows_labels_methods_and_regions() {
    let mut b = builder();
    let len = b.declare_method(MethodSig::getter("Length"), ());
    b.try_catch(
        |b| {
            b.load_arg(0);
            b.get_property(len);
            b.pop();
        },
        vec![catch(ExceptionType::of::<Boom>(), RoutineBuilder::pop)],
    );
    b.load_str("done");
    b.ret();
    let listing = b.finish().unwrap().listing();
    let text = listing.as_str();

    assert!(text.starts_with(".routine test (String) -> value\n"));
    assert!(text.contains("    #0 get Length/0 -> value\n"));
    assert!(text.contains("IL_0001  getprop   #0 Length\n"));
    assert!(text.contains("IL_0003  leave     L0\n"));
    assert!(text.contains("L0:\n    IL_0006  ldc       \"done\"\n"));
    assert!(text.contains("    try IL_0000..IL_0004 catch Boom IL_0004..IL_0006\n"));
}
