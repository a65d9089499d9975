use super::*;

#[derive(Debug)]
struct ArgumentError(&'static str);

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad argument: {}", self.0)
    }
}

impl Error for ArgumentError {}

#[derive(Debug)]
struct TimeoutError;

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out")
    }
}

impl Error for TimeoutError {}

#[test]
fn short_type_name_strips_module_path() {
    assert_eq!(short_type_name("alloc::string::String"), "String");
    assert_eq!(short_type_name("u32"), "u32");
    assert_eq!(
        short_type_name("core::option::Option<alloc::string::String>"),
        "Option<alloc::string::String>"
    );
}

#[test]
fn thrown_keeps_concrete_type() {
    let thrown = Thrown::new(ArgumentError("x"));
    assert!(thrown.is::<ArgumentError>());
    assert!(!thrown.is::<TimeoutError>());
    assert_eq!(thrown.type_name(), "ArgumentError");
    assert_eq!(thrown.to_string(), "bad argument: x");
    assert_eq!(thrown.downcast_ref::<ArgumentError>().map(|e| e.0), Some("x"));
}

#[test]
fn thrown_converts_with_question_mark() {
    fn fails() -> Result<(), Thrown> {
        let inner: Result<(), TimeoutError> = Err(TimeoutError);
        inner?;
        Ok(())
    }
    let err = fails().err();
    assert!(err.is_some_and(|t| t.is::<TimeoutError>()));
}

#[test]
fn exception_type_matches_exact_type() {
    let arg = ExceptionType::of::<ArgumentError>();
    assert!(arg.matches(&Thrown::new(ArgumentError("y"))));
    assert!(!arg.matches(&Thrown::new(TimeoutError)));
    assert_eq!(arg.name(), "ArgumentError");
}

#[test]
fn any_matches_everything() {
    let any = ExceptionType::any();
    assert!(any.matches(&Thrown::new(ArgumentError("z"))));
    assert!(any.matches(&Thrown::new(TimeoutError)));
    assert_ne!(any, ExceptionType::of::<TimeoutError>());
}

#[test]
fn exception_type_identity_ignores_construction() {
    assert_eq!(
        ExceptionType::of::<TimeoutError>(),
        ExceptionType::of::<TimeoutError>()
    );
    assert_eq!(ExceptionType::any().id(), ExceptionType::any().id());
}

#[test]
fn family_uses_custom_matcher() {
    struct Transient;
    let transient = ExceptionType::family::<Transient>("Transient", |t| {
        t.is::<TimeoutError>() || t.is::<ArgumentError>()
    });
    assert!(transient.matches(&Thrown::new(TimeoutError)));
    assert_eq!(transient.name(), "Transient");
}

#[test]
fn object_type_checks_instances() {
    let ty = ObjectType::of::<String>();
    assert!(ty.is_instance(&String::from("a")));
    assert!(!ty.is_instance(&5_u32));
    assert_eq!(ty.name(), "String");
}
