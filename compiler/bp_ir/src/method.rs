//! Method table entries and routine signatures.

use smallvec::SmallVec;

use crate::ObjectType;

/// How a method is invoked, which fixes its receiver convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodKind {
    /// No receiver.
    Static,
    /// Receiver on the stack below the arguments.
    Instance,
    /// No receiver; always produces the constructed object.
    Constructor,
    /// Receiver only; always produces a value.
    Getter,
    /// Receiver and one value; produces nothing.
    Setter,
}

impl MethodKind {
    #[inline]
    pub fn has_receiver(self) -> bool {
        matches!(
            self,
            MethodKind::Instance | MethodKind::Getter | MethodKind::Setter
        )
    }
}

/// Signature of a method-table entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub name: String,
    pub kind: MethodKind,
    /// Explicit arguments, not counting the receiver.
    pub arity: u8,
    pub returns: bool,
}

impl MethodSig {
    /// Static method producing a value.
    pub fn function(name: impl Into<String>, arity: u8) -> Self {
        Self::new(name, MethodKind::Static, arity, true)
    }

    /// Static method producing nothing.
    pub fn procedure(name: impl Into<String>, arity: u8) -> Self {
        Self::new(name, MethodKind::Static, arity, false)
    }

    pub fn instance(name: impl Into<String>, arity: u8, returns: bool) -> Self {
        Self::new(name, MethodKind::Instance, arity, returns)
    }

    pub fn constructor(name: impl Into<String>, arity: u8) -> Self {
        Self::new(name, MethodKind::Constructor, arity, true)
    }

    pub fn getter(name: impl Into<String>) -> Self {
        Self::new(name, MethodKind::Getter, 0, true)
    }

    pub fn setter(name: impl Into<String>) -> Self {
        Self::new(name, MethodKind::Setter, 1, false)
    }

    fn new(name: impl Into<String>, kind: MethodKind, arity: u8, returns: bool) -> Self {
        MethodSig {
            name: name.into(),
            kind,
            arity,
            returns,
        }
    }

    /// Values consumed from the stack, receiver included.
    pub fn pops(&self) -> u32 {
        u32::from(self.arity) + u32::from(self.kind.has_receiver())
    }

    /// Values produced on the stack.
    pub fn pushes(&self) -> u32 {
        u32::from(self.returns)
    }
}

/// A method-table entry: signature plus the executor-specific body.
#[derive(Clone, Debug)]
pub struct Method<M> {
    pub sig: MethodSig,
    pub body: M,
}

/// Declared kind of a routine parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Shared reference to a host value of the given type.
    Ref(ObjectType),
    /// A user action invoked through an instance call.
    Action,
}

impl ParamKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ParamKind::Ref(ty) => ty.name(),
            ParamKind::Action => "action",
        }
    }
}

/// Whether a routine returns a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum ReturnKind {
    Void,
    Value,
}

impl ReturnKind {
    /// Stack values consumed by `ret`.
    #[inline]
    pub fn arity(self) -> u32 {
        match self {
            ReturnKind::Void => 0,
            ReturnKind::Value => 1,
        }
    }
}

/// Parameter and return kinds of a routine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: SmallVec<[ParamKind; 2]>,
    pub returns: ReturnKind,
}

impl Signature {
    /// A routine returning a value.
    pub fn function(params: impl IntoIterator<Item = ParamKind>) -> Self {
        Signature {
            params: params.into_iter().collect(),
            returns: ReturnKind::Value,
        }
    }

    /// A routine returning nothing.
    pub fn action(params: impl IntoIterator<Item = ParamKind>) -> Self {
        Signature {
            params: params.into_iter().collect(),
            returns: ReturnKind::Void,
        }
    }
}
