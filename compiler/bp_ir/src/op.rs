//! Instruction set and exception table.

use smallvec::SmallVec;

use crate::{Const, ExceptionType, ObjectType};

// ── ID newtypes ─────────────────────────────────────────────────────

/// Branch target within a routine.
///
/// Labels are allocated by [`RoutineBuilder::define_label`](crate::RoutineBuilder::define_label)
/// and bound to an instruction index by `mark_label`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Label(u32);

impl Label {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local variable slot within a routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Local(u32);

impl Local {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Entry in a routine's method table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MethodId(u32);

impl MethodId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Instructions ────────────────────────────────────────────────────

/// A single stack-machine instruction.
///
/// Stack effects are fixed per opcode except for the call family, whose
/// effect comes from the callee's [`MethodSig`](crate::MethodSig).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Nop,
    /// Push a reference to argument `n`.
    LoadArg(u16),
    LoadLocal(Local),
    StoreLocal(Local),
    LoadConst(Const),
    Pop,
    Dup,
    /// Checked integer addition of the two topmost values.
    Add,
    /// Checked integer subtraction (`second - top`).
    Sub,

    /// Static call: pops the arguments, pushes the result if any.
    Call(MethodId),
    /// Instance call: pops the receiver then the arguments.
    CallInstance(MethodId),
    /// Constructor call: pops the arguments, pushes the new object.
    NewObject(MethodId),
    /// Property read: pops the receiver, pushes the value.
    GetProperty(MethodId),
    /// Property write: pops the receiver and the value.
    SetProperty(MethodId),
    /// Checked cast of the top object to a concrete host type.
    Cast(ObjectType),

    Branch(Label),
    BranchTrue(Label),
    BranchFalse(Label),
    BranchEq(Label),
    BranchNe(Label),
    BranchLt(Label),
    BranchLe(Label),
    BranchGt(Label),
    BranchGe(Label),
    /// Exit a protected region or handler: empties the stack and jumps.
    Leave(Label),

    /// Raise the exception on top of the stack.
    Throw,
    /// Re-raise the exception currently being handled.
    Rethrow,
    Ret,
}

impl Op {
    /// Assembly mnemonic used by listings.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Nop => "nop",
            Op::LoadArg(_) => "ldarg",
            Op::LoadLocal(_) => "ldloc",
            Op::StoreLocal(_) => "stloc",
            Op::LoadConst(_) => "ldc",
            Op::Pop => "pop",
            Op::Dup => "dup",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Call(_) => "call",
            Op::CallInstance(_) => "callvirt",
            Op::NewObject(_) => "newobj",
            Op::GetProperty(_) => "getprop",
            Op::SetProperty(_) => "setprop",
            Op::Cast(_) => "castclass",
            Op::Branch(_) => "br",
            Op::BranchTrue(_) => "brtrue",
            Op::BranchFalse(_) => "brfalse",
            Op::BranchEq(_) => "beq",
            Op::BranchNe(_) => "bne",
            Op::BranchLt(_) => "blt",
            Op::BranchLe(_) => "ble",
            Op::BranchGt(_) => "bgt",
            Op::BranchGe(_) => "bge",
            Op::Leave(_) => "leave",
            Op::Throw => "throw",
            Op::Rethrow => "rethrow",
            Op::Ret => "ret",
        }
    }

    /// The label this instruction transfers control to, if any.
    pub fn target(&self) -> Option<Label> {
        match *self {
            Op::Branch(l)
            | Op::BranchTrue(l)
            | Op::BranchFalse(l)
            | Op::BranchEq(l)
            | Op::BranchNe(l)
            | Op::BranchLt(l)
            | Op::BranchLe(l)
            | Op::BranchGt(l)
            | Op::BranchGe(l)
            | Op::Leave(l) => Some(l),
            _ => None,
        }
    }

    /// The method this instruction calls, if any.
    pub fn method(&self) -> Option<MethodId> {
        match *self {
            Op::Call(m)
            | Op::CallInstance(m)
            | Op::NewObject(m)
            | Op::GetProperty(m)
            | Op::SetProperty(m) => Some(m),
            _ => None,
        }
    }
}

// ── Exception table ─────────────────────────────────────────────────

/// One catch clause of a protected region. `start..end` is the handler body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatchHandler {
    pub catch: ExceptionType,
    pub start: u32,
    pub end: u32,
}

/// A protected region: `try_start..try_end` guarded by ordered handlers.
///
/// Regions are stored innermost-first (in the order they were closed), so a
/// linear scan for the first region covering a faulting instruction finds
/// the innermost one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryRegion {
    pub try_start: u32,
    pub try_end: u32,
    pub handlers: SmallVec<[CatchHandler; 2]>,
}

impl TryRegion {
    #[inline]
    pub fn covers(&self, pc: u32) -> bool {
        self.try_start <= pc && pc < self.try_end
    }
}
