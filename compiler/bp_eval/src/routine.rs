//! The routine interpreter.
//!
//! Executes a finished [`RoutineBody`] against a [`Frame`]. The operand
//! stack and locals live only for the duration of one invocation; the body
//! itself is shared and never mutated, so a [`Routine`] is cheap to clone and
//! safe to call from many threads at once.
//!
//! # Exceptions
//!
//! A [`Raise::Throw`] from any instruction (including host methods) unwinds
//! through the exception table: regions are scanned innermost-first, and the
//! first region covering the faulting instruction with a matching handler
//! wins. The operand stack is cleared and the exception pushed before the
//! handler runs. Faults bypass the table entirely.

use std::cmp::Ordering;
use std::sync::Arc;

use bp_ir::{Listing, Op, ReturnKind, RoutineBody, Signature, Thrown, Value};
use smallvec::SmallVec;

use crate::errors::{integer_overflow, invalid_cast, missing_entry, null_reference, type_mismatch};
use crate::{ExecError, Frame, HostMethod, Raise};

/// Initial operand-stack capacity when the body was not verified.
const DEFAULT_STACK: usize = 8;

/// An executable, immutable routine.
#[derive(Clone, Debug)]
pub struct Routine {
    body: Arc<RoutineBody<HostMethod>>,
    max_stack: Option<u32>,
}

impl Routine {
    pub(crate) fn new(body: RoutineBody<HostMethod>, max_stack: Option<u32>) -> Self {
        Routine {
            body: Arc::new(body),
            max_stack,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.body.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.body.signature
    }

    #[inline]
    pub fn body(&self) -> &RoutineBody<HostMethod> {
        &self.body
    }

    /// Deepest operand stack, known when the body was verified.
    #[inline]
    pub fn max_stack(&self) -> Option<u32> {
        self.max_stack
    }

    pub fn listing(&self) -> Listing {
        self.body.listing()
    }

    /// Run the routine. Arguments are checked against the signature first.
    pub fn invoke(&self, frame: &mut Frame<'_>) -> Result<Value, Raise> {
        frame.check(&self.body.name, &self.body.signature)?;
        let capacity = self.max_stack.map_or(DEFAULT_STACK, |d| d as usize);
        let mut machine = Machine {
            body: &self.body,
            stack: Vec::with_capacity(capacity),
            locals: vec![Value::Null; self.body.locals.len()],
            handling: SmallVec::new(),
        };
        machine.run(frame)
    }
}

enum Step {
    Next,
    Jump(u32),
    Return(Value),
}

/// An exception currently being handled, with its handler's range.
struct Handling {
    start: u32,
    end: u32,
    thrown: Thrown,
}

struct Machine<'r> {
    body: &'r RoutineBody<HostMethod>,
    stack: Vec<Value>,
    locals: Vec<Value>,
    handling: SmallVec<[Handling; 2]>,
}

impl Machine<'_> {
    fn run(&mut self, frame: &mut Frame<'_>) -> Result<Value, Raise> {
        let body = self.body;
        let mut pc: u32 = 0;
        loop {
            let Some(op) = body.ops.get(pc as usize) else {
                return Err(ExecError::FellOffEnd.into());
            };
            match self.step(op, pc, frame) {
                Ok(Step::Next) => pc += 1,
                Ok(Step::Jump(target)) => pc = target,
                Ok(Step::Return(value)) => return Ok(value),
                Err(Raise::Throw(thrown)) => pc = self.unwind(pc, thrown)?,
                Err(fault) => return Err(fault),
            }
        }
    }

    /// Find the handler for an exception raised at `pc`.
    fn unwind(&mut self, pc: u32, thrown: Thrown) -> Result<u32, Raise> {
        let handler = self
            .body
            .regions
            .iter()
            .filter(|region| region.covers(pc))
            .find_map(|region| region.handlers.iter().find(|h| h.catch.matches(&thrown)));
        let Some(handler) = handler else {
            return Err(Raise::Throw(thrown));
        };
        let (start, end) = (handler.start, handler.end);
        self.stack.clear();
        self.stack.push(Value::Thrown(thrown.clone()));
        self.handling.retain(|h| h.start <= start && start < h.end);
        self.handling.push(Handling { start, end, thrown });
        Ok(start)
    }

    fn pop(&mut self, pc: u32) -> Result<Value, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow(pc))
    }

    fn target(&self, label: bp_ir::Label) -> Result<u32, ExecError> {
        self.body
            .target(label)
            .ok_or_else(|| missing_entry("label", label.raw()))
    }

    fn step(&mut self, op: &Op, pc: u32, frame: &mut Frame<'_>) -> Result<Step, Raise> {
        match op {
            Op::Nop => {}
            Op::LoadArg(index) => self.stack.push(Value::Arg(*index)),
            Op::LoadLocal(local) => {
                let value = self
                    .locals
                    .get(local.index())
                    .cloned()
                    .ok_or_else(|| missing_entry("local", local.raw()))?;
                self.stack.push(value);
            }
            Op::StoreLocal(local) => {
                let value = self.pop(pc)?;
                let slot = self
                    .locals
                    .get_mut(local.index())
                    .ok_or_else(|| missing_entry("local", local.raw()))?;
                *slot = value;
            }
            Op::LoadConst(c) => self.stack.push(Value::from(c)),
            Op::Pop => {
                self.pop(pc)?;
            }
            Op::Dup => {
                let top = self.stack.last().cloned().ok_or(ExecError::StackUnderflow(pc))?;
                self.stack.push(top);
            }
            Op::Add | Op::Sub => {
                let rhs = self.pop(pc)?;
                let lhs = self.pop(pc)?;
                self.stack.push(arithmetic(op, &lhs, &rhs)?);
            }
            Op::Call(m)
            | Op::CallInstance(m)
            | Op::NewObject(m)
            | Op::GetProperty(m)
            | Op::SetProperty(m) => self.call(op, *m, pc, frame)?,
            Op::Cast(ty) => {
                let value = self.pop(pc)?;
                let ok = match &value {
                    Value::Null => true,
                    Value::Object(obj) => ty.is_instance(&**obj),
                    Value::Arg(index) => frame.holds(*index, ty),
                    _ => false,
                };
                if !ok {
                    return Err(invalid_cast(ty.name(), value.kind().name()).into());
                }
                self.stack.push(value);
            }
            Op::Branch(label) => return Ok(Step::Jump(self.target(*label)?)),
            Op::BranchTrue(label) | Op::BranchFalse(label) => {
                let cond = truthy(&self.pop(pc)?);
                if cond == matches!(op, Op::BranchTrue(_)) {
                    return Ok(Step::Jump(self.target(*label)?));
                }
            }
            Op::BranchEq(label)
            | Op::BranchNe(label)
            | Op::BranchLt(label)
            | Op::BranchLe(label)
            | Op::BranchGt(label)
            | Op::BranchGe(label) => {
                let rhs = self.pop(pc)?;
                let lhs = self.pop(pc)?;
                if compare(op, &lhs, &rhs)? {
                    return Ok(Step::Jump(self.target(*label)?));
                }
            }
            Op::Leave(label) => {
                let target = self.target(*label)?;
                self.stack.clear();
                self.handling.retain(|h| h.start <= target && target < h.end);
                return Ok(Step::Jump(target));
            }
            Op::Throw => {
                return match self.pop(pc)? {
                    Value::Thrown(thrown) => Err(Raise::Throw(thrown)),
                    other => Err(type_mismatch("exception", other.kind().name()).into()),
                };
            }
            Op::Rethrow => {
                let active = self
                    .handling
                    .iter()
                    .rev()
                    .find(|h| h.start <= pc && pc < h.end)
                    .ok_or(ExecError::NothingToRethrow(pc))?;
                return Err(Raise::Throw(active.thrown.clone()));
            }
            Op::Ret => {
                let value = match self.body.signature.returns {
                    ReturnKind::Value => self.pop(pc)?,
                    ReturnKind::Void => Value::Unit,
                };
                return Ok(Step::Return(value));
            }
        }
        Ok(Step::Next)
    }

    fn call(
        &mut self,
        op: &Op,
        method: bp_ir::MethodId,
        pc: u32,
        frame: &mut Frame<'_>,
    ) -> Result<(), Raise> {
        let entry = self
            .body
            .methods
            .get(method.index())
            .ok_or_else(|| missing_entry("method", method.raw()))?;
        let count = entry.sig.pops() as usize;
        let Some(split) = self.stack.len().checked_sub(count) else {
            return Err(ExecError::StackUnderflow(pc).into());
        };
        let args: SmallVec<[Value; 4]> = self.stack.drain(split..).collect();
        if entry.sig.kind.has_receiver() && args.first().is_some_and(Value::is_null) {
            return Err(null_reference(op.mnemonic()).into());
        }
        let result = entry.body.call(frame, &args)?;
        if entry.sig.returns {
            self.stack.push(result);
        }
        Ok(())
    }
}

/// Branch condition: `false`, zero, null and unit are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::UInt(u) => *u != 0,
        Value::Null | Value::Unit => false,
        Value::Str(_) | Value::Arg(_) | Value::Thrown(_) | Value::Object(_) => true,
    }
}

fn arithmetic(op: &Op, lhs: &Value, rhs: &Value) -> Result<Value, ExecError> {
    let name = op.mnemonic();
    let (Some(a), Some(b)) = (lhs.as_wide_int(), rhs.as_wide_int()) else {
        let got = if lhs.as_wide_int().is_none() { lhs } else { rhs };
        return Err(type_mismatch("int", got.kind().name()));
    };
    let wide = match op {
        Op::Sub => a - b,
        _ => a + b,
    };
    // Unsigned operands stay unsigned; anything else is signed.
    if matches!((lhs, rhs), (Value::UInt(_), Value::UInt(_))) {
        u64::try_from(wide)
            .map(Value::UInt)
            .map_err(|_| integer_overflow(name))
    } else {
        i64::try_from(wide)
            .map(Value::Int)
            .map_err(|_| integer_overflow(name))
    }
}

fn compare(op: &Op, lhs: &Value, rhs: &Value) -> Result<bool, ExecError> {
    if matches!(op, Op::BranchEq(_) | Op::BranchNe(_)) {
        let equal = equals(lhs, rhs)?;
        return Ok(equal == matches!(op, Op::BranchEq(_)));
    }
    let (Some(a), Some(b)) = (lhs.as_wide_int(), rhs.as_wide_int()) else {
        let got = if lhs.as_wide_int().is_none() { lhs } else { rhs };
        return Err(type_mismatch("int", got.kind().name()));
    };
    let ordering = a.cmp(&b);
    Ok(match op {
        Op::BranchLt(_) => ordering == Ordering::Less,
        Op::BranchLe(_) => ordering != Ordering::Greater,
        Op::BranchGt(_) => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn equals(lhs: &Value, rhs: &Value) -> Result<bool, ExecError> {
    if let (Some(a), Some(b)) = (lhs.as_wide_int(), rhs.as_wide_int()) {
        return Ok(a == b);
    }
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Null, Value::Null) | (Value::Unit, Value::Unit) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Object(a), Value::Object(b)) => Ok(Arc::ptr_eq(a, b)),
        _ => Err(type_mismatch(lhs.kind().name(), rhs.kind().name())),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
