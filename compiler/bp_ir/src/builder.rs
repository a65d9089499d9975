//! Instruction emitter.
//!
//! [`RoutineBuilder`] owns an in-progress routine: its instruction stream,
//! label table, locals, method table and exception table. Compilers drive it
//! through typed methods and never construct [`Op`] values themselves.
//!
//! # Error handling
//!
//! Emission methods are infallible. The first misuse (unknown label, label
//! marked twice, wrong method kind, ...) is recorded and reported by
//! [`finish`](RoutineBuilder::finish), so compiler code reads as a straight
//! sequence of instructions. Stack discipline is checked separately by
//! [`RoutineBody::verify`].
//!
//! # Stack tracking
//!
//! The builder keeps a running operand-stack depth (`None` after an
//! unconditional transfer until the next label is marked). It is used to
//! decide whether structured helpers must append a closing `leave`, and is
//! exposed through [`current_depth`](RoutineBuilder::current_depth) for
//! callers that want to assert on it.

use smallvec::SmallVec;

use crate::verify::{verify, Effect, Flow, RegionSpan, RoutineShape, StackReport};
use crate::{
    CatchHandler, Const, EmitError, ExceptionType, Label, Listing, Local, Method, MethodId,
    MethodKind, MethodSig, ObjectType, Op, Signature, TryRegion, ValueKind,
};

/// Writer for one catch block of [`RoutineBuilder::try_catch`].
///
/// Runs with the caught exception as the only value on the stack.
pub type CatchWriter<'w, M> = Box<dyn FnOnce(&mut RoutineBuilder<M>) + 'w>;

#[derive(Clone, Copy, Debug, Default)]
struct LabelState {
    pc: Option<u32>,
    /// Stack depth expected at the label, learned from the first branch.
    depth: Option<u32>,
    referenced: bool,
}

struct OpenRegion {
    try_start: u32,
    try_end: Option<u32>,
    handlers: SmallVec<[CatchHandler; 2]>,
    current: Option<(ExceptionType, u32)>,
    exit: Label,
}

/// Builder for an in-progress routine.
///
/// Consumed by [`finish`](RoutineBuilder::finish) to produce a
/// [`RoutineBody`].
pub struct RoutineBuilder<M> {
    name: String,
    signature: Signature,
    ops: Vec<Op>,
    labels: Vec<LabelState>,
    locals: Vec<ValueKind>,
    methods: Vec<Method<M>>,
    regions: Vec<TryRegion>,
    open: Vec<OpenRegion>,
    depth: Option<u32>,
    error: Option<EmitError>,
}

impl<M> RoutineBuilder<M> {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        RoutineBuilder {
            name: name.into(),
            signature,
            ops: Vec::new(),
            labels: Vec::new(),
            locals: Vec::new(),
            methods: Vec::new(),
            regions: Vec::new(),
            open: Vec::new(),
            depth: Some(0),
            error: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Index the next instruction will occupy.
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "routine length never exceeds u32"
    )]
    pub fn pc(&self) -> u32 {
        self.ops.len() as u32
    }

    /// Running operand-stack depth, `None` when the current position is
    /// unreachable.
    #[inline]
    pub fn current_depth(&self) -> Option<u32> {
        self.depth
    }

    #[inline]
    pub fn is_reachable(&self) -> bool {
        self.depth.is_some()
    }

    fn fail(&mut self, error: EmitError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    // ── Declarations ────────────────────────────────────────────

    #[expect(
        clippy::cast_possible_truncation,
        reason = "local count never exceeds u32"
    )]
    pub fn declare_local(&mut self, kind: ValueKind) -> Local {
        let local = Local::new(self.locals.len() as u32);
        self.locals.push(kind);
        local
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "method table never exceeds u32 entries"
    )]
    pub fn declare_method(&mut self, sig: MethodSig, body: M) -> MethodId {
        let id = MethodId::new(self.methods.len() as u32);
        self.methods.push(Method { sig, body });
        id
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "label count never exceeds u32"
    )]
    pub fn define_label(&mut self) -> Label {
        let label = Label::new(self.labels.len() as u32);
        self.labels.push(LabelState::default());
        label
    }

    /// Bind `label` to the next instruction.
    pub fn mark_label(&mut self, label: Label) {
        let pc = self.pc();
        let Some(state) = self.labels.get_mut(label.index()) else {
            self.fail(EmitError::UnknownLabel(label.raw()));
            return;
        };
        if state.pc.is_some() {
            self.fail(EmitError::LabelMarkedTwice(label.raw()));
            return;
        }
        state.pc = Some(pc);
        let learned = state.depth;
        self.depth = Some(self.depth.or(learned).unwrap_or(0));
    }

    // ── Raw emission ────────────────────────────────────────────

    fn emit(&mut self, op: Op, pops: u32, pushes: u32) {
        self.depth = self.depth.map(|d| d.saturating_sub(pops) + pushes);
        self.ops.push(op);
    }

    fn emit_transfer(&mut self, op: Op, pops: u32, label: Label, conditional: bool) {
        let is_leave = matches!(op, Op::Leave(_));
        let after = self.depth.map(|d| d.saturating_sub(pops));
        let Some(state) = self.labels.get_mut(label.index()) else {
            self.fail(EmitError::UnknownLabel(label.raw()));
            return;
        };
        state.referenced = true;
        if state.depth.is_none() {
            state.depth = if is_leave { Some(0) } else { after };
        }
        self.ops.push(op);
        self.depth = if conditional { after } else { None };
    }

    fn emit_call(&mut self, op: Op, method: MethodId, expected: MethodKind) {
        let Some(entry) = self.methods.get(method.index()) else {
            self.fail(EmitError::UnknownMethod(method.raw()));
            return;
        };
        if entry.sig.kind != expected {
            let error = EmitError::MethodKindMismatch {
                op: op.mnemonic(),
                method: entry.sig.name.clone(),
                kind: entry.sig.kind,
            };
            self.fail(error);
            return;
        }
        let (pops, pushes) = (entry.sig.pops(), entry.sig.pushes());
        self.emit(op, pops, pushes);
    }

    // ── Loads and stores ────────────────────────────────────────

    pub fn load_arg(&mut self, index: u16) {
        let count = self.signature.params.len();
        if usize::from(index) >= count {
            self.fail(EmitError::UnknownArgument { index, count });
            return;
        }
        self.emit(Op::LoadArg(index), 0, 1);
    }

    pub fn load_local(&mut self, local: Local) {
        if local.index() >= self.locals.len() {
            self.fail(EmitError::UnknownLocal(local.raw()));
            return;
        }
        self.emit(Op::LoadLocal(local), 0, 1);
    }

    pub fn store_local(&mut self, local: Local) {
        if local.index() >= self.locals.len() {
            self.fail(EmitError::UnknownLocal(local.raw()));
            return;
        }
        self.emit(Op::StoreLocal(local), 1, 0);
    }

    pub fn load_const(&mut self, value: Const) {
        self.emit(Op::LoadConst(value), 0, 1);
    }

    pub fn load_null(&mut self) {
        self.load_const(Const::Null);
    }

    pub fn load_bool(&mut self, value: bool) {
        self.load_const(Const::Bool(value));
    }

    pub fn load_int(&mut self, value: i64) {
        self.load_const(Const::Int(value));
    }

    pub fn load_uint(&mut self, value: u64) {
        self.load_const(Const::UInt(value));
    }

    pub fn load_str(&mut self, value: &str) {
        self.load_const(Const::Str(value.into()));
    }

    pub fn pop(&mut self) {
        self.emit(Op::Pop, 1, 0);
    }

    pub fn dup(&mut self) {
        self.emit(Op::Dup, 1, 2);
    }

    pub fn add(&mut self) {
        self.emit(Op::Add, 2, 1);
    }

    pub fn sub(&mut self) {
        self.emit(Op::Sub, 2, 1);
    }

    // ── Calls and objects ───────────────────────────────────────

    pub fn call(&mut self, method: MethodId) {
        self.emit_call(Op::Call(method), method, MethodKind::Static);
    }

    pub fn call_instance(&mut self, method: MethodId) {
        self.emit_call(Op::CallInstance(method), method, MethodKind::Instance);
    }

    pub fn new_object(&mut self, method: MethodId) {
        self.emit_call(Op::NewObject(method), method, MethodKind::Constructor);
    }

    pub fn get_property(&mut self, method: MethodId) {
        self.emit_call(Op::GetProperty(method), method, MethodKind::Getter);
    }

    pub fn set_property(&mut self, method: MethodId) {
        self.emit_call(Op::SetProperty(method), method, MethodKind::Setter);
    }

    pub fn cast(&mut self, ty: ObjectType) {
        self.emit(Op::Cast(ty), 1, 1);
    }

    // ── Control flow ────────────────────────────────────────────

    pub fn branch(&mut self, label: Label) {
        self.emit_transfer(Op::Branch(label), 0, label, false);
    }

    pub fn branch_if_true(&mut self, label: Label) {
        self.emit_transfer(Op::BranchTrue(label), 1, label, true);
    }

    pub fn branch_if_false(&mut self, label: Label) {
        self.emit_transfer(Op::BranchFalse(label), 1, label, true);
    }

    /// Exit the enclosing protected region or handler, emptying the stack.
    pub fn leave(&mut self, label: Label) {
        self.emit_transfer(Op::Leave(label), 0, label, false);
    }

    pub fn ret(&mut self) {
        let pops = self.signature.returns.arity();
        self.emit(Op::Ret, pops, 0);
        self.depth = None;
    }

    pub fn throw(&mut self) {
        self.emit(Op::Throw, 1, 0);
        self.depth = None;
    }

    pub fn rethrow(&mut self) {
        self.emit(Op::Rethrow, 0, 0);
        self.depth = None;
    }

    // ── Structured conditionals ─────────────────────────────────
    //
    // Each helper consumes its operands, falls through into the "then" code
    // when the condition holds and returns the label the caller must mark
    // where the "else/after" code begins.

    /// Pops a condition; continues when it is true.
    pub fn if_true(&mut self) -> Label {
        let label = self.define_label();
        self.emit_transfer(Op::BranchFalse(label), 1, label, true);
        label
    }

    /// Pops a condition; continues when it is false.
    pub fn if_false(&mut self) -> Label {
        let label = self.define_label();
        self.emit_transfer(Op::BranchTrue(label), 1, label, true);
        label
    }

    /// Pops `a, b`; continues when `a == b`.
    pub fn if_equal(&mut self) -> Label {
        let label = self.define_label();
        self.emit_transfer(Op::BranchNe(label), 2, label, true);
        label
    }

    /// Pops `a, b`; continues when `a < b`.
    pub fn if_less_than(&mut self) -> Label {
        let label = self.define_label();
        self.emit_transfer(Op::BranchGe(label), 2, label, true);
        label
    }

    /// Pops `a, b`; continues when `a > b`.
    pub fn if_greater_than(&mut self) -> Label {
        let label = self.define_label();
        self.emit_transfer(Op::BranchLe(label), 2, label, true);
        label
    }

    // ── Protected regions ───────────────────────────────────────

    /// Open a protected region. Returns its exit label, which is marked
    /// automatically by [`end_try`](Self::end_try).
    pub fn begin_try(&mut self) -> Label {
        let exit = self.define_label();
        self.open.push(OpenRegion {
            try_start: self.pc(),
            try_end: None,
            handlers: SmallVec::new(),
            current: None,
            exit,
        });
        exit
    }

    /// Close the preceding block of the innermost region and start a catch
    /// block for `catch`. The caught exception is on the stack.
    pub fn begin_catch(&mut self, catch: ExceptionType) {
        let Some(exit) = self.open.last().map(|r| r.exit) else {
            self.fail(EmitError::CatchOutsideTry);
            return;
        };
        if self.is_reachable() {
            self.leave(exit);
        }
        let pc = self.pc();
        if let Some(region) = self.open.last_mut() {
            region.try_end.get_or_insert(pc);
            if let Some((ty, start)) = region.current.take() {
                region.handlers.push(CatchHandler {
                    catch: ty,
                    start,
                    end: pc,
                });
            }
            region.current = Some((catch, pc));
        }
        self.depth = Some(1);
    }

    /// Close the innermost region and mark its exit label.
    pub fn end_try(&mut self) {
        let Some(exit) = self.open.last().map(|r| r.exit) else {
            self.fail(EmitError::EndWithoutTry);
            return;
        };
        if self.is_reachable() {
            self.leave(exit);
        }
        let pc = self.pc();
        if let Some(mut region) = self.open.pop() {
            if let Some((ty, start)) = region.current.take() {
                region.handlers.push(CatchHandler {
                    catch: ty,
                    start,
                    end: pc,
                });
            }
            self.regions.push(TryRegion {
                try_start: region.try_start,
                try_end: region.try_end.unwrap_or(pc),
                handlers: region.handlers,
            });
        }
        self.mark_label(exit);
    }

    /// Emit a protected region around `body` with one catch block per entry
    /// of `catches`, in order. Blocks that fall through leave to the exit
    /// label, which is returned already marked. With no catch blocks the
    /// body is still framed by the exit label.
    pub fn try_catch<'w>(
        &mut self,
        body: impl FnOnce(&mut Self),
        catches: Vec<(ExceptionType, CatchWriter<'w, M>)>,
    ) -> Label {
        let exit = self.begin_try();
        body(self);
        for (catch, write) in catches {
            self.begin_catch(catch);
            write(self);
        }
        self.end_try();
        exit
    }

    // ── Finalization ────────────────────────────────────────────

    /// Consume the builder and produce the finished routine body.
    pub fn finish(self) -> Result<RoutineBody<M>, EmitError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.open.is_empty() {
            return Err(EmitError::UnclosedRegion(self.open.len()));
        }
        let mut labels = Vec::with_capacity(self.labels.len());
        for (index, state) in self.labels.iter().enumerate() {
            if state.referenced && state.pc.is_none() {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "label count never exceeds u32"
                )]
                return Err(EmitError::UnmarkedLabel(index as u32));
            }
            labels.push(state.pc);
        }
        Ok(RoutineBody {
            name: self.name,
            signature: self.signature,
            ops: self.ops,
            labels,
            locals: self.locals,
            methods: self.methods,
            regions: self.regions,
        })
    }
}

/// A finished routine: instructions, resolved labels, locals, method table
/// and exception table. Immutable once produced.
#[derive(Clone, Debug)]
pub struct RoutineBody<M> {
    pub name: String,
    pub signature: Signature,
    pub ops: Vec<Op>,
    /// Instruction index of every label, `None` for unused labels.
    pub labels: Vec<Option<u32>>,
    pub locals: Vec<ValueKind>,
    pub methods: Vec<Method<M>>,
    pub regions: Vec<TryRegion>,
}

impl<M> RoutineBody<M> {
    /// Instruction index `label` is bound to.
    #[inline]
    pub fn target(&self, label: Label) -> Option<u32> {
        self.labels.get(label.index()).copied().flatten()
    }

    pub fn method_sig(&self, method: MethodId) -> Option<&MethodSig> {
        self.methods.get(method.index()).map(|m| &m.sig)
    }

    /// Stack effect and control flow of `op` within this routine.
    pub fn effect(&self, op: &Op) -> Result<Effect, EmitError> {
        let fixed = |pops, pushes| Effect {
            pops,
            pushes,
            flow: Flow::Next,
        };
        let effect = match *op {
            Op::Nop => fixed(0, 0),
            Op::LoadArg(_) | Op::LoadLocal(_) | Op::LoadConst(_) => fixed(0, 1),
            Op::StoreLocal(_) | Op::Pop => fixed(1, 0),
            Op::Dup => fixed(1, 2),
            Op::Add | Op::Sub => fixed(2, 1),
            Op::Cast(_) => fixed(1, 1),
            Op::Call(m)
            | Op::CallInstance(m)
            | Op::NewObject(m)
            | Op::GetProperty(m)
            | Op::SetProperty(m) => {
                let sig = self
                    .method_sig(m)
                    .ok_or(EmitError::UnknownMethod(m.raw()))?;
                fixed(sig.pops(), sig.pushes())
            }
            Op::Branch(l) => Effect {
                pops: 0,
                pushes: 0,
                flow: Flow::Jump(l),
            },
            Op::BranchTrue(l) | Op::BranchFalse(l) => Effect {
                pops: 1,
                pushes: 0,
                flow: Flow::Branch(l),
            },
            Op::BranchEq(l)
            | Op::BranchNe(l)
            | Op::BranchLt(l)
            | Op::BranchLe(l)
            | Op::BranchGt(l)
            | Op::BranchGe(l) => Effect {
                pops: 2,
                pushes: 0,
                flow: Flow::Branch(l),
            },
            Op::Leave(l) => Effect {
                pops: 0,
                pushes: 0,
                flow: Flow::Leave(l),
            },
            Op::Throw => Effect {
                pops: 1,
                pushes: 0,
                flow: Flow::Throw,
            },
            Op::Rethrow => Effect {
                pops: 0,
                pushes: 0,
                flow: Flow::Rethrow,
            },
            Op::Ret => Effect {
                pops: self.signature.returns.arity(),
                pushes: 0,
                flow: Flow::Return,
            },
        };
        Ok(effect)
    }

    pub fn effects(&self) -> Result<Vec<Effect>, EmitError> {
        self.ops.iter().map(|op| self.effect(op)).collect()
    }

    /// Instruction ranges of every protected region.
    pub fn spans(&self) -> Vec<RegionSpan> {
        self.regions
            .iter()
            .map(|r| RegionSpan {
                try_start: r.try_start,
                try_end: r.try_end,
                handlers: r.handlers.iter().map(|h| (h.start, h.end)).collect(),
            })
            .collect()
    }

    /// Verify stack discipline; see [`verify`](crate::verify).
    pub fn verify(&self) -> Result<StackReport, EmitError> {
        let effects = self.effects()?;
        let spans = self.spans();
        verify(&RoutineShape {
            effects: &effects,
            labels: &self.labels,
            regions: &spans,
            returns: self.signature.returns,
        })
    }

    /// Human-readable disassembly.
    pub fn listing(&self) -> Listing {
        Listing::of(self)
    }

    /// Serializable image for persisted units.
    #[cfg(feature = "persist")]
    pub fn image(&self) -> Result<crate::UnitImage, EmitError> {
        crate::UnitImage::of(self)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
