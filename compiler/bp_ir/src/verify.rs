//! Stack-discipline verification.
//!
//! Abstract interpretation over the instruction stream: every reachable
//! instruction is assigned the operand-stack depth on entry, propagated along
//! fallthrough, branch and handler edges. The routine is rejected when
//!
//! - an instruction pops more values than the stack holds,
//! - two paths reach an instruction with different depths,
//! - a protected region is entered with a non-empty stack,
//! - a `ret` leaves anything besides the return value behind,
//! - control can run past the last instruction.
//!
//! The verifier works on [`RoutineShape`], a payload-free view of a routine,
//! so persisted units can be re-verified without their method bodies.

use crate::{EmitError, Label, ReturnKind};

/// How control leaves an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum Flow {
    Next,
    /// Unconditional branch.
    Jump(Label),
    /// Conditional branch: target or fallthrough.
    Branch(Label),
    /// Region exit; the target is entered with an empty stack.
    Leave(Label),
    Return,
    Throw,
    Rethrow,
}

/// Stack effect and control flow of one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub struct Effect {
    pub pops: u32,
    pub pushes: u32,
    pub flow: Flow,
}

/// Instruction ranges of a protected region and its handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionSpan {
    pub try_start: u32,
    pub try_end: u32,
    /// `(start, end)` of each handler body.
    pub handlers: Vec<(u32, u32)>,
}

/// Everything the verifier needs to know about a routine.
pub struct RoutineShape<'a> {
    pub effects: &'a [Effect],
    pub labels: &'a [Option<u32>],
    pub regions: &'a [RegionSpan],
    pub returns: ReturnKind,
}

/// Result of a successful verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackReport {
    /// Deepest operand stack reached on any path.
    pub max_depth: u32,
    /// Number of reachable instructions.
    pub reachable: usize,
}

/// Verify the stack discipline of a routine.
pub fn verify(shape: &RoutineShape<'_>) -> Result<StackReport, EmitError> {
    let mut depths: Vec<Option<u32>> = vec![None; shape.effects.len()];
    let mut work: Vec<u32> = Vec::new();
    let mut max_depth = 0;

    enter(&mut depths, &mut work, 0, 0)?;
    for region in shape.regions {
        for &(start, _) in &region.handlers {
            // The caught exception is the only value on a handler's stack.
            enter(&mut depths, &mut work, start, 1)?;
            max_depth = max_depth.max(1);
        }
    }

    let resolve = |label: Label| {
        shape
            .labels
            .get(label.index())
            .copied()
            .flatten()
            .ok_or(EmitError::UnmarkedLabel(label.raw()))
    };

    while let Some(pc) = work.pop() {
        let Some(depth) = depths[pc as usize] else {
            continue;
        };

        if depth != 0 && shape.regions.iter().any(|r| r.try_start == pc) {
            return Err(EmitError::NonEmptyStackAtTry { pc, depth });
        }

        let effect = shape.effects[pc as usize];
        if depth < effect.pops {
            return Err(EmitError::StackUnderflow {
                pc,
                needed: effect.pops,
                depth,
            });
        }
        let after = depth - effect.pops + effect.pushes;
        max_depth = max_depth.max(after);

        match effect.flow {
            Flow::Next => enter(&mut depths, &mut work, pc + 1, after)?,
            Flow::Jump(label) => enter(&mut depths, &mut work, resolve(label)?, after)?,
            Flow::Branch(label) => {
                enter(&mut depths, &mut work, resolve(label)?, after)?;
                enter(&mut depths, &mut work, pc + 1, after)?;
            }
            Flow::Leave(label) => enter(&mut depths, &mut work, resolve(label)?, 0)?,
            Flow::Return => {
                if after != 0 {
                    return Err(EmitError::UnbalancedReturn {
                        pc,
                        depth,
                        expected: shape.returns.arity(),
                    });
                }
            }
            Flow::Throw => {}
            Flow::Rethrow => {
                let in_handler = shape.regions.iter().any(|r| {
                    r.handlers
                        .iter()
                        .any(|&(start, end)| start <= pc && pc < end)
                });
                if !in_handler {
                    return Err(EmitError::RethrowOutsideHandler { pc });
                }
            }
        }
    }

    Ok(StackReport {
        max_depth,
        reachable: depths.iter().filter(|d| d.is_some()).count(),
    })
}

fn enter(
    depths: &mut [Option<u32>],
    work: &mut Vec<u32>,
    pc: u32,
    depth: u32,
) -> Result<(), EmitError> {
    let slot = depths.get_mut(pc as usize).ok_or(EmitError::FallsOffEnd)?;
    match *slot {
        Some(expected) if expected != depth => Err(EmitError::InconsistentDepth {
            pc,
            expected,
            found: depth,
        }),
        Some(_) => Ok(()),
        None => {
            *slot = Some(depth);
            work.push(pc);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
