//! Textual disassembly of finished routines.
//!
//! ```text
//! .routine validate.Account (Account) -> value
//! .locals
//!     V0 object
//! .methods
//!     #0 instance text.StringLength/0 -> value
//! .code
//!     IL_0000  ldarg     0
//!     IL_0001  callvirt  #0 text.StringLength
//! L0:
//!     IL_0002  ret
//! .exceptions
//!     try IL_0003..IL_0007 catch ArgumentError IL_0007..IL_000c
//! ```

use std::fmt::{self, Write};

use crate::{MethodKind, Op, ReturnKind, RoutineBody};

/// Rendered disassembly of a routine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing(String);

impl Listing {
    pub fn of<M>(body: &RoutineBody<M>) -> Self {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = render(body, &mut out);
        Listing(out)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn kind_name(kind: MethodKind) -> &'static str {
    match kind {
        MethodKind::Static => "static",
        MethodKind::Instance => "instance",
        MethodKind::Constructor => "ctor",
        MethodKind::Getter => "get",
        MethodKind::Setter => "set",
    }
}

fn render<M>(body: &RoutineBody<M>, out: &mut String) -> fmt::Result {
    let params: Vec<&str> = body.signature.params.iter().map(|p| p.describe()).collect();
    let returns = match body.signature.returns {
        ReturnKind::Void => "void",
        ReturnKind::Value => "value",
    };
    writeln!(out, ".routine {} ({}) -> {returns}", body.name, params.join(", "))?;

    if !body.locals.is_empty() {
        writeln!(out, ".locals")?;
        for (i, kind) in body.locals.iter().enumerate() {
            writeln!(out, "    V{i} {}", kind.name())?;
        }
    }

    if !body.methods.is_empty() {
        writeln!(out, ".methods")?;
        for (i, method) in body.methods.iter().enumerate() {
            let sig = &method.sig;
            let ret = if sig.returns { "value" } else { "void" };
            writeln!(
                out,
                "    #{i} {} {}/{} -> {ret}",
                kind_name(sig.kind),
                sig.name,
                sig.arity
            )?;
        }
    }

    writeln!(out, ".code")?;
    for (pc, op) in body.ops.iter().enumerate() {
        for (label, _) in body
            .labels
            .iter()
            .enumerate()
            .filter(|(_, at)| **at == Some(pc as u32))
        {
            writeln!(out, "L{label}:")?;
        }
        write!(out, "    IL_{pc:04x}  {:<10}", op.mnemonic())?;
        render_operand(body, op, out)?;
        // Trim padding on operand-less instructions.
        let trimmed = out.trim_end_matches(' ').len();
        out.truncate(trimmed);
        out.push('\n');
    }
    // Labels bound past the last instruction (exit labels of trailing regions).
    let end = body.ops.len() as u32;
    for (label, _) in body
        .labels
        .iter()
        .enumerate()
        .filter(|(_, at)| **at == Some(end))
    {
        writeln!(out, "L{label}:")?;
    }

    if !body.regions.is_empty() {
        writeln!(out, ".exceptions")?;
        for region in &body.regions {
            write!(
                out,
                "    try IL_{:04x}..IL_{:04x}",
                region.try_start, region.try_end
            )?;
            for handler in &region.handlers {
                write!(
                    out,
                    " catch {} IL_{:04x}..IL_{:04x}",
                    handler.catch.name(),
                    handler.start,
                    handler.end
                )?;
            }
            out.push('\n');
        }
    }
    Ok(())
}

fn render_operand<M>(body: &RoutineBody<M>, op: &Op, out: &mut String) -> fmt::Result {
    match op {
        Op::LoadArg(n) => write!(out, "{n}"),
        Op::LoadLocal(l) | Op::StoreLocal(l) => write!(out, "V{}", l.raw()),
        Op::LoadConst(c) => write!(out, "{c}"),
        Op::Cast(ty) => write!(out, "{}", ty.name()),
        Op::Call(m)
        | Op::CallInstance(m)
        | Op::NewObject(m)
        | Op::GetProperty(m)
        | Op::SetProperty(m) => match body.method_sig(*m) {
            Some(sig) => write!(out, "#{} {}", m.raw(), sig.name),
            None => write!(out, "#{} <unknown>", m.raw()),
        },
        _ => match op.target() {
            Some(label) => write!(out, "L{}", label.raw()),
            None => Ok(()),
        },
    }
}

/// One instruction rendered as `mnemonic operand`.
pub(crate) fn instruction_text<M>(body: &RoutineBody<M>, op: &Op) -> String {
    let mut out = String::from(op.mnemonic());
    let len = out.len();
    out.push(' ');
    let _ = render_operand(body, op, &mut out);
    if out.len() == len + 1 {
        out.truncate(len);
    }
    out
}
