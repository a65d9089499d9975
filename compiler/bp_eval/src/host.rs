//! Host methods: the closures a routine's method table points at.

use std::fmt;
use std::sync::Arc;

use bp_ir::Value;

use crate::{Frame, Raise};

type HostFn = dyn Fn(&mut Frame<'_>, &[Value]) -> Result<Value, Raise> + Send + Sync;

/// A callable method-table entry.
///
/// Receives the invocation frame and its operands in push order (receiver
/// first for instance calls). Methods declared as returning nothing should
/// return [`Value::Unit`]; the result is discarded.
#[derive(Clone)]
pub struct HostMethod(Arc<HostFn>);

impl HostMethod {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, &[Value]) -> Result<Value, Raise> + Send + Sync + 'static,
    {
        HostMethod(Arc::new(f))
    }

    #[inline]
    pub fn call(&self, frame: &mut Frame<'_>, args: &[Value]) -> Result<Value, Raise> {
        (self.0)(frame, args)
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostMethod")
    }
}
