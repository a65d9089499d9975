//! Design-by-contract checks around dispatched actions.

use std::fmt;
use std::sync::Arc;

use bp_ir::Thrown;

type Precondition = Arc<dyn Fn() -> bool + Send + Sync>;
type Postcondition = Arc<dyn Fn(&ContractExit<'_>) -> bool + Send + Sync>;

/// How the guarded action left the dispatcher.
#[derive(Clone, Copy, Debug)]
pub enum ContractExit<'a> {
    Returned,
    ThrewException(&'a Thrown),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionKind {
    Precondition,
    Postcondition,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConditionKind::Precondition => "precondition",
            ConditionKind::Postcondition => "postcondition",
        })
    }
}

/// A named condition that did not hold.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} `{name}` violated")]
pub struct ContractViolation {
    pub kind: ConditionKind,
    pub name: String,
}

/// Named pre- and postconditions, checked in declaration order.
#[derive(Clone, Default)]
pub struct Contract {
    preconditions: Vec<(String, Precondition)>,
    postconditions: Vec<(String, Postcondition)>,
}

impl Contract {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requires<F>(mut self, name: impl Into<String>, condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.preconditions.push((name.into(), Arc::new(condition)));
        self
    }

    /// Condition checked after the action, on return and on exceptions
    /// other than contract violations.
    #[must_use]
    pub fn ensures<F>(mut self, name: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&ContractExit<'_>) -> bool + Send + Sync + 'static,
    {
        self.postconditions.push((name.into(), Arc::new(condition)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.preconditions.is_empty() && self.postconditions.is_empty()
    }

    pub fn check_preconditions(&self) -> Result<(), ContractViolation> {
        for (name, condition) in &self.preconditions {
            if !condition() {
                return Err(violation(ConditionKind::Precondition, name));
            }
        }
        Ok(())
    }

    pub fn check_postconditions(&self, exit: &ContractExit<'_>) -> Result<(), ContractViolation> {
        for (name, condition) in &self.postconditions {
            if !condition(exit) {
                return Err(violation(ConditionKind::Postcondition, name));
            }
        }
        Ok(())
    }
}

#[cold]
fn violation(kind: ConditionKind, name: &str) -> ContractViolation {
    tracing::warn!(%kind, condition = name, "contract violated");
    ContractViolation {
        kind,
        name: name.to_owned(),
    }
}

fn names<C>(conditions: &[(String, C)]) -> Vec<&str> {
    conditions.iter().map(|(name, _)| name.as_str()).collect()
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("preconditions", &names(&self.preconditions))
            .field("postconditions", &names(&self.postconditions))
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
