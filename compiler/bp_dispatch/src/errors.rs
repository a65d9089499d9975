use bp_ir::EmitError;

/// Failure to build a dispatch routine.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch routine generation failed: {0}")]
    Generator(#[from] EmitError),
}
