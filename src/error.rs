//! Error types for graph evaluation and fold partitioning.

use thiserror::Error;

/// Main error type for graph operations.
///
/// Structural problems in a graph handed to the fold pass (a reordered
/// input, a forward argument reference) are deliberately *not* errors:
/// the pass degrades to "no split performed" instead. Errors here are
/// either evaluation failures or internal-consistency faults.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A `GetAttr` path did not resolve in the attribute store.
    #[error("attribute not found: {0}")]
    MissingAttr(String),

    /// The caller supplied the wrong number of runtime inputs.
    #[error("expected {expected} runtime inputs, got {got}")]
    InputArity { expected: usize, got: usize },

    /// Operand shapes are incompatible for an operation.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An operation was applied to an unsupported arity or operand kind.
    #[error("unsupported operation: {0}")]
    UnsupportedOp(String),

    /// Internal-consistency fault, e.g. a dangling node reference after
    /// rewiring. Indicates a bug in a graph transformation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
