use thiserror::Error;

use crate::types::Type;

/// Every reportable failure in the pipeline. Type errors halt compilation
/// before lowering; `Verify` and `Jit` are surfaced by the JIT driver so a
/// miscompiled module is observable rather than fatal. Internal invariant
/// violations (unknown locals, malformed calls) are compiler bugs and panic
/// at the offending site instead of appearing here.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },
    #[error("unbound variable {0}")]
    UnboundVariable(String),
    #[error("cannot apply a value of non-function type {0}")]
    NotAFunction(Type),
    #[error("fix must be annotated with a function type, found {0}")]
    FixOnNonFunction(Type),
    #[error("program has no main binding")]
    MissingMain,
    #[error("main must have type Int -> ... -> Int, found {0}")]
    MainNotFirstOrderInt(Type),
    #[error("LLVM verification failed: {0}")]
    Verify(String),
    #[error("JIT execution engine error: {0}")]
    Jit(String),
}
