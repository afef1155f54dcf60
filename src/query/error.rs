use thiserror::Error;

/// Failure turning clause text into an [`Expression`](super::Expression).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Grammar element or operator outside the supported subset.
    #[error("unsupported construct in filter: {0}")]
    UnsupportedConstruct(String),

    /// Unterminated quoting or an invalid numeric token.
    #[error("malformed literal in filter: {0}")]
    MalformedLiteral(String),

    /// The SQL grammar parser rejected the clause.
    #[error("failed to parse filter: {0}")]
    Parse(String),
}

/// Failure evaluating a compiled expression against one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}
