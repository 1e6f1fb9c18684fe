use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("unexpected character(s) {found:?} at line {line}")]
    Lex { found: String, line: u32 },

    #[error("unexpected token {token} ({value}) on line {line}")]
    Parse {
        token: String,
        value: String,
        line: u32,
    },

    #[error("unknown function '{0}' (register it with register_scalar_fn or register_aggregate_fn)")]
    UnknownFunction(String),

    #[error("unknown return type '{0}' (register it with register_return_type)")]
    UnknownReturnType(String),

    #[error("invalid clause: {0}")]
    InvalidClause(String),

    #[error("{0} is neither in GROUP BY nor an aggregate function")]
    UngroupedProjection(String),

    #[error("cannot use aggregate function {0} without GROUP BY")]
    AggregateWithoutGroup(String),

    #[error("record has no attribute '{0}'")]
    MissingAttribute(String),

    #[error("record has no key {0}")]
    MissingKey(String),

    #[error("record does not support {0} lookup")]
    UnsupportedLookup(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("return shape mismatch: {0}")]
    ReturningShapeMismatch(String),

    #[error("no rows in result")]
    EmptyResult,

    #[error("more than one row in result")]
    AmbiguousResult,
}
