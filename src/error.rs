use std::io;

use thiserror::Error as ThisError;

/// Errors reported by aggregate function construction and state deserialization.
///
/// Row processing (`add`), `merge` and `result` never fail for a well-formed configuration.
#[derive(Debug, ThisError)]
pub enum UniqError {
    #[error("aggregate function requires at least one argument")]
    NoArguments,

    #[error("tuple argument must be the only argument, got {count} arguments")]
    TupleArgumentNotAlone { count: usize },

    #[error("tuple argument must have at least one element")]
    EmptyTuple,

    #[error("unknown aggregate function: {0}")]
    UnknownFunction(String),

    #[error("cannot read state: {0}")]
    Io(#[from] io::Error),

    #[error("varuint is longer than 10 bytes")]
    VarUIntOverflow,

    #[error("state holds {size} elements, at most {max} allowed")]
    TooLarge { size: u64, max: u64 },

    #[error("invalid skip degree: {0}")]
    InvalidSkipDegree(u8),

    #[error("hash {hash:#x} does not match skip degree {skip_degree}")]
    InvalidHash { hash: u32, skip_degree: u8 },

    #[error("invalid representation flag: {0}")]
    InvalidFlag(u8),

    #[error("state declares {expected} distinct elements but holds {actual}")]
    DuplicateKeys { expected: u64, actual: u64 },

    #[error("{0} unread bytes after state")]
    TrailingBytes(usize),

    #[error("invalid state kind: {0}")]
    InvalidKind(u8),
}
