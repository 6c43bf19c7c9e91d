//! Error kinds for the inverted-index ranking core.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("query too complex: {0}")]
    TooComplex(&'static str),

    #[error("out of memory")]
    Memory,

    #[error("invalid handle")]
    InvalidHandle,

    /// Unknown score-calculator name in a descriptor string.
    #[error("invalid calculator: {0}")]
    InvalidCalculator(String),

    /// Malformed score-calculator parameter string, e.g. a non-numeric
    /// field in `"OkapiTfIdf:0.2:1:1"`.
    #[error("invalid calculator parameter: {0}")]
    InvalidCalculatorParameter(String),

    /// The external buffer pool is under memory pressure; pages were
    /// discarded and the caller may retry once.
    #[error("memory exhausted, pages discarded")]
    MemoryExhaust,

    /// The caller's `is_cancel()` predicate returned true mid-search.
    #[error("search cancelled")]
    Cancelled,

    /// An internal invariant was violated (e.g. a docID with the high bit
    /// set reaching a path that assumes a real document).
    #[error("internal invariant violation: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
