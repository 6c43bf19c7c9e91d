//! Error kinds for the `m.rx` engine.
//!
//! Every fallible operation in this crate returns [`Result<T>`]; there is no
//! process-wide error code.

/// The error type returned by [`crate::pattern::Pattern::compile`] and by the
/// match loop in [`crate::walk`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unbalanced brackets/groups, operator misuse, or an empty operand.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// A DFA or matcher construction cap was exceeded (state count, char-set
    /// table size, or multi-pattern automaton state count).
    #[error("pattern too complex: {0}")]
    TooComplex(&'static str),

    /// An internal invariant was violated (e.g. a leaf pattern-id out of
    /// range). Debug builds `debug_assert!` instead of returning this.
    #[error("internal invariant violation: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
