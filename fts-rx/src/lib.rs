//! Extended regex engine, multi-pattern matcher, and boolean combinator
//! (`m.rx`).
//!
//! The public surface is deliberately small: [`Pattern::compile`] builds a
//! [`Pattern`] from a boolean/regex expression, and [`step`]/[`advance`]/
//! [`walk`] run it against a text. Everything else (DFA tables, the
//! multi-pattern automaton, the syntax tree) is compiler-internal machinery
//! module-private behind these entry points.

pub mod boolean_tree;
pub mod char_stream;
pub mod charset;
pub mod dfa;
pub mod error;
pub mod pattern;
pub mod pmm;
pub mod query_parser;
pub mod regex_parser;
pub mod syntax_tree;
pub mod walk;

pub use dfa::Mode;
pub use error::{Error, Result};
pub use pattern::Pattern;
pub use walk::{advance, step, walk, Match, MatchOptions};
