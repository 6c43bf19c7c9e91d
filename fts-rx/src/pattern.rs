//! `Pattern::compile`: parses a boolean/regex expression into a compiled
//! [`Pattern`] ready for matching.

use tracing::instrument;

use crate::boolean_tree::{self, BooleanNode};
use crate::char_stream::encode_utf16_with_offsets;
use crate::charset::CharSetPool;
use crate::dfa::{self, Dfa};
use crate::error::{Error, Result};
use crate::pmm;
use crate::query_parser;
use crate::regex_parser;
use crate::syntax_tree;

/// The shared multi-pattern matcher over every non-anchored-start literal
/// sub-pattern. Plain ASCII sub-patterns take the `aho-corasick` fast path —
/// ASCII code units and bytes coincide 1:1, so match offsets stay in code
/// units without any translation; anything outside ASCII falls back to the
/// UCS-2-aware hand-rolled automaton in [`pmm`].
pub(crate) enum MultiPatternMatcher {
    Ascii(aho_corasick::AhoCorasick),
    General(pmm::Automaton),
}

impl MultiPatternMatcher {
    fn build(patterns: &[Vec<u16>]) -> Result<MultiPatternMatcher> {
        if patterns.iter().all(|p| p.iter().all(|&u| u < 128)) {
            let ascii_patterns: Vec<Vec<u8>> = patterns
                .iter()
                .map(|p| p.iter().map(|&u| u as u8).collect())
                .collect();
            let ac = aho_corasick::AhoCorasick::new(ascii_patterns)
                .map_err(|_| Error::TooComplex("ascii multi-pattern automaton"))?;
            Ok(MultiPatternMatcher::Ascii(ac))
        } else {
            let mut builder = pmm::Builder::new();
            for p in patterns {
                builder.add(p);
            }
            Ok(MultiPatternMatcher::General(builder.try_build()?))
        }
    }

    pub(crate) fn scan(&self, text: &[u16]) -> Vec<pmm::Hit> {
        match self {
            MultiPatternMatcher::Ascii(ac) => {
                // Only reachable when every pattern is ASCII, but the
                // haystack may still contain non-ASCII code units; those
                // simply never match any pattern byte, which is correct.
                let bytes: Vec<u8> = text.iter().map(|&u| if u < 256 { u as u8 } else { 0xFF }).collect();
                ac.find_iter(&bytes)
                    .map(|m| pmm::Hit {
                        pattern_id: m.pattern().as_u32(),
                        start: m.start(),
                        end: m.end(),
                    })
                    .collect()
            }
            MultiPatternMatcher::General(automaton) => automaton.scan(text),
        }
    }
}

/// One compiled leaf of the boolean tree.
pub struct CompiledSubPattern {
    pub anchored_start: bool,
    pub anchored_end: bool,
    pub kind: SubPatternKind,
}

pub enum SubPatternKind {
    /// A plain string, matched either directly at position 0 (when
    /// head-anchored) or through the shared multi-pattern matcher.
    Literal(Vec<u16>),
    Regex(Dfa),
}

/// A compiled top-level expression: one boolean tree over a set of
/// sub-patterns. Immutable after [`Pattern::compile`]; freely shareable by
/// reference across concurrent matches.
pub struct Pattern {
    pub(crate) sub_patterns: Vec<CompiledSubPattern>,
    pub(crate) tree: BooleanNode,
    /// Multi-pattern matcher over every non-anchored-start literal
    /// sub-pattern; `None` when there are none.
    pub(crate) automaton: Option<MultiPatternMatcher>,
    /// Maps an automaton-local pattern id back to this `Pattern`'s
    /// sub-pattern id.
    pub(crate) automaton_ids: Vec<u32>,
}

impl Pattern {
    pub fn num_sub_patterns(&self) -> usize {
        self.sub_patterns.len()
    }

    /// Compiles a boolean/regex expression given as UCS-2 code units (spec
    /// §6 `compile`).
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn compile(text: &[u16]) -> Result<Pattern> {
        let parsed = query_parser::parse(text)?;
        let tree = boolean_tree::normalize(parsed.tree);
        let num_patterns = parsed.sub_patterns.len() as u32;
        if !tree.validate(num_patterns) {
            return Err(Error::Internal("boolean tree references unknown pattern id"));
        }

        let mut sub_patterns = Vec::with_capacity(parsed.sub_patterns.len());
        let mut automaton_texts = Vec::new();
        let mut automaton_ids = Vec::new();

        for (global_id, spec) in parsed.sub_patterns.iter().enumerate() {
            let kind = if spec.is_regex {
                let ast = regex_parser::parse(&spec.text)?;
                let mut pool = CharSetPool::new();
                let tree = syntax_tree::augment(&ast, &mut pool)?;
                let dfa = dfa::build(&tree, pool)?;
                SubPatternKind::Regex(dfa)
            } else {
                if !spec.anchored_start {
                    automaton_texts.push(spec.text.clone());
                    automaton_ids.push(global_id as u32);
                }
                SubPatternKind::Literal(spec.text.clone())
            };
            sub_patterns.push(CompiledSubPattern {
                anchored_start: spec.anchored_start,
                anchored_end: spec.anchored_end,
                kind,
            });
        }

        let automaton = if automaton_ids.is_empty() {
            None
        } else {
            Some(MultiPatternMatcher::build(&automaton_texts)?)
        };

        tracing::debug!(sub_patterns = sub_patterns.len(), "pattern compiled");

        Ok(Pattern {
            sub_patterns,
            tree,
            automaton,
            automaton_ids,
        })
    }

    /// Convenience entry point for `str` callers: transcodes to UCS-2,
    /// compiles, and returns a byte-offset translation table alongside the
    /// pattern so callers can convert [`crate::walk::Match`] spans (in code
    /// units) back to UTF-8 byte offsets.
    pub fn compile_str(text: &str) -> Result<(Pattern, Vec<usize>)> {
        let (units, offsets) = encode_utf16_with_offsets(text);
        let pattern = Pattern::compile(&units)?;
        Ok((pattern, offsets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16s(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn compiles_literal_or() {
        let pattern = Pattern::compile(&u16s("abc|def")).unwrap();
        assert_eq!(pattern.num_sub_patterns(), 2);
        assert!(pattern.automaton.is_some());
    }

    #[test]
    fn compiles_head_anchored_literal_without_automaton() {
        let pattern = Pattern::compile(&u16s("^hello")).unwrap();
        assert_eq!(pattern.num_sub_patterns(), 1);
        assert!(pattern.automaton.is_none());
        assert!(pattern.sub_patterns[0].anchored_start);
    }

    #[test]
    fn compiles_regex_subpattern() {
        let pattern = Pattern::compile(&u16s("a(b|c)+d")).unwrap();
        assert!(matches!(pattern.sub_patterns[0].kind, SubPatternKind::Regex(_)));
    }
}
