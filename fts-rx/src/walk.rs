//! `step`/`advance`/`walk` match loop.

use bon::bon;
use tracing::instrument;

use crate::boolean_tree::Bitset;
use crate::dfa::Mode;
use crate::pattern::{Pattern, SubPatternKind};
use crate::pmm::Hit;

/// One reported match: `start`/`end` in code units, the sub-pattern that
/// produced it (meaningful for [`walk`]), and capture-group spans 1..9.
#[derive(Debug, Clone)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub pattern_id: u32,
    pub groups: [Option<(usize, usize)>; 9],
}

/// Execution mode flags.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub mode: Mode,
    /// Prevents the same empty match at the same position from re-matching
    /// during [`walk`].
    pub skip_empty: bool,
}

#[bon]
impl MatchOptions {
    #[builder]
    pub fn new(#[builder(default = Mode::Longest)] mode: Mode, #[builder(default = false)] skip_empty: bool) -> Self {
        Self { mode, skip_empty }
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            mode: Mode::Longest,
            skip_empty: false,
        }
    }
}

/// Finds the first region of `text` satisfying the whole boolean tree.
#[instrument(skip(pattern, text), fields(text_len = text.len()))]
pub fn step(pattern: &Pattern, text: &[u16], opts: MatchOptions) -> Option<Match> {
    find_first(pattern, text, opts, 0)
}

/// Same as [`step`] but anchored at `text[0]`.
#[instrument(skip(pattern, text), fields(text_len = text.len()))]
pub fn advance(pattern: &Pattern, text: &[u16], opts: MatchOptions) -> Option<Match> {
    let candidates = collect_hits(pattern, text, opts);
    resolve(pattern, &candidates, &|h: &Candidate| h.start == 0)
}

/// Finds every occurrence of every sub-pattern, tagged by pattern-id, used
/// for highlighting.
#[instrument(skip(pattern, text), fields(text_len = text.len()))]
pub fn walk(pattern: &Pattern, text: &[u16], opts: MatchOptions) -> Vec<Match> {
    let mut candidates = collect_hits(pattern, text, opts);
    candidates.sort_by_key(|c| (c.start, c.end));
    if opts.skip_empty {
        let mut seen = std::collections::HashSet::new();
        candidates.retain(|c| c.start != c.end || seen.insert((c.pattern_id, c.start)));
    }
    candidates
        .into_iter()
        .map(|c| Match {
            start: c.start,
            end: c.end,
            pattern_id: c.pattern_id,
            groups: c.groups,
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Candidate {
    pattern_id: u32,
    start: usize,
    end: usize,
    groups: [Option<(usize, usize)>; 9],
}

fn find_first(pattern: &Pattern, text: &[u16], opts: MatchOptions, from: usize) -> Option<Match> {
    let candidates = collect_hits(pattern, text, opts);
    resolve(pattern, &candidates, &|h: &Candidate| h.start >= from)
}

/// Runs the whole §4.7 match loop: head-anchored sub-patterns tried at
/// position 0, non-anchored literals through the shared multi-pattern
/// matcher, non-anchored regex sub-patterns by running their DFA from every
/// position — then resolves the first region at which `evaluate(tree,
/// present)` becomes true while scanning candidates in `(end, start)` order.
fn collect_hits(pattern: &Pattern, text: &[u16], opts: MatchOptions) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for (id, sp) in pattern.sub_patterns.iter().enumerate() {
        if !sp.anchored_start {
            continue;
        }
        if let Some(c) = try_anchored(sp, text, opts, id as u32) {
            candidates.push(c);
        }
    }

    if let Some(automaton) = &pattern.automaton {
        for hit in automaton.scan(text) {
            let global_id = pattern.automaton_ids[hit.pattern_id as usize];
            push_literal_hit(pattern, &mut candidates, global_id, hit, text.len());
        }
    }

    for (id, sp) in pattern.sub_patterns.iter().enumerate() {
        if sp.anchored_start {
            continue;
        }
        if let SubPatternKind::Regex(dfa) = &sp.kind {
            for start in 0..=text.len() {
                if let Some(result) = dfa.run(text, start, opts.mode) {
                    if sp.anchored_end && result.end != text.len() {
                        continue;
                    }
                    candidates.push(Candidate {
                        pattern_id: id as u32,
                        start,
                        end: result.end,
                        groups: result.captures,
                    });
                }
            }
        }
    }

    candidates
}

fn try_anchored(sp: &crate::pattern::CompiledSubPattern, text: &[u16], opts: MatchOptions, id: u32) -> Option<Candidate> {
    match &sp.kind {
        SubPatternKind::Literal(lit) => {
            if text.len() >= lit.len() && &text[..lit.len()] == lit.as_slice() {
                let end = lit.len();
                if sp.anchored_end && end != text.len() {
                    return None;
                }
                Some(Candidate {
                    pattern_id: id,
                    start: 0,
                    end,
                    groups: [None; 9],
                })
            } else {
                None
            }
        }
        SubPatternKind::Regex(dfa) => {
            let result = dfa.run(text, 0, opts.mode)?;
            if sp.anchored_end && result.end != text.len() {
                return None;
            }
            Some(Candidate {
                pattern_id: id,
                start: 0,
                end: result.end,
                groups: result.captures,
            })
        }
    }
}

fn push_literal_hit(pattern: &Pattern, candidates: &mut Vec<Candidate>, global_id: u32, hit: Hit, text_len: usize) {
    let sp = &pattern.sub_patterns[global_id as usize];
    if sp.anchored_end && hit.end != text_len {
        return;
    }
    candidates.push(Candidate {
        pattern_id: global_id,
        start: hit.start,
        end: hit.end,
        groups: [None; 9],
    });
}

/// Scans `candidates` in non-decreasing `end` order, incrementally setting
/// `present` bits and growing a running envelope — the smallest start and
/// largest end seen so far — until some candidate's bit flips the boolean
/// tree to true. The reported match spans the whole envelope, not just the
/// triggering candidate's own occurrence: a formula like `foo&bar` is
/// satisfied by `bar`'s hit but the region it describes covers `foo`'s
/// earlier occurrence too.
///
/// Alongside `present`, a `possible` bitmap starts all-set and loses a bit
/// once that pattern's last candidate in the ordered stream has gone by
/// without being set — at that point it can never arrive. Once the formula
/// can't be satisfied even by every still-possible bit coming true, the scan
/// stops instead of exhausting the rest of `ordered`.
fn resolve(pattern: &Pattern, candidates: &[Candidate], filter: &dyn Fn(&Candidate) -> bool) -> Option<Match> {
    let num_patterns = pattern.sub_patterns.len() as u32;
    if num_patterns == 0 {
        return None;
    }
    let mut ordered: Vec<&Candidate> = candidates.iter().filter(|c| filter(c)).collect();
    ordered.sort_by_key(|c| (c.end, c.start));

    let mut last_seen_at = vec![usize::MAX; num_patterns as usize];
    for (i, c) in ordered.iter().enumerate() {
        last_seen_at[c.pattern_id as usize] = i;
    }
    let mut expiring_at: Vec<Vec<u32>> = vec![Vec::new(); ordered.len()];
    for (id, &last) in last_seen_at.iter().enumerate() {
        if last != usize::MAX {
            expiring_at[last].push(id as u32);
        }
    }

    let mut present = Bitset::new(num_patterns);
    let mut possible = Bitset::all_set(num_patterns);
    for (id, &last) in last_seen_at.iter().enumerate() {
        if last == usize::MAX {
            possible.clear_bit(id as u32);
        }
    }

    let mut envelope: Option<(usize, usize)> = None;
    for (i, c) in ordered.iter().enumerate() {
        present.set(c.pattern_id);
        let (start, end) = match envelope {
            Some((start, end)) => (start.min(c.start), end.max(c.end)),
            None => (c.start, c.end),
        };
        envelope = Some((start, end));
        if pattern.tree.eval(&present) {
            return Some(Match {
                start,
                end,
                pattern_id: c.pattern_id,
                groups: c.groups,
            });
        }

        for &id in &expiring_at[i] {
            if !present.get(id) {
                possible.clear_bit(id);
            }
        }
        if !pattern.tree.eval_union(&present, &possible) {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn u16s(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn scenario_1_or_of_literals() {
        let pattern = Pattern::compile(&u16s("abc|def")).unwrap();
        let text = u16s("xdefy");
        let m = step(&pattern, &text, MatchOptions::default()).unwrap();
        assert_eq!((m.start, m.end), (1, 4));
    }

    #[test]
    fn scenario_2_head_anchor() {
        let pattern = Pattern::compile(&u16s("^hello")).unwrap();
        let text = u16s("hello world");
        let m = advance(&pattern, &text, MatchOptions::default()).unwrap();
        assert_eq!((m.start, m.end), (0, 5));
    }

    #[test]
    fn scenario_3_group_repetition() {
        let pattern = Pattern::compile(&u16s("a(b|c)+d")).unwrap();
        let text = u16s("abcbd");
        let m = step(&pattern, &text, MatchOptions::default()).unwrap();
        assert_eq!((m.start, m.end), (0, 5));
        assert_eq!(m.groups[0], Some((1, 4)));
    }

    #[test]
    fn scenario_4_backreference() {
        let pattern = Pattern::compile(&u16s(r"\(ab\)\1")).unwrap();
        let text = u16s("abab");
        let m = step(&pattern, &text, MatchOptions::default()).unwrap();
        assert_eq!((m.start, m.end), (0, 4));
        assert_eq!(m.groups[0], Some((0, 2)));
    }

    #[test]
    fn and_requires_both_subpatterns_present() {
        let pattern = Pattern::compile(&u16s("foo&bar")).unwrap();
        assert!(step(&pattern, &u16s("foo bar"), MatchOptions::default()).is_some());
        assert!(step(&pattern, &u16s("foo only"), MatchOptions::default()).is_none());
    }

    #[test]
    fn and_match_span_covers_every_contributing_occurrence() {
        let pattern = Pattern::compile(&u16s("foo&bar")).unwrap();
        let text = u16s("foo xyz bar");
        let m = step(&pattern, &text, MatchOptions::default()).unwrap();
        assert_eq!((m.start, m.end), (0, text.len()));
    }

    #[test]
    fn andnot_excludes_right_hand_match() {
        let pattern = Pattern::compile(&u16s("foo-bar")).unwrap();
        assert!(step(&pattern, &u16s("foo baz"), MatchOptions::default()).is_some());
    }

    #[test]
    fn advance_returns_none_when_match_not_at_start() {
        let pattern = Pattern::compile(&u16s("world")).unwrap();
        assert!(advance(&pattern, &u16s("hello world"), MatchOptions::default()).is_none());
    }

    #[test]
    fn walk_reports_matches_in_nondecreasing_order() {
        let pattern = Pattern::compile(&u16s("a|b")).unwrap();
        let matches = walk(&pattern, &u16s("ababa"), MatchOptions::default());
        for w in matches.windows(2) {
            assert!((w[0].start, w[0].end) <= (w[1].start, w[1].end));
        }
    }
}
