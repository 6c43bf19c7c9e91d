//! `QueryNode` polymorphism and the doc-id traversal used by
//! AND/OR/ANDNOT/Window/Distance/Word.
//!
//! Dispatch is one [`QueryNode`] trait object per node, rather than a family
//! of structs behind a hand-rolled function-pointer table.

use crate::calculator::ScoreCalculator;

pub type DocumentId = u32;

/// Reserved to mean "no document".
pub const NONE: DocumentId = 0x8000_0000;
/// Reserved to mean "undefined".
pub const UNDEFINED: DocumentId = 0xFFFF_FFFF;

/// A single token occurrence of a term within a document. `word_aligned`
/// marks an occurrence that sits on a word boundary (as opposed to, say, the
/// second half of a compound token a tokenizer split mid-word) — the
/// distinction `Word` enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub token: u32,
    pub word_aligned: bool,
}

/// External collaborator: a leaf term's posting list. Physical page I/O and
/// B+Tree storage live in a different module — the caller supplies the real
/// implementation backed by an [`crate::index::IndexFileSet`].
pub trait TermPostings {
    /// Advances to the first document `>= doc` and returns `(docID, tf)`,
    /// or `None` once exhausted.
    fn next_geq(&mut self, doc: DocumentId) -> Option<(DocumentId, u32)>;

    /// A cheap, possibly approximate, estimated document frequency used by
    /// the validator's AND child-sort pass and by `secondStep`'s IDF factor.
    fn estimated_df(&self) -> u32;

    /// Token positions of the occurrence at the document most recently
    /// returned by `next_geq`. Implementations that don't store positions
    /// return `&[]`, which makes `Word`/`Window`/`Distance` degrade to plain
    /// doc-id conjunction rather than refuse to match.
    fn positions(&self) -> &[Position] {
        &[]
    }
}

/// Capability set every node in the query DAG implements. `lower_bound` is
/// the only required method; `evaluate` follows directly from it:
/// `evaluate(D) == true ⇔ lower_bound(D) == Some(D)`.
pub trait QueryNode {
    fn lower_bound(&mut self, doc: DocumentId) -> Option<DocumentId>;

    fn evaluate(&mut self, doc: DocumentId) -> bool {
        self.lower_bound(doc) == Some(doc)
    }

    /// Per-document partial score for the document the cursor is currently
    /// on. Leaves call their `ScoreCalculator`; operators combine children
    /// according to their own operator semantics.
    fn first_step(&mut self) -> f64;

    /// Term frequency at the document the cursor is currently on (`0` for
    /// operator nodes that don't track their own TF).
    fn get_tf(&self) -> u32 {
        0
    }

    /// A coarser, cheap-to-evaluate predicate guaranteed to accept any
    /// document the full node accepts. `None` means no rough pointer is
    /// available (e.g. for `OR`).
    fn rough_pointer(&self) -> Option<&dyn QueryNode> {
        None
    }

    /// Token positions of the occurrence at the document the cursor is
    /// currently on. `&[]` for nodes that don't track positions at all (most
    /// operators) or whose children didn't report any.
    fn positions(&self) -> &[Position] {
        &[]
    }
}

/// A single search term leaf, binding a term's postings to its calculator.
/// A deduplicated reference to an already-bound leaf (produced when the
/// validator erases a duplicate surface form) is just another shared
/// pointer to the same `LeafTerm`.
pub struct LeafTerm {
    pub postings: Box<dyn TermPostings>,
    pub calculator: Box<dyn ScoreCalculator>,
    current: Option<(DocumentId, u32)>,
    avg_doc_len: f64,
    /// `secondStep(df, N)`, computed once up front so
    /// `score(doc) == firstStep(tf, doc) * secondStep(df, N)` whenever no
    /// modifier is active.
    idf: f64,
}

impl LeafTerm {
    pub fn new(
        postings: Box<dyn TermPostings>,
        calculator: Box<dyn ScoreCalculator>,
        avg_doc_len: f64,
        total_documents: u32,
    ) -> Self {
        let idf = calculator.second_step(postings.estimated_df(), total_documents);
        Self {
            postings,
            calculator,
            current: None,
            avg_doc_len,
            idf,
        }
    }

    pub fn estimated_df(&self) -> u32 {
        self.postings.estimated_df()
    }
}

impl QueryNode for LeafTerm {
    fn lower_bound(&mut self, doc: DocumentId) -> Option<DocumentId> {
        let hit = self.postings.next_geq(doc)?;
        self.current = Some(hit);
        Some(hit.0)
    }

    fn first_step(&mut self) -> f64 {
        let Some((doc, tf)) = self.current else { return 0.0 };
        self.calculator.first_step(tf, doc, self.avg_doc_len) * self.idf
    }

    fn get_tf(&self) -> u32 {
        self.current.map(|(_, tf)| tf).unwrap_or(0)
    }

    fn positions(&self) -> &[Position] {
        self.postings.positions()
    }
}

/// A previously-computed bitmap of matching documents — used when a
/// sub-expression has already been evaluated elsewhere (for example, an RX
/// `m.rx` regex result folded into the inverted query as a constant leaf).
pub struct BooleanResult {
    pub docs: Vec<DocumentId>,
    cursor: usize,
}

impl BooleanResult {
    pub fn new(mut docs: Vec<DocumentId>) -> Self {
        docs.sort_unstable();
        docs.dedup();
        Self { docs, cursor: 0 }
    }
}

impl QueryNode for BooleanResult {
    fn lower_bound(&mut self, doc: DocumentId) -> Option<DocumentId> {
        while self.cursor < self.docs.len() && self.docs[self.cursor] < doc {
            self.cursor += 1;
        }
        self.docs.get(self.cursor).copied()
    }

    fn first_step(&mut self) -> f64 {
        1.0
    }
}

/// `AND`: lower_bound advances every child to `>= d`, retrying at the
/// maximum reported until all children agree.
pub struct OperatorAnd {
    pub children: Vec<Box<dyn QueryNode>>,
}

impl QueryNode for OperatorAnd {
    fn lower_bound(&mut self, mut doc: DocumentId) -> Option<DocumentId> {
        'retry: loop {
            let mut max_seen = doc;
            for child in &mut self.children {
                let got = child.lower_bound(doc)?;
                if got > max_seen {
                    max_seen = got;
                }
            }
            if max_seen == doc {
                return Some(doc);
            }
            doc = max_seen;
            continue 'retry;
        }
    }

    fn first_step(&mut self) -> f64 {
        self.children.iter_mut().map(|c| c.first_step()).product()
    }

    /// A plain conjunction of leaves is already its own rough pointer: there
    /// is no positional narrowing layered on top of it here, so probing it
    /// costs exactly what evaluating it costs. A parent `Window`/`Distance`
    /// wrapping this `AND` gets real savings by probing this instead of
    /// re-checking its own position constraint.
    fn rough_pointer(&self) -> Option<&dyn QueryNode> {
        Some(self)
    }
}

/// `OR`: lower_bound accepts the minimum reported by any child.
pub struct OperatorOr {
    pub children: Vec<Box<dyn QueryNode>>,
    current: Option<DocumentId>,
}

impl OperatorOr {
    pub fn new(children: Vec<Box<dyn QueryNode>>) -> Self {
        Self { children, current: None }
    }
}

impl QueryNode for OperatorOr {
    fn lower_bound(&mut self, doc: DocumentId) -> Option<DocumentId> {
        let winner = self
            .children
            .iter_mut()
            .filter_map(|c| c.lower_bound(doc))
            .min();
        self.current = winner;
        winner
    }

    fn first_step(&mut self) -> f64 {
        // Re-querying each child at the winning doc is idempotent for
        // children already sitting there and correctly excludes children
        // whose own next match is further ahead, since postings cursors
        // only ever advance.
        let Some(doc) = self.current else { return 0.0 };
        let mut total = 0.0;
        for child in &mut self.children {
            if child.lower_bound(doc) == Some(doc) {
                total += child.first_step();
            }
        }
        total
    }
}

/// `ANDNOT`: accepts `d` when the left child reports `d` and the right
/// child does not.
pub struct OperatorAndNot {
    pub left: Box<dyn QueryNode>,
    pub right: Box<dyn QueryNode>,
}

impl QueryNode for OperatorAndNot {
    fn lower_bound(&mut self, mut doc: DocumentId) -> Option<DocumentId> {
        loop {
            let candidate = self.left.lower_bound(doc)?;
            match self.right.lower_bound(candidate) {
                Some(r) if r == candidate => {
                    doc = candidate + 1;
                    continue;
                }
                _ => return Some(candidate),
            }
        }
    }

    fn first_step(&mut self) -> f64 {
        self.left.first_step()
    }

    /// The left side alone is a true superset of `ANDNOT`'s result (every
    /// accepted document satisfies `left`) and cheaper to probe, since it
    /// skips the right-hand exclusion check.
    fn rough_pointer(&self) -> Option<&dyn QueryNode> {
        Some(self.left.as_ref())
    }
}

/// `Word`: same doc-traversal as `AND` plus a word-boundary constraint — the
/// child's occurrence at the matched document must include at least one
/// word-aligned position. Degrades to a plain pass-through when the child
/// reports no position data at all.
pub struct OperatorWord {
    pub child: Box<dyn QueryNode>,
}

impl QueryNode for OperatorWord {
    fn lower_bound(&mut self, mut doc: DocumentId) -> Option<DocumentId> {
        loop {
            let candidate = self.child.lower_bound(doc)?;
            let positions = self.child.positions();
            if positions.is_empty() || positions.iter().any(|p| p.word_aligned) {
                return Some(candidate);
            }
            doc = candidate + 1;
        }
    }

    fn first_step(&mut self) -> f64 {
        self.child.first_step()
    }

    fn positions(&self) -> &[Position] {
        self.child.positions()
    }
}

/// Smallest range covering at least one position from every list, the
/// classic k-sorted-lists merge: repeatedly advance whichever list is
/// currently contributing the minimum token, shrinking the window until one
/// list runs out. Returns whether any such range fits within `window`.
fn window_satisfied_unordered(lists: &[&[Position]], window: u32) -> bool {
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return false;
    }
    let mut idx = vec![0usize; lists.len()];
    loop {
        let mut min_tok = lists[0][idx[0]].token;
        let mut max_tok = min_tok;
        let mut min_i = 0;
        for (i, list) in lists.iter().enumerate() {
            let tok = list[idx[i]].token;
            if tok < min_tok {
                min_tok = tok;
                min_i = i;
            }
            if tok > max_tok {
                max_tok = tok;
            }
        }
        if max_tok - min_tok < window {
            return true;
        }
        idx[min_i] += 1;
        if idx[min_i] >= lists[min_i].len() {
            return false;
        }
    }
}

/// Greedy ordered chain: for each starting position in the first list, walk
/// forward through the remaining lists taking the smallest position greater
/// than the one before it, then check the total span against `window`.
fn window_satisfied_ordered(lists: &[&[Position]], window: u32) -> bool {
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return false;
    }
    for start in lists[0] {
        let mut prev = start.token;
        let mut chained = true;
        for list in &lists[1..] {
            match list.iter().find(|p| p.token > prev) {
                Some(p) => prev = p.token,
                None => {
                    chained = false;
                    break;
                }
            }
        }
        if chained && prev - start.token < window {
            return true;
        }
    }
    false
}

/// `Window(n, unordered)`: all operand positions must fit within a window of
/// `n` tokens, in any order when `unordered` or in child order otherwise.
/// Doc-traversal narrows by `AND` first; a document only survives once its
/// children's positions also satisfy the window.
pub struct OperatorWindow {
    pub children: Vec<Box<dyn QueryNode>>,
    pub window: u32,
    pub unordered: bool,
}

impl QueryNode for OperatorWindow {
    fn lower_bound(&mut self, doc: DocumentId) -> Option<DocumentId> {
        let mut and = OperatorAnd {
            children: std::mem::take(&mut self.children),
        };
        let mut candidate = and.lower_bound(doc);
        while let Some(d) = candidate {
            let lists: Vec<&[Position]> = and.children.iter().map(|c| c.positions()).collect();
            let satisfied = lists.iter().any(|l| l.is_empty())
                || if self.unordered {
                    window_satisfied_unordered(&lists, self.window)
                } else {
                    window_satisfied_ordered(&lists, self.window)
                };
            if satisfied {
                break;
            }
            candidate = and.lower_bound(d + 1);
        }
        self.children = and.children;
        candidate
    }

    fn first_step(&mut self) -> f64 {
        self.children.iter_mut().map(|c| c.first_step()).product()
    }
}

/// Any `(left, right)` position pair, ordered `right` after `left`, whose gap
/// falls within `[min, max]` tokens.
fn distance_satisfied(left: &[Position], right: &[Position], min: u32, max: u32) -> bool {
    left.iter().any(|l| {
        right
            .iter()
            .any(|r| r.token > l.token && (r.token - l.token) >= min && (r.token - l.token) <= max)
    })
}

/// `Distance(min, max)`: ordered positions with gap constraints. Doc-id
/// traversal is the same lockstep walk as before; once both sides land on
/// the same document, their position lists are checked against the gap
/// bound before the document is accepted.
pub struct OperatorDistance {
    pub left: Box<dyn QueryNode>,
    pub right: Box<dyn QueryNode>,
    pub min: u32,
    pub max: u32,
}

impl QueryNode for OperatorDistance {
    fn lower_bound(&mut self, mut doc: DocumentId) -> Option<DocumentId> {
        loop {
            let l = self.left.lower_bound(doc)?;
            let r = self.right.lower_bound(l)?;
            if r != l {
                doc = r;
                continue;
            }
            let (lp, rp) = (self.left.positions(), self.right.positions());
            if lp.is_empty() || rp.is_empty() || distance_satisfied(lp, rp, self.min, self.max) {
                return Some(l);
            }
            doc = l + 1;
        }
    }

    fn first_step(&mut self) -> f64 {
        self.left.first_step() + self.right.first_step()
    }
}

/// `retrieveADD`: `additive` children never affect which documents are
/// accepted — membership is `base` alone — but each one that independently
/// matches the document `base` landed on contributes its own score on top.
/// Models a wordlist search's Important-category terms, which only add
/// score on documents the Essential AND-set already contains.
pub struct OperatorAdditive {
    pub base: Box<dyn QueryNode>,
    pub additive: Vec<Box<dyn QueryNode>>,
    current: Option<DocumentId>,
}

impl OperatorAdditive {
    pub fn new(base: Box<dyn QueryNode>, additive: Vec<Box<dyn QueryNode>>) -> Self {
        Self {
            base,
            additive,
            current: None,
        }
    }
}

impl QueryNode for OperatorAdditive {
    fn lower_bound(&mut self, doc: DocumentId) -> Option<DocumentId> {
        let result = self.base.lower_bound(doc);
        self.current = result;
        result
    }

    fn first_step(&mut self) -> f64 {
        let Some(doc) = self.current else { return 0.0 };
        let mut total = self.base.first_step();
        for child in &mut self.additive {
            if child.lower_bound(doc) == Some(doc) {
                total += child.first_step();
            }
        }
        total
    }

    fn get_tf(&self) -> u32 {
        self.base.get_tf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::TfIdf;

    struct VecPostings {
        docs: Vec<(DocumentId, u32)>,
        cursor: usize,
    }

    impl VecPostings {
        fn new(docs: Vec<(DocumentId, u32)>) -> Self {
            Self { docs, cursor: 0 }
        }
    }

    impl TermPostings for VecPostings {
        fn next_geq(&mut self, doc: DocumentId) -> Option<(DocumentId, u32)> {
            while self.cursor < self.docs.len() && self.docs[self.cursor].0 < doc {
                self.cursor += 1;
            }
            self.docs.get(self.cursor).copied()
        }

        fn estimated_df(&self) -> u32 {
            self.docs.len() as u32
        }
    }

    fn leaf(docs: Vec<(DocumentId, u32)>) -> LeafTerm {
        LeafTerm::new(Box::new(VecPostings::new(docs)), Box::new(TfIdf::default()), 10.0, 100)
    }

    #[test]
    fn and_requires_both_children() {
        let mut and = OperatorAnd {
            children: vec![
                Box::new(leaf(vec![(1, 1), (2, 1), (3, 1)])),
                Box::new(leaf(vec![(2, 1), (3, 1)])),
            ],
        };
        assert_eq!(and.lower_bound(0), Some(2));
        assert_eq!(and.lower_bound(3), Some(3));
        assert_eq!(and.lower_bound(4), None);
    }

    #[test]
    fn andnot_excludes_right_docs() {
        let mut node = OperatorAndNot {
            left: Box::new(leaf(vec![(1, 1), (2, 1), (3, 1)])),
            right: Box::new(leaf(vec![(3, 1)])),
        };
        assert_eq!(node.lower_bound(0), Some(1));
        assert_eq!(node.lower_bound(2), Some(2));
        assert_eq!(node.lower_bound(3), None);
    }

    #[test]
    fn evaluate_matches_lower_bound_invariant() {
        let mut node = leaf(vec![(5, 1), (9, 1)]);
        assert!(!node.evaluate(4));
        assert!(node.evaluate(5));
    }

    #[test]
    fn and_rough_pointer_is_itself() {
        let mut and = OperatorAnd {
            children: vec![Box::new(leaf(vec![(1, 1)])), Box::new(leaf(vec![(1, 1)]))],
        };
        assert!(and.rough_pointer().is_some());
    }

    #[test]
    fn andnot_rough_pointer_is_the_left_child() {
        let node = OperatorAndNot {
            left: Box::new(leaf(vec![(1, 1), (2, 1)])),
            right: Box::new(leaf(vec![(2, 1)])),
        };
        assert!(node.rough_pointer().is_some());
    }

    struct PositionedPostings {
        docs: Vec<(DocumentId, u32, Vec<Position>)>,
        cursor: usize,
    }

    impl PositionedPostings {
        fn new(docs: Vec<(DocumentId, u32, Vec<Position>)>) -> Self {
            Self { docs, cursor: 0 }
        }
    }

    impl TermPostings for PositionedPostings {
        fn next_geq(&mut self, doc: DocumentId) -> Option<(DocumentId, u32)> {
            while self.cursor < self.docs.len() && self.docs[self.cursor].0 < doc {
                self.cursor += 1;
            }
            self.docs.get(self.cursor).map(|(d, tf, _)| (*d, *tf))
        }

        fn estimated_df(&self) -> u32 {
            self.docs.len() as u32
        }

        fn positions(&self) -> &[Position] {
            self.docs.get(self.cursor).map(|(_, _, p)| p.as_slice()).unwrap_or(&[])
        }
    }

    fn positioned_leaf(docs: Vec<(DocumentId, u32, Vec<Position>)>) -> LeafTerm {
        LeafTerm::new(Box::new(PositionedPostings::new(docs)), Box::new(TfIdf::default()), 10.0, 100)
    }

    fn pos(token: u32, word_aligned: bool) -> Position {
        Position { token, word_aligned }
    }

    #[test]
    fn word_rejects_occurrence_with_no_aligned_position() {
        let mut word = OperatorWord {
            child: Box::new(positioned_leaf(vec![(1, 1, vec![pos(3, false)]), (2, 1, vec![pos(5, true)])])),
        };
        assert_eq!(word.lower_bound(0), Some(2));
    }

    #[test]
    fn window_unordered_requires_positions_within_span() {
        let mut window = OperatorWindow {
            children: vec![
                Box::new(positioned_leaf(vec![(1, 1, vec![pos(10, true)])])),
                Box::new(positioned_leaf(vec![(1, 1, vec![pos(50, true)])])),
            ],
            window: 5,
            unordered: true,
        };
        assert_eq!(window.lower_bound(0), None);

        let mut window = OperatorWindow {
            children: vec![
                Box::new(positioned_leaf(vec![(1, 1, vec![pos(10, true)])])),
                Box::new(positioned_leaf(vec![(1, 1, vec![pos(12, true)])])),
            ],
            window: 5,
            unordered: true,
        };
        assert_eq!(window.lower_bound(0), Some(1));
    }

    #[test]
    fn window_ordered_rejects_reversed_positions() {
        let mut window = OperatorWindow {
            children: vec![
                Box::new(positioned_leaf(vec![(1, 1, vec![pos(10, true)])])),
                Box::new(positioned_leaf(vec![(1, 1, vec![pos(4, true)])])),
            ],
            window: 10,
            unordered: false,
        };
        assert_eq!(window.lower_bound(0), None);
    }

    #[test]
    fn distance_requires_gap_within_bounds() {
        let mut distance = OperatorDistance {
            left: Box::new(positioned_leaf(vec![(1, 1, vec![pos(10, true)])])),
            right: Box::new(positioned_leaf(vec![(1, 1, vec![pos(13, true)])])),
            min: 1,
            max: 2,
        };
        assert_eq!(distance.lower_bound(0), None);

        let mut distance = OperatorDistance {
            left: Box::new(positioned_leaf(vec![(1, 1, vec![pos(10, true)])])),
            right: Box::new(positioned_leaf(vec![(1, 1, vec![pos(12, true)])])),
            min: 1,
            max: 2,
        };
        assert_eq!(distance.lower_bound(0), Some(1));
    }

    #[test]
    fn additive_scores_only_when_additive_child_independently_matches() {
        let base: Box<dyn QueryNode> = Box::new(leaf(vec![(1, 1), (2, 1)]));
        let additive: Box<dyn QueryNode> = Box::new(leaf(vec![(1, 1)]));
        let mut node = OperatorAdditive::new(base, vec![additive]);

        assert_eq!(node.lower_bound(1), Some(1));
        let with_additive = node.first_step();

        assert_eq!(node.lower_bound(2), Some(2));
        let without_additive = node.first_step();

        assert!(with_additive > without_additive);
    }
}
