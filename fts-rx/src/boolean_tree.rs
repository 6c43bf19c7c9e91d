//! The top-level boolean tree over sub-pattern ids and its bitmap
//! evaluation.

/// Internal node of the top-level tree. `Bitmap` is produced by
/// [`normalize`], never by [`crate::query_parser`] directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanNode {
    And(Box<BooleanNode>, Box<BooleanNode>),
    Or(Box<BooleanNode>, Box<BooleanNode>),
    AndNot(Box<BooleanNode>, Box<BooleanNode>),
    Leaf(u32),
    /// A set of pattern-ids any of which satisfies this node — the
    /// normalized form of a chain of `OR`s over pure leaves.
    Bitmap(Vec<u32>),
}

impl BooleanNode {
    /// Validates invariant (iv): every `Leaf`/`Bitmap` pattern-id lies in
    /// `[0, num_patterns)`.
    pub fn validate(&self, num_patterns: u32) -> bool {
        match self {
            BooleanNode::Leaf(id) => *id < num_patterns,
            BooleanNode::Bitmap(ids) => ids.iter().all(|id| *id < num_patterns),
            BooleanNode::And(l, r) | BooleanNode::Or(l, r) | BooleanNode::AndNot(l, r) => {
                l.validate(num_patterns) && r.validate(num_patterns)
            }
        }
    }

    /// Evaluates this node against a bitmap (`present` or `possible`):
    /// AND = both children true, OR = either true, ANDNOT = left
    /// true and right false, LEAF = bit set, BITMAP = any encoded bit set.
    pub fn eval(&self, bits: &Bitset) -> bool {
        match self {
            BooleanNode::And(l, r) => l.eval(bits) && r.eval(bits),
            BooleanNode::Or(l, r) => l.eval(bits) || r.eval(bits),
            BooleanNode::AndNot(l, r) => l.eval(bits) && !r.eval(bits),
            BooleanNode::Leaf(id) => bits.get(*id),
            BooleanNode::Bitmap(ids) => ids.iter().any(|id| bits.get(*id)),
        }
    }

    /// Optimistic evaluation used for the short-circuit-on-failure check:
    /// treats every bit in `possible` as a free choice that could still turn
    /// true, on top of whatever is already fixed true in `present`. Returns
    /// whether the formula could still be satisfied under the
    /// most favorable resolution of the undetermined bits. `ANDNOT`'s
    /// right-hand side isn't given the same benefit of the doubt: it only
    /// evaluates against `present`, since "could still be false" is the
    /// favorable case there, not "could still be true".
    pub fn eval_union(&self, present: &Bitset, possible: &Bitset) -> bool {
        match self {
            BooleanNode::And(l, r) => l.eval_union(present, possible) && r.eval_union(present, possible),
            BooleanNode::Or(l, r) => l.eval_union(present, possible) || r.eval_union(present, possible),
            BooleanNode::AndNot(l, r) => l.eval_union(present, possible) && !r.eval(present),
            BooleanNode::Leaf(id) => present.get(*id) || possible.get(*id),
            BooleanNode::Bitmap(ids) => ids.iter().any(|id| present.get(*id) || possible.get(*id)),
        }
    }
}

/// Collapses chains of `Or` over pure `Leaf`/`Bitmap` nodes into a single
/// `Bitmap`, the same normalize-ORs idea the inverted-query validator
/// applies to its own query tree.
pub fn normalize(node: BooleanNode) -> BooleanNode {
    match node {
        BooleanNode::Or(l, r) => {
            let l = normalize(*l);
            let r = normalize(*r);
            match (pure_ids(&l), pure_ids(&r)) {
                (Some(mut a), Some(b)) => {
                    a.extend(b);
                    a.sort_unstable();
                    a.dedup();
                    BooleanNode::Bitmap(a)
                }
                _ => BooleanNode::Or(Box::new(l), Box::new(r)),
            }
        }
        BooleanNode::And(l, r) => {
            BooleanNode::And(Box::new(normalize(*l)), Box::new(normalize(*r)))
        }
        BooleanNode::AndNot(l, r) => {
            BooleanNode::AndNot(Box::new(normalize(*l)), Box::new(normalize(*r)))
        }
        leaf => leaf,
    }
}

fn pure_ids(node: &BooleanNode) -> Option<Vec<u32>> {
    match node {
        BooleanNode::Leaf(id) => Some(vec![*id]),
        BooleanNode::Bitmap(ids) => Some(ids.clone()),
        _ => None,
    }
}

/// A `⌈P/32⌉`-word scratch bitmap over sub-pattern ids (`present`/
/// `possible`), reused across searches rather than reallocated.
#[derive(Debug, Clone)]
pub struct Bitset {
    words: Vec<u32>,
}

impl Bitset {
    pub fn new(num_patterns: u32) -> Self {
        let words = ((num_patterns as usize) + 31) / 32;
        Self {
            words: vec![0; words.max(1)],
        }
    }

    /// An all-ones bitset — the initial value of `resolve`'s `possible`
    /// bitmap, before any pattern id is ruled out.
    pub fn all_set(num_patterns: u32) -> Self {
        let mut b = Self::new(num_patterns);
        for w in &mut b.words {
            *w = u32::MAX;
        }
        b
    }

    pub fn clear(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    pub fn set_all(&mut self) {
        for w in &mut self.words {
            *w = u32::MAX;
        }
    }

    pub fn get(&self, id: u32) -> bool {
        let (w, b) = (id as usize / 32, id % 32);
        self.words.get(w).map(|word| word & (1 << b) != 0).unwrap_or(false)
    }

    pub fn set(&mut self, id: u32) {
        let (w, b) = (id as usize / 32, id % 32);
        if let Some(word) = self.words.get_mut(w) {
            *word |= 1 << b;
        }
    }

    /// Rules a pattern id out of a `possible` bitmap once its last
    /// occurrence in the ordered hit stream has gone by unset.
    pub fn clear_bit(&mut self, id: u32) {
        let (w, b) = (id as usize / 32, id % 32);
        if let Some(word) = self.words.get_mut(w) {
            *word &= !(1 << b);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }
}
