//! Augmented syntax tree and Aho/Sethi/Ullman `firstpos`/`lastpos`/`followpos`
//! construction.
//!
//! The parse tree from [`crate::regex_parser`] is turned into a flat arena of
//! numbered leaf *positions* plus a `followpos` table; [`crate::dfa`] then
//! runs subset construction directly over that table. Positions, not tree
//! nodes, are the DFA's vocabulary — the tree itself is discarded once
//! `followpos` has been computed.

use std::collections::BTreeSet;

use crate::char_stream::TypedChar;
use crate::charset::CharSet;
use crate::error::{Error, Result};
use crate::regex_parser::Ast;

/// A leaf position in the augmented tree: one DFA-relevant symbol plus the
/// capture-group boundaries that fire when this position is consumed.
///
/// `open_mask`/`close_mask` are bitsets over groups `1..=9` (bit `g-1`);
/// [`crate::dfa::Trans::brbit`] packs `open_mask` into its low 16 bits and
/// `close_mask` into its high 16.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub symbol: LeafSymbol,
    pub open_mask: u16,
    pub close_mask: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LeafSymbol {
    Char(u16),
    Backref(u8),
    CharSet(CharSet),
    Any,
    End,
}

impl From<&LeafSymbol> for TypedChar {
    fn from(s: &LeafSymbol) -> Self {
        match s {
            LeafSymbol::Char(c) => TypedChar::Char(*c),
            LeafSymbol::Backref(g) => TypedChar::Backref(*g),
            LeafSymbol::CharSet(_) => TypedChar::CharSet(0),
            LeafSymbol::Any => TypedChar::Any,
            LeafSymbol::End => TypedChar::End,
        }
    }
}

/// The augmented tree's flattened output: a leaf table plus `followpos`.
pub struct AugmentedTree {
    pub leaves: Vec<Leaf>,
    pub followpos: Vec<BTreeSet<usize>>,
    /// `firstpos` of the whole augmented tree (`Concat(root, End)`); the
    /// DFA's start state.
    pub start: BTreeSet<usize>,
    /// The position id of the synthetic `End` leaf.
    pub end_pos: usize,
}

const MAX_GROUP: u8 = 9;

/// Expands `{n,m}` bounded repetition into plain `Concat`/`Opt`/`Star` nodes,
/// since those already have direct `firstpos`/`lastpos`/`followpos` rules and
/// a bounded repeat does not need one of its own.
fn expand_repeats(ast: &Ast) -> Ast {
    match ast {
        Ast::Repeat { min, max, inner } => {
            let inner = expand_repeats(inner);
            let mut items = Vec::new();
            for _ in 0..*min {
                items.push(inner.clone());
            }
            match max {
                None => items.push(Ast::Star(Box::new(inner))),
                Some(max) => {
                    for _ in *min..*max {
                        items.push(Ast::Opt(Box::new(inner.clone())));
                    }
                }
            }
            match items.len() {
                0 => Ast::Empty,
                1 => items.pop().unwrap(),
                _ => Ast::Concat(items),
            }
        }
        Ast::Concat(items) => Ast::Concat(items.iter().map(expand_repeats).collect()),
        Ast::Alt(items) => Ast::Alt(items.iter().map(expand_repeats).collect()),
        Ast::Star(inner) => Ast::Star(Box::new(expand_repeats(inner))),
        Ast::Plus(inner) => Ast::Plus(Box::new(expand_repeats(inner))),
        Ast::Opt(inner) => Ast::Opt(Box::new(expand_repeats(inner))),
        Ast::Group { id, inner } => Ast::Group {
            id: *id,
            inner: Box::new(expand_repeats(inner)),
        },
        leaf => leaf.clone(),
    }
}

struct Builder {
    leaves: Vec<Leaf>,
    followpos: Vec<BTreeSet<usize>>,
}

struct NodeInfo {
    nullable: bool,
    firstpos: BTreeSet<usize>,
    lastpos: BTreeSet<usize>,
}

impl Builder {
    fn push_leaf(&mut self, symbol: LeafSymbol) -> usize {
        let id = self.leaves.len();
        self.leaves.push(Leaf {
            symbol,
            open_mask: 0,
            close_mask: 0,
        });
        self.followpos.push(BTreeSet::new());
        id
    }

    fn tag_group(&mut self, id: u8, info: &NodeInfo) {
        let bit = 1u16 << (id - 1);
        for &p in &info.firstpos {
            self.leaves[p].open_mask |= bit;
        }
        for &p in &info.lastpos {
            self.leaves[p].close_mask |= bit;
        }
    }

    fn walk(&mut self, ast: &Ast, charsets: &mut crate::charset::CharSetPool) -> Result<NodeInfo> {
        Ok(match ast {
            Ast::Empty => NodeInfo {
                nullable: true,
                firstpos: BTreeSet::new(),
                lastpos: BTreeSet::new(),
            },
            Ast::Char(c) => {
                let p = self.push_leaf(LeafSymbol::Char(*c));
                leaf_info(p)
            }
            Ast::Any => {
                let p = self.push_leaf(LeafSymbol::Any);
                leaf_info(p)
            }
            Ast::Backref(g) => {
                let p = self.push_leaf(LeafSymbol::Backref(*g));
                leaf_info(p)
            }
            Ast::Class { ranges, invert } => {
                let set = CharSet::new(ranges.clone(), *invert);
                // Interned lazily by dfa.rs once transitions are grouped;
                // the leaf carries the raw set so equal-valued classes can
                // still be recognized structurally before interning.
                let _ = charsets;
                let p = self.push_leaf(LeafSymbol::CharSet(set));
                leaf_info(p)
            }
            Ast::Concat(items) => {
                let mut acc = NodeInfo {
                    nullable: true,
                    firstpos: BTreeSet::new(),
                    lastpos: BTreeSet::new(),
                };
                let mut first = true;
                for item in items {
                    let info = self.walk(item, charsets)?;
                    if first {
                        acc.firstpos = info.firstpos.clone();
                        acc.lastpos = info.lastpos.clone();
                        acc.nullable = info.nullable;
                        first = false;
                    } else {
                        if acc.nullable {
                            acc.firstpos.extend(info.firstpos.iter().copied());
                        }
                        for &p in &acc.lastpos {
                            self.followpos[p].extend(info.firstpos.iter().copied());
                        }
                        acc.lastpos = if info.nullable {
                            acc.lastpos.union(&info.lastpos).copied().collect()
                        } else {
                            info.lastpos.clone()
                        };
                        acc.nullable = acc.nullable && info.nullable;
                    }
                }
                acc
            }
            Ast::Alt(items) => {
                let mut nullable = false;
                let mut firstpos = BTreeSet::new();
                let mut lastpos = BTreeSet::new();
                for item in items {
                    let info = self.walk(item, charsets)?;
                    nullable |= info.nullable;
                    firstpos.extend(info.firstpos);
                    lastpos.extend(info.lastpos);
                }
                NodeInfo {
                    nullable,
                    firstpos,
                    lastpos,
                }
            }
            Ast::Star(inner) => {
                let info = self.walk(inner, charsets)?;
                for &p in &info.lastpos {
                    self.followpos[p].extend(info.firstpos.iter().copied());
                }
                NodeInfo {
                    nullable: true,
                    firstpos: info.firstpos,
                    lastpos: info.lastpos,
                }
            }
            Ast::Plus(inner) => {
                let info = self.walk(inner, charsets)?;
                for &p in &info.lastpos {
                    self.followpos[p].extend(info.firstpos.iter().copied());
                }
                NodeInfo {
                    nullable: info.nullable,
                    firstpos: info.firstpos,
                    lastpos: info.lastpos,
                }
            }
            Ast::Opt(inner) => {
                let info = self.walk(inner, charsets)?;
                NodeInfo {
                    nullable: true,
                    firstpos: info.firstpos,
                    lastpos: info.lastpos,
                }
            }
            Ast::Repeat { .. } => {
                unreachable!("Repeat is expanded away before augmentation")
            }
            Ast::Group { id, inner } => {
                if *id > MAX_GROUP {
                    return Err(Error::TooComplex("more than 9 capture groups"));
                }
                let info = self.walk(inner, charsets)?;
                self.tag_group(*id, &info);
                info
            }
        })
    }
}

fn leaf_info(p: usize) -> NodeInfo {
    let mut set = BTreeSet::new();
    set.insert(p);
    NodeInfo {
        nullable: false,
        firstpos: set.clone(),
        lastpos: set,
    }
}

/// Builds the augmented tree `Concat(ast, End)` and computes `followpos`.
pub fn augment(ast: &Ast, charsets: &mut crate::charset::CharSetPool) -> Result<AugmentedTree> {
    let expanded = expand_repeats(ast);
    let mut builder = Builder {
        leaves: Vec::new(),
        followpos: Vec::new(),
    };
    let body = builder.walk(&expanded, charsets)?;
    let end_pos = builder.push_leaf(LeafSymbol::End);
    let end_info = leaf_info(end_pos);

    let start = if body.nullable {
        body.firstpos.union(&end_info.firstpos).copied().collect()
    } else {
        body.firstpos.clone()
    };
    for &p in &body.lastpos {
        builder.followpos[p].extend(end_info.firstpos.iter().copied());
    }

    Ok(AugmentedTree {
        leaves: builder.leaves,
        followpos: builder.followpos,
        start,
        end_pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharSetPool;
    use crate::regex_parser::parse;

    fn build(s: &str) -> AugmentedTree {
        let units: Vec<u16> = s.encode_utf16().collect();
        let ast = parse(&units).unwrap();
        let mut pool = CharSetPool::new();
        augment(&ast, &mut pool).unwrap()
    }

    #[test]
    fn simple_concat_chains_followpos() {
        let tree = build("ab");
        // position 0 = 'a', position 1 = 'b', position 2 = End
        assert!(tree.followpos[0].contains(&1));
        assert!(tree.followpos[1].contains(&2));
        assert_eq!(tree.start, BTreeSet::from([0]));
    }

    #[test]
    fn star_loops_followpos_to_itself() {
        let tree = build("a*b");
        // 'a' is position 0; Star(a) followpos(0) includes firstpos(a) = {0}
        assert!(tree.followpos[0].contains(&0));
        assert!(tree.followpos[0].contains(&1));
    }

    #[test]
    fn group_tags_open_and_close_bits() {
        let tree = build("(ab)c");
        // 'a' = pos 0 opens group 1, 'b' = pos 1 closes group 1
        assert_eq!(tree.leaves[0].open_mask, 0b1);
        assert_eq!(tree.leaves[1].close_mask, 0b1);
        assert_eq!(tree.leaves[0].close_mask, 0);
        assert_eq!(tree.leaves[1].open_mask, 0);
    }

    #[test]
    fn optional_leading_item_is_nullable_in_concat() {
        let tree = build("a?b");
        // firstpos of the whole body must include both 'a' and 'b' positions
        // since 'a?' is nullable.
        assert!(tree.start.contains(&0));
        assert!(tree.start.contains(&1));
    }
}
