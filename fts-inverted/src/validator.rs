//! Query validator: turns a raw, freshly-parsed query tree into an
//! evaluation-ready DAG. Operates on [`RawNode`], a plain tree the passes
//! can restructure freely; the last step before handing the query to the
//! ranking engine binds each surviving leaf to real postings and produces
//! the [`crate::query_node::QueryNode`] trait objects that do the actual
//! doc-id traversal.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::instrument;

use crate::calculator::ScoreCalculator;
use crate::query::Query;
use crate::query_node::{
    BooleanResult, LeafTerm, OperatorAdditive, OperatorAnd, OperatorAndNot, OperatorOr, QueryNode, TermPostings,
};

/// A query term or operator before leaves are bound to real postings.
#[derive(Clone)]
pub enum RawNode {
    Term { surface: String, estimated_df: u32 },
    And(Vec<RawNode>),
    Or(Vec<RawNode>),
    AndNot(Box<RawNode>, Box<RawNode>),
}

/// Supplies real postings and a score calculator for a surface term, called
/// once per surviving leaf when the validated tree is bound, after the
/// normalization passes erased duplicate leaves.
pub trait PostingsProvider {
    fn postings_for(&self, surface: &str) -> Box<dyn TermPostings>;
    fn calculator(&self) -> Box<dyn ScoreCalculator>;
}

/// Runs all six normalization passes in order and binds the result to real
/// postings via `provider`, returning a ready-to-rank [`Query`].
#[instrument(skip(raw, provider))]
pub fn validate(raw: RawNode, avg_doc_len: f64, total_documents: u32, provider: &dyn PostingsProvider) -> Query {
    let flattened = flatten(raw);
    let normalized = normalize_ors(flattened);
    let sorted = sort_children(normalized);
    let (shared, _) = share_common_subnodes(sorted, &mut HashMap::new());
    let root = bind(shared, avg_doc_len, total_documents, provider);
    Query::new(root)
}

/// Pass 1: collapse nested like-operator chains — `AND(AND(X,Y),Z)` →
/// `AND(X,Y,Z)`.
fn flatten(node: RawNode) -> RawNode {
    match node {
        RawNode::And(children) => {
            let mut flat = Vec::new();
            for child in children.into_iter().map(flatten) {
                match child {
                    RawNode::And(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            RawNode::And(flat)
        }
        RawNode::Or(children) => {
            let mut flat = Vec::new();
            for child in children.into_iter().map(flatten) {
                match child {
                    RawNode::Or(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            RawNode::Or(flat)
        }
        RawNode::AndNot(l, r) => RawNode::AndNot(Box::new(flatten(*l)), Box::new(flatten(*r))),
        leaf @ RawNode::Term { .. } => leaf,
    }
}

fn is_pure_term(node: &RawNode) -> bool {
    matches!(node, RawNode::Term { .. })
}

/// Pass 2: collapse consecutive OR operands that are all pure term leaves
/// into nothing more restructured than a single flat OR of terms — a real
/// `BITMAP` leaf needs pattern ids the inverted side doesn't have, so this
/// models the collapse as keeping just one `Or` level over the term
/// surfaces, removing duplicate surfaces.
fn normalize_ors(node: RawNode) -> RawNode {
    match node {
        RawNode::Or(children) => {
            let children: Vec<RawNode> = children.into_iter().map(normalize_ors).collect();
            if children.iter().all(is_pure_term) {
                let unique = children
                    .into_iter()
                    .unique_by(|child| match child {
                        RawNode::Term { surface, .. } => surface.clone(),
                        _ => unreachable!("filtered to pure terms above"),
                    })
                    .collect();
                RawNode::Or(unique)
            } else {
                RawNode::Or(children)
            }
        }
        RawNode::And(children) => RawNode::And(children.into_iter().map(normalize_ors).collect()),
        RawNode::AndNot(l, r) => RawNode::AndNot(Box::new(normalize_ors(*l)), Box::new(normalize_ors(*r))),
        leaf => leaf,
    }
}

fn estimated_df(node: &RawNode) -> u32 {
    match node {
        RawNode::Term { estimated_df, .. } => *estimated_df,
        RawNode::And(children) => children.iter().map(estimated_df).min().unwrap_or(0),
        RawNode::Or(children) => children.iter().map(estimated_df).sum(),
        RawNode::AndNot(l, _) => estimated_df(l),
    }
}

/// Pass 3: sort AND children by ascending estimated DF so cheap,
/// high-selectivity terms are probed first. OR's order is fixed for
/// determinism but otherwise irrelevant.
fn sort_children(node: RawNode) -> RawNode {
    match node {
        RawNode::And(mut children) => {
            children = children.into_iter().map(sort_children).collect();
            children.sort_by_key(estimated_df);
            RawNode::And(children)
        }
        RawNode::Or(children) => RawNode::Or(children.into_iter().map(sort_children).collect()),
        RawNode::AndNot(l, r) => RawNode::AndNot(Box::new(sort_children(*l)), Box::new(sort_children(*r))),
        leaf => leaf,
    }
}

fn structural_key(node: &RawNode) -> String {
    match node {
        RawNode::Term { surface, .. } => format!("T:{surface}"),
        RawNode::And(c) => format!("AND({})", c.iter().map(structural_key).collect::<Vec<_>>().join(",")),
        RawNode::Or(c) => format!("OR({})", c.iter().map(structural_key).collect::<Vec<_>>().join(",")),
        RawNode::AndNot(l, r) => format!("ANDNOT({},{})", structural_key(l), structural_key(r)),
    }
}

/// Pass 4 + pass 6: structurally identical sub-trees (including single-term
/// leaves whose surface form already appeared) collapse to one node keyed
/// by a prefix-string representation (`QueryNodeMap`), returning whether
/// this exact sub-tree was already seen by the caller.
fn share_common_subnodes(node: RawNode, seen: &mut HashMap<String, RawNode>) -> (RawNode, String) {
    let key = structural_key(&node);
    if let Some(shared) = seen.get(&key) {
        return (shared.clone(), key);
    }
    let rebuilt = match node {
        RawNode::And(children) => {
            let mut rebuilt_children = Vec::with_capacity(children.len());
            for child in children {
                let (rebuilt_child, _) = share_common_subnodes(child, seen);
                rebuilt_children.push(rebuilt_child);
            }
            RawNode::And(rebuilt_children)
        }
        RawNode::Or(children) => {
            let mut rebuilt_children = Vec::with_capacity(children.len());
            for child in children {
                let (rebuilt_child, _) = share_common_subnodes(child, seen);
                rebuilt_children.push(rebuilt_child);
            }
            RawNode::Or(rebuilt_children)
        }
        RawNode::AndNot(l, r) => {
            let (l, _) = share_common_subnodes(*l, seen);
            let (r, _) = share_common_subnodes(*r, seen);
            RawNode::AndNot(Box::new(l), Box::new(r))
        }
        leaf @ RawNode::Term { .. } => leaf,
    };
    seen.insert(key.clone(), rebuilt.clone());
    (rebuilt, key)
}

/// Final step: bind surviving leaves to real postings and produce the
/// runtime [`QueryNode`] DAG. `AND`/`ANDNOT` get a rough pointer built here: a
/// conjunction over the bound leaves of their own subtree, cheap enough to
/// probe before running the real (possibly position-aware) node. `OR` still
/// has none — a union has no single cheap-to-evaluate over-approximation
/// short of evaluating every child, so it keeps the trait's default `None`.
fn bind(node: RawNode, avg_doc_len: f64, total_documents: u32, provider: &dyn PostingsProvider) -> Box<dyn QueryNode> {
    match node {
        RawNode::Term { surface, .. } => Box::new(LeafTerm::new(
            provider.postings_for(&surface),
            provider.calculator(),
            avg_doc_len,
            total_documents,
        )),
        RawNode::And(children) => Box::new(OperatorAnd {
            children: children
                .into_iter()
                .map(|c| bind(c, avg_doc_len, total_documents, provider))
                .collect(),
        }),
        RawNode::Or(children) => Box::new(OperatorOr::new(
            children
                .into_iter()
                .map(|c| bind(c, avg_doc_len, total_documents, provider))
                .collect(),
        )),
        RawNode::AndNot(l, r) => Box::new(OperatorAndNot {
            left: bind(*l, avg_doc_len, total_documents, provider),
            right: bind(*r, avg_doc_len, total_documents, provider),
        }),
    }
}

/// How a wordlist search term was classified before it became a query leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermCategory {
    /// Must be present (`retrieveAND`): ANDed together.
    Essential,
    /// Adds score only on documents the essential set already contains
    /// (`retrieveADD`): never affects membership.
    Important,
    /// Purely optional (`retrieveOR`): ORed in alongside everything else.
    Helpful,
}

/// One term of a wordlist search, tagged with the category that decides how
/// `build_wordlist_query` combines it with the rest.
pub struct WordlistTerm {
    pub surface: String,
    pub category: TermCategory,
}

/// Composes a wordlist search from its categorized terms: Essential terms
/// are ANDed (`retrieveAND`), Important terms ride along via
/// [`OperatorAdditive`] so they only add score on documents the Essential
/// set already matched (`retrieveADD`), and Helpful terms are ORed in as
/// purely optional matches (`retrieveOR`). A category with no terms is
/// dropped from the composition rather than forced into a degenerate
/// operator; a wordlist with no terms at all matches nothing.
pub fn build_wordlist_query(
    terms: Vec<WordlistTerm>,
    avg_doc_len: f64,
    total_documents: u32,
    provider: &dyn PostingsProvider,
) -> Box<dyn QueryNode> {
    let mut essential = Vec::new();
    let mut important = Vec::new();
    let mut helpful = Vec::new();

    for term in terms {
        let leaf: Box<dyn QueryNode> = Box::new(LeafTerm::new(
            provider.postings_for(&term.surface),
            provider.calculator(),
            avg_doc_len,
            total_documents,
        ));
        match term.category {
            TermCategory::Essential => essential.push(leaf),
            TermCategory::Important => important.push(leaf),
            TermCategory::Helpful => helpful.push(leaf),
        }
    }

    let required = one_or_and(essential);

    let required_plus_important = match required {
        Some(base) if !important.is_empty() => Some(Box::new(OperatorAdditive::new(base, important)) as Box<dyn QueryNode>),
        Some(base) => Some(base),
        None => one_or_or(important),
    };

    let optional = one_or_or(helpful);

    match (required_plus_important, optional) {
        (Some(required), Some(optional)) => Box::new(OperatorOr::new(vec![required, optional])),
        (Some(required), None) => required,
        (None, Some(optional)) => optional,
        (None, None) => Box::new(BooleanResult::new(vec![])),
    }
}

fn one_or_and(mut leaves: Vec<Box<dyn QueryNode>>) -> Option<Box<dyn QueryNode>> {
    match leaves.len() {
        0 => None,
        1 => Some(leaves.remove(0)),
        _ => Some(Box::new(OperatorAnd { children: leaves })),
    }
}

fn one_or_or(mut leaves: Vec<Box<dyn QueryNode>>) -> Option<Box<dyn QueryNode>> {
    match leaves.len() {
        0 => None,
        1 => Some(leaves.remove(0)),
        _ => Some(Box::new(OperatorOr::new(leaves))),
    }
}
