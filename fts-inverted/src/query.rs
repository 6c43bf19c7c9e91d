//! The bound, ready-to-rank query tree.

use crate::query_node::QueryNode;

/// A parsed query: a tree of leaves (search terms) and operators, owned for
/// the lifetime of one search.
pub struct Query {
    pub root: Box<dyn QueryNode>,
    pub ranking_mode: bool,
    pub retrieve_tf: bool,
}

impl Query {
    pub fn new(root: Box<dyn QueryNode>) -> Self {
        Self {
            root,
            ranking_mode: true,
            retrieve_tf: false,
        }
    }
}
