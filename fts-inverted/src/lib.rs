pub mod calculator;
pub mod error;
pub mod index;
pub mod options;
pub mod query;
pub mod query_node;
pub mod ranking;
pub mod result;
pub mod validator;

pub use error::{Error, Result};
pub use options::{IndexingType, OpenOption, SpaceMode};
pub use query::Query;
pub use query_node::{DocumentId, QueryNode};
pub use ranking::rank;
pub use result::{compose, Cluster, ScoredDocument, SearchResult, SortOrder};
