//! Out-of-scope collaborators modeled as traits. Physical page I/O, the
//! B+Tree leaf/overflow layout and the row-id map are a different module's
//! job; this crate only needs the narrow interface those modules expose.

use crate::query_node::DocumentId;

pub type RowId = u64;

/// Supplies per-document facts the ranking engine needs but doesn't store
/// itself: document length (for length-normalized calculators) and a
/// cooperative cancellation check.
pub trait DocumentSource {
    fn document_length(&self, doc_id: DocumentId) -> Option<u32>;
    fn average_document_length(&self) -> f64;
    fn total_documents(&self) -> u32;
    fn is_cancelled(&self) -> bool;
}

/// Maps an internal `DocumentId` to the row-id the storage engine's caller
/// actually asked about. Modeled as a sum type selected by unit count at
/// construction, never a runtime downcast.
pub enum RowIdVectorFile {
    /// A collection small enough that a flat, fully in-memory vector is
    /// cheaper than paging through a B+Tree.
    Small(Vec<RowId>),
    /// Delegates to an external, paged row-id store for large collections.
    Large(Box<dyn RowIdVectorFileLarge>),
}

/// The paged-store half of [`RowIdVectorFile::Large`] — implemented outside
/// this crate, against the real B+Tree.
pub trait RowIdVectorFileLarge: Send + Sync {
    fn row_id(&self, doc_id: DocumentId) -> Option<RowId>;
}

impl RowIdVectorFile {
    pub fn row_id(&self, doc_id: DocumentId) -> Option<RowId> {
        match self {
            RowIdVectorFile::Small(v) => v.get(doc_id as usize).copied(),
            RowIdVectorFile::Large(backing) => backing.row_id(doc_id),
        }
    }
}

/// A bundle of the open index file set a search runs against. This crate
/// never opens or pages these files itself — callers construct one from
/// their storage layer and hand it to the ranking engine.
pub struct IndexFileSet<S: DocumentSource> {
    pub document_source: S,
    pub row_ids: RowIdVectorFile,
}

impl<S: DocumentSource> IndexFileSet<S> {
    pub fn new(document_source: S, row_ids: RowIdVectorFile) -> Self {
        Self { document_source, row_ids }
    }
}
