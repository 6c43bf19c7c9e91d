//! Open-time options for the inverted index.
//!
//! [`OpenOption`] fields are declared in the exact order their numeric key
//! IDs are persisted in the on-disk file-ID block — adding a field appends
//! it at the end; reordering these fields is a file-format break, so don't.

use bon::Builder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingType {
    NGram = 1,
    Word = 2,
    Dual = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceMode {
    #[default]
    AsIs = 0,
    NoNormalize,
    Delete,
    Reset,
}

/// Persisted open-time configuration, built with a `bon`-derived builder.
#[derive(Debug, Clone, Builder)]
pub struct OpenOption {
    #[builder(default = 4096)]
    pub leaf_page_size: u32,
    #[builder(default = 4096)]
    pub overflow_page_size: u32,
    #[builder(default = IndexingType::Word)]
    pub indexing_type: IndexingType,
    pub tokenize_parameter: Option<String>,
    #[builder(default = true)]
    pub normalized: bool,
    pub id_coder: Option<String>,
    pub frequency_coder: Option<String>,
    pub length_coder: Option<String>,
    pub location_coder: Option<String>,
    pub word_id_coder: Option<String>,
    pub word_frequency_coder: Option<String>,
    pub word_length_coder: Option<String>,
    pub word_location_coder: Option<String>,
    #[builder(default = false)]
    pub stemming: bool,
    #[builder(default)]
    pub space_mode: SpaceMode,
    pub extractor: Option<String>,
    pub language: Option<String>,
    #[builder(default = 4096)]
    pub btree_page_size: u32,
    #[builder(default = false)]
    pub distribute: bool,
    #[builder(default = false)]
    pub clustered: bool,
    pub feature: Option<String>,
    pub carriage: Option<String>,
    #[builder(default = false)]
    pub nolocation: bool,
    #[builder(default = false)]
    pub no_tf: bool,
    #[builder(default = 0)]
    pub rough_kwic_size: u32,
}
