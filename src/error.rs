//! Error taxonomy for the search pipeline.
//!
//! Empty match sets and zero-site results are not errors; they come back as
//! ordinary empty collections. The variants here cover bad input, a location
//! the geocoder cannot resolve, collaborators that stay unreachable after
//! retries, and an index built with a different embedding model than the one
//! answering queries.

use thiserror::Error;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Rejected before any external call is made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The geocoder returned no candidates for the given text.
    #[error("no location found for '{0}'; try a simpler form like 'City, State' or a ZIP code")]
    LocationNotFound(String),

    /// An external collaborator stayed unreachable through bounded retries.
    #[error("{service} unavailable after {attempts} attempts")]
    Unavailable {
        service: &'static str,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The index and the query-time embedder disagree on model identity.
    /// Scoring across vector spaces is meaningless, so this is fatal and is
    /// never handled below the process boundary.
    #[error("condition index was built with embedding model '{index_model}' but queries use '{query_model}'; rebuild the index")]
    InconsistentIndex {
        index_model: String,
        query_model: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SearchError {
    /// True when retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
