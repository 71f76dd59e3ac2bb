use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("missing join key: tag_id {tag_id} (book {goodreads_book_id}) not in tag vocabulary")]
    MissingJoinKey { tag_id: u64, goodreads_book_id: u64 },
    #[error("empty corpus: no terms left to build a vocabulary from")]
    EmptyCorpus,
    #[error("empty query")]
    EmptyQuery,
    #[error("top_n must be a positive integer, got {0}")]
    InvalidTopN(usize),
    #[error("book not found: {0}")]
    BookNotFound(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(#[from] opendal::Error),
    #[error("corrupted artifact: {0}")]
    Corruption(String),
}

impl RecommendError {
    /// Input-validation failures the caller can answer with a fallback
    /// instead of treating them as system faults.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BookNotFound(_) | Self::EmptyQuery | Self::InvalidTopN(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
