//! error taxonomy of the search service
//!
//! Every failure is converted at the request boundary into a structured JSON
//! error body; nothing propagates as an unhandled fault to the caller.

use thiserror::Error;

/// corpus store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// the store cannot be reached at all (missing file, bad path ...)
    #[error("corpus store unavailable: {0}")]
    Unavailable(String),
    ///
    #[error("corpus store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// request level failures, each mapping to one reply status
#[derive(Error, Debug)]
pub enum SearchError {
    /// rejected input, never retried, never cached
    #[error("{0}")]
    InvalidInput(String),
    ///
    #[error(transparent)]
    Store(#[from] StoreError),
    /// wall clock bound exceeded; the aligner process was killed
    #[error("aligner timed out after {0} seconds")]
    AlignerTimeout(u64),
    /// aligner exited non zero or could not be spawned
    #[error("aligner failed: {0}")]
    Aligner(String),
    ///
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    ///
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SearchError {
    /// http-equivalent status the front door should forward
    pub fn status(&self) -> u16 {
        match self {
            SearchError::InvalidInput(_) => 400,
            SearchError::Store(_) => 500,
            SearchError::AlignerTimeout(_) => 504,
            SearchError::Aligner(_) => 502,
            SearchError::Io(_) => 500,
            SearchError::Serde(_) => 500,
        }
    }
} // end of impl SearchError

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SearchError::InvalidInput("Sequence is required".to_string()).status(), 400);
        assert_eq!(SearchError::AlignerTimeout(60).status(), 504);
        assert_eq!(SearchError::Aligner("diamond: not found".to_string()).status(), 502);
        assert_eq!(
            SearchError::Store(StoreError::Unavailable("no db".to_string())).status(),
            500
        );
    }
}
