//! Mapping of backend library errors into the shared error type

use meta_achiever_core::{MetaAchieverError, Result};

/// Lifts `rusqlite` results into [`MetaAchieverError::Database`]
pub trait DbResultExt<T> {
    fn db_err(self) -> Result<T>;
}

impl<T> DbResultExt<T> for rusqlite::Result<T> {
    fn db_err(self) -> Result<T> {
        self.map_err(|e| MetaAchieverError::Database(e.to_string()))
    }
}

pub(crate) fn http_error(err: reqwest::Error, timeout: std::time::Duration) -> MetaAchieverError {
    if err.is_timeout() {
        MetaAchieverError::Timeout(timeout)
    } else {
        MetaAchieverError::Network(err.to_string())
    }
}
