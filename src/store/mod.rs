//! Data sources backing the cache.

mod memory;
mod remote;
mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Mathematician, MathematicianUpdate, User};

pub use memory::MemoryStore;
pub use remote::{load_dataset_dir, RemoteStore};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("request to remote source failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid source url: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported data source {0}")]
    UnsupportedUri(String),

    #[error("store is not connected")]
    NotConnected,

    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A source of mathematicians and users.
///
/// `connect` and `close` are idempotent. Queries on a closed store fail with
/// [StoreError::NotConnected].
#[async_trait]
pub trait Store: Send + Sync {
    async fn connect(&self) -> StoreResult<()>;

    async fn close(&self);

    fn is_connected(&self) -> bool;

    async fn mathematicians(&self) -> StoreResult<Vec<Mathematician>>;

    async fn users(&self) -> StoreResult<Vec<User>>;

    /// Returns whether a record with `id` was found.
    async fn update_mathematician(&self, id: &str, update: &MathematicianUpdate)
        -> StoreResult<bool>;

    async fn insert_user(&self, user: &User) -> StoreResult<()>;
}

/// Opens the store named by `uri`: `sqlite:` URLs or an `http(s)://` base URL.
pub fn open(uri: &str, cert_path: Option<&Path>) -> StoreResult<Arc<dyn Store>> {
    if uri.starts_with("sqlite:") {
        Ok(Arc::new(SqliteStore::new(uri)))
    } else if uri.starts_with("http://") || uri.starts_with("https://") {
        Ok(Arc::new(RemoteStore::new(uri, cert_path)?))
    } else {
        Err(StoreError::UnsupportedUri(uri.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_unknown_schemes() {
        assert!(matches!(
            open("mongodb://localhost", None),
            Err(StoreError::UnsupportedUri(_))
        ));
    }

    #[test]
    fn open_accepts_known_schemes() {
        assert!(open("sqlite::memory:", None).is_ok());
        assert!(open("https://example.org/json/", None).is_ok());
    }
}
