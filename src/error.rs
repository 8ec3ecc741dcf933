use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by pricing resolution, config patching and the
/// cluster metadata store. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    #[error("supply a GCP key to start getting data")]
    MissingCredential,

    #[error("no such field: {0} in pricing record")]
    NoSuchField(String),

    #[error("cannot set {0} field value")]
    CannotSet(String),

    #[error("provided value type didn't match pricing record field type for {0}")]
    TypeMismatch(String),

    #[error("invalid config patch: {0}")]
    InvalidPatch(#[source] serde_json::Error),

    #[error("malformed pricing record at {path}: {source}")]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {field} price {value:?}: {source}")]
    InvalidPrice {
        field: &'static str,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("no {0:?} tier in pricing cache; download pricing data first")]
    PricingNotLoaded(String),

    #[error("{0} pricing backend is not built into this binary")]
    UnsupportedBackend(&'static str),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cluster metadata store error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
