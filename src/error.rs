use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed user input. Raised before any backend call is made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A retrieval or document-store operation failed.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("database create error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("full-text index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Fold storage-level failures into [`Error::Backend`], keeping the
    /// message. Request and lookup errors pass through unchanged.
    pub fn into_backend(self) -> Self {
        match self {
            e @ (Self::Backend(_)
            | Self::InvalidRequest(_)
            | Self::NotFound { .. }) => e,
            other => Self::Backend(other.to_string()),
        }
    }
}
