use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("font {font} is not loaded for text node {node_id}")]
    FontNotLoaded { node_id: String, font: String },

    #[error("font unavailable: {0}")]
    FontUnavailable(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("core error: {0}")]
    Core(#[from] cardsync_core::CoreError),
}
