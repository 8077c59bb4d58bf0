use cardsync_core::CoreError;
use cardsync_document::DocumentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("unsupported template: {kind} node {node_id}")]
    UnsupportedTemplate { node_id: String, kind: &'static str },

    #[error("nothing is selected")]
    EmptySelection,

    #[error("sync aborted at record {index} ({identifier}): {source}")]
    RecordFailed {
        index: usize,
        identifier: String,
        source: Box<EngineError>,
    },
}
