use thiserror::Error;

use crate::vectorizer::Representation;

/// Errors raised by the review topic pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("column '{column}' not found in header (available: {})", available.join(", "))]
    MissingColumn { column: String, available: Vec<String> },

    #[error("corpus is empty after loading and deduplication")]
    EmptyCorpus,

    #[error("vocabulary mismatch: {0}")]
    VocabularyMismatch(String),

    #[error("model was fitted on {expected} vectors but got {actual}")]
    RepresentationMismatch {
        expected: Representation,
        actual: Representation,
    },

    #[error("number of topics must be positive")]
    InvalidTopicCount,

    #[error("minimum token length must be at least 1")]
    InvalidMinLength,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("topic {topic} out of range (model has {num_topics} topics)")]
    TopicOutOfRange { topic: usize, num_topics: usize },

    #[error("diagonal diff needs equal topic counts ({left} vs {right})")]
    TopicCountMismatch { left: usize, right: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
