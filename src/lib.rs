//! Topic modeling walkthrough over a review corpus.
//!
//! The pipeline runs strictly forward: load reviews, normalize them into
//! tokens, build a dictionary, vectorize into counts and TF-IDF weights,
//! then fit and inspect LDA models.

pub mod config;
pub mod corpus;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod preprocessing;
pub mod topic_modeling;
pub mod vectorizer;
pub mod visualize;
pub mod vocabulary;

pub use config::PipelineConfig;
pub use corpus::{Corpus, Document};
pub use diff::{Distance, TopicDiff};
pub use error::{Error, Result};
pub use pipeline::{PreparedCorpus, TopicScorer};
pub use preprocessing::Normalizer;
pub use topic_modeling::{LdaModel, ModeledTopic};
pub use vectorizer::{BowVector, Representation, TermVector, TfidfModel, WeightVector};
pub use vocabulary::Dictionary;
