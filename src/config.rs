//! Pipeline configuration.
//!
//! Every stage has its own config struct with sensible defaults; they are
//! gathered in [`PipelineConfig`], which can be read from a JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diff::DiffConfig;
use crate::error::{Error, Result};
use crate::preprocessing::NormalizerConfig;
use crate::topic_modeling::LdaConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Header name of the free-text column
    pub text_column: String,
    /// Field delimiter, a single ASCII character
    pub delimiter: char,
    /// Honour double quotes around fields
    pub quoting: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        CorpusConfig {
            text_column: "Review".to_string(),
            delimiter: '\t',
            quoting: true,
        }
    }
}

impl CorpusConfig {
    pub fn text_column(mut self, column: &str) -> Self {
        self.text_column = column.to_string();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn quoting(mut self, enable: bool) -> Self {
        self.quoting = enable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.text_column.trim().is_empty() {
            return Err(Error::InvalidParameter("text column name is empty".into()));
        }
        if !self.delimiter.is_ascii() {
            return Err(Error::InvalidParameter(format!(
                "delimiter '{}' is not a single ASCII character",
                self.delimiter
            )));
        }
        Ok(())
    }
}

/// Frequency-based dictionary pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    /// Drop tokens found in fewer than this many documents
    pub no_below: usize,
    /// Drop tokens found in more than this fraction of documents
    pub no_above: f64,
    /// Keep at most this many of the most frequent tokens afterwards
    pub keep_n: Option<usize>,
}

impl Default for PruneConfig {
    fn default() -> Self {
        PruneConfig {
            no_below: 5,
            no_above: 0.5,
            keep_n: Some(100_000),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Pruning is off unless set
    pub prune: Option<PruneConfig>,
}

impl VocabularyConfig {
    pub fn with_prune(mut self, prune: PruneConfig) -> Self {
        self.prune = Some(prune);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(prune) = &self.prune {
            if !(prune.no_above > 0.0 && prune.no_above <= 1.0) {
                return Err(Error::InvalidParameter(format!(
                    "no_above must be in (0, 1], got {}",
                    prune.no_above
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub corpus: CorpusConfig,
    pub normalizer: NormalizerConfig,
    pub vocabulary: VocabularyConfig,
    pub lda: LdaConfig,
    /// Topic counts fitted on each representation
    pub topic_counts: Vec<usize>,
    pub diff: DiffConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            corpus: CorpusConfig::default(),
            normalizer: NormalizerConfig::default(),
            vocabulary: VocabularyConfig::default(),
            lda: LdaConfig::default().passes(5),
            topic_counts: vec![2, 3, 5],
            diff: DiffConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; absent fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.corpus.validate()?;
        self.normalizer.validate()?;
        self.vocabulary.validate()?;
        self.lda.validate()?;
        if self.topic_counts.is_empty() || self.topic_counts.contains(&0) {
            return Err(Error::InvalidTopicCount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.corpus.text_column, "Review");
        assert_eq!(config.corpus.delimiter, '\t');
        assert_eq!(config.normalizer.min_token_len, 3);
        assert!(config.vocabulary.prune.is_none());
        assert_eq!(config.topic_counts, vec![2, 3, 5]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "topic_counts": [4], "corpus": { "text_column": "Text" } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.topic_counts, vec![4]);
        assert_eq!(config.corpus.text_column, "Text");
        assert_eq!(config.corpus.delimiter, '\t');
        assert_eq!(config.lda.passes, 5);
    }

    #[test]
    fn test_zero_topic_count_rejected() {
        let mut config = PipelineConfig::default();
        config.topic_counts = vec![3, 0];
        assert!(matches!(config.validate(), Err(Error::InvalidTopicCount)));
    }

    #[test]
    fn test_prune_bounds() {
        let config = VocabularyConfig::default().with_prune(PruneConfig {
            no_below: 1,
            no_above: 1.5,
            keep_n: None,
        });
        assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{ "normalizer": { "min_token_len": 4, "stem": true } }"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.normalizer.min_token_len, 4);
        assert!(config.normalizer.stem);
        assert!(config.normalizer.lemmatize);
    }
}
