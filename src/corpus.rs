//! Review corpus loading.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CorpusConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Position in the deduplicated corpus
    pub id: usize,
    /// Data row in the source file (0-based, header excluded)
    pub source_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub blank_skipped: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub report: LoadReport,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|doc| doc.text.as_str())
    }
}

pub fn load_path<P: AsRef<Path>>(path: P, config: &CorpusConfig) -> Result<Corpus> {
    let path = path.as_ref();
    info!("Loading reviews from {}", path.display());
    let file = File::open(path)?;
    load_reader(file, config)
}

/// Read the configured text column and drop exact duplicates, first one wins.
pub fn load_reader<R: Read>(reader: R, config: &CorpusConfig) -> Result<Corpus> {
    config.validate()?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter as u8)
        .quoting(config.quoting)
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    // A zero-byte file yields no header record at all, or one blank field
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::EmptyCorpus);
    }
    let Some(column) = headers.iter().position(|h| h.trim() == config.text_column) else {
        return Err(Error::MissingColumn {
            column: config.text_column.clone(),
            available: headers.iter().map(|h| h.to_string()).collect(),
        });
    };

    let mut report = LoadReport::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut documents = Vec::new();

    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        report.rows_read += 1;

        let text = record.get(column).unwrap_or("");
        if text.trim().is_empty() {
            warn!("Skipping blank review at row {}", row);
            report.blank_skipped += 1;
            continue;
        }

        if !seen.insert(text.to_string()) {
            debug!("Duplicate review at row {}", row);
            report.duplicates_removed += 1;
            continue;
        }

        documents.push(Document {
            id: documents.len(),
            source_index: row,
            text: text.to_string(),
        });
    }

    if documents.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    info!(
        "Loaded {} documents from {} rows ({} duplicates removed, {} blank)",
        documents.len(),
        report.rows_read,
        report.duplicates_removed,
        report.blank_skipped
    );

    Ok(Corpus { documents, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "Review\tLiked\n\
        Wow... Loved this place.\t1\n\
        Crust is not good.\t0\n\
        Wow... Loved this place.\t1\n\
        Not tasty and the texture was just nasty.\t0\n\
        Crust is not good.\t0\n";

    #[test]
    fn test_dedup_preserves_order() {
        let corpus = load_reader(SAMPLE.as_bytes(), &CorpusConfig::default()).unwrap();

        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.report.rows_read, 5);
        assert_eq!(corpus.report.duplicates_removed, 2);

        let texts: Vec<&str> = corpus.texts().collect();
        assert_eq!(
            texts,
            vec![
                "Wow... Loved this place.",
                "Crust is not good.",
                "Not tasty and the texture was just nasty.",
            ]
        );
        let sources: Vec<usize> = corpus.documents.iter().map(|d| d.source_index).collect();
        assert_eq!(sources, vec![0, 1, 3]);
        let ids: Vec<usize> = corpus.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_column() {
        let config = CorpusConfig::default().text_column("Text");
        let err = load_reader(SAMPLE.as_bytes(), &config).unwrap_err();
        match err {
            Error::MissingColumn { column, available } => {
                assert_eq!(column, "Text");
                assert_eq!(available, vec!["Review".to_string(), "Liked".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_corpus() {
        let err = load_reader("Review\tLiked\n".as_bytes(), &CorpusConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
    }

    #[test]
    fn test_empty_file() {
        let err = load_reader("".as_bytes(), &CorpusConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));

        let err = load_reader("\n".as_bytes(), &CorpusConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let data = "Review\tLiked\n \t1\ngood food\t1\n";
        let corpus = load_reader(data.as_bytes(), &CorpusConfig::default()).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.report.blank_skipped, 1);
        assert_eq!(corpus.documents[0].source_index, 1);
    }

    #[test]
    fn test_load_path_comma_delimited() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "id,Review\n1,\"Great, friendly staff\"\n2,Cold fries\n").unwrap();

        let config = CorpusConfig::default().delimiter(',');
        let corpus = load_path(file.path(), &config).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.documents[0].text, "Great, friendly staff");
    }
}
