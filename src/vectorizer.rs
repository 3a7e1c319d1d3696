//! Sparse document vectors and TF-IDF weighting.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::vocabulary::Dictionary;

/// Weights smaller than this are dropped from TF-IDF vectors.
const WEIGHT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Representation {
    Counts,
    Tfidf,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Counts => f.write_str("count"),
            Representation::Tfidf => f.write_str("tf-idf"),
        }
    }
}

/// A sparse vector over a dictionary's id space.
pub trait TermVector {
    fn representation(&self) -> Representation;

    /// `(token id, weight)` pairs sorted by id, each id at most once.
    fn weighted_entries(&self) -> Vec<(usize, f64)>;

    fn max_id(&self) -> Option<usize> {
        self.weighted_entries().last().map(|&(id, _)| id)
    }
}

/// Bag-of-words counts for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BowVector(Vec<(usize, u32)>);

impl BowVector {
    pub(crate) fn from_sorted(entries: Vec<(usize, u32)>) -> Self {
        BowVector(entries)
    }

    pub fn entries(&self) -> &[(usize, u32)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|&(_, count)| count).sum()
    }
}

impl TermVector for BowVector {
    fn representation(&self) -> Representation {
        Representation::Counts
    }

    fn weighted_entries(&self) -> Vec<(usize, f64)> {
        self.0.iter().map(|&(id, count)| (id, count as f64)).collect()
    }
}

/// TF-IDF weights for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightVector(Vec<(usize, f64)>);

impl WeightVector {
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TermVector for WeightVector {
    fn representation(&self) -> Representation {
        Representation::Tfidf
    }

    fn weighted_entries(&self) -> Vec<(usize, f64)> {
        self.0.clone()
    }
}

/// Corpus-wide TF-IDF weighting, fitted once and reused for every document.
///
/// Weight of a term is `tf * log2(N / df)`, and each document vector is
/// scaled to unit length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfModel {
    idfs: Vec<f64>,
    num_docs: usize,
    num_terms: usize,
    dictionary_fingerprint: u64,
}

/// Hash of the id to token mapping and document count of a dictionary.
fn fingerprint(dictionary: &Dictionary) -> u64 {
    let mut hasher = DefaultHasher::new();
    dictionary.tokens().hash(&mut hasher);
    dictionary.num_docs().hash(&mut hasher);
    hasher.finish()
}

impl TfidfModel {
    pub fn fit(corpus: &[BowVector], dictionary: &Dictionary) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let num_terms = dictionary.len();
        let mut dfs = vec![0usize; num_terms];
        for bow in corpus {
            for &(id, _) in bow.entries() {
                let Some(df) = dfs.get_mut(id) else {
                    return Err(Error::VocabularyMismatch(format!(
                        "token id {} not in dictionary of {} tokens",
                        id, num_terms
                    )));
                };
                *df += 1;
            }
        }

        let num_docs = corpus.len();
        let idfs = dfs
            .iter()
            .map(|&df| {
                if df == 0 {
                    0.0
                } else {
                    (num_docs as f64 / df as f64).log2()
                }
            })
            .collect();

        info!("Fitted TF-IDF model on {} documents, {} terms", num_docs, num_terms);
        Ok(TfidfModel {
            idfs,
            num_docs,
            num_terms,
            dictionary_fingerprint: fingerprint(dictionary),
        })
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    pub fn idf(&self, id: usize) -> Option<f64> {
        self.idfs.get(id).copied()
    }

    /// Check that a dictionary is the one this model was fitted against.
    pub fn check_dictionary(&self, dictionary: &Dictionary) -> Result<()> {
        if dictionary.len() != self.num_terms || dictionary.num_docs() != self.num_docs {
            return Err(Error::VocabularyMismatch(format!(
                "TF-IDF model fitted on {} terms / {} documents, dictionary has {} / {}",
                self.num_terms,
                self.num_docs,
                dictionary.len(),
                dictionary.num_docs()
            )));
        }
        if fingerprint(dictionary) != self.dictionary_fingerprint {
            return Err(Error::VocabularyMismatch(
                "TF-IDF model was fitted against a dictionary with different tokens".to_string(),
            ));
        }
        Ok(())
    }

    /// Weight a count vector after checking it was built with `dictionary`,
    /// the one this model was fitted against.
    pub fn transform_with(&self, bow: &BowVector, dictionary: &Dictionary) -> Result<WeightVector> {
        self.check_dictionary(dictionary)?;
        self.transform(bow)
    }

    pub fn transform(&self, bow: &BowVector) -> Result<WeightVector> {
        let mut weights = Vec::with_capacity(bow.len());
        for &(id, count) in bow.entries() {
            let Some(idf) = self.idf(id) else {
                return Err(Error::VocabularyMismatch(format!(
                    "token id {} outside the {} terms the TF-IDF model was fitted on",
                    id, self.num_terms
                )));
            };
            weights.push((id, count as f64 * idf));
        }

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in weights.iter_mut() {
                *w /= norm;
            }
        }
        weights.retain(|&(_, w)| w.abs() > WEIGHT_EPSILON);

        Ok(WeightVector(weights))
    }

    pub fn transform_corpus(&self, corpus: &[BowVector]) -> Result<Vec<WeightVector>> {
        corpus.iter().map(|bow| self.transform(bow)).collect()
    }
}
