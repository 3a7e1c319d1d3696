//! Forward-only wiring of the stages: documents in, fitted models out.

use tracing::{info, warn};

use crate::config::VocabularyConfig;
use crate::corpus::Document;
use crate::error::{Error, Result};
use crate::preprocessing::Normalizer;
use crate::topic_modeling::{LdaConfig, LdaModel};
use crate::vectorizer::{BowVector, Representation, TfidfModel, WeightVector};
use crate::vocabulary::Dictionary;

/// Everything derived from the corpus before any model is fitted.
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    pub documents: Vec<Document>,
    pub tokens: Vec<Vec<String>>,
    pub dictionary: Dictionary,
    pub bow: Vec<BowVector>,
    pub tfidf_model: TfidfModel,
    pub tfidf: Vec<WeightVector>,
}

pub fn prepare(
    documents: Vec<Document>,
    normalizer: &Normalizer,
    vocabulary: &VocabularyConfig,
) -> Result<PreparedCorpus> {
    if documents.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    let tokens = normalizer.normalize_all(documents.iter().map(|doc| doc.text.as_str()));
    let empty = tokens.iter().filter(|t| t.is_empty()).count();
    if empty > 0 {
        warn!("{} documents have no tokens left after normalization", empty);
    }

    let dictionary = Dictionary::build(&tokens, vocabulary)?;
    let bow: Vec<BowVector> = tokens.iter().map(|doc| dictionary.doc2bow(doc)).collect();
    let tfidf_model = TfidfModel::fit(&bow, &dictionary)?;
    let tfidf = tfidf_model.transform_corpus(&bow)?;

    info!(
        "Prepared {} documents over {} terms",
        documents.len(),
        dictionary.len()
    );
    Ok(PreparedCorpus {
        documents,
        tokens,
        dictionary,
        bow,
        tfidf_model,
        tfidf,
    })
}

impl PreparedCorpus {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(Error::InvalidParameter(format!(
                "document {} out of range (corpus has {} documents)",
                index,
                self.len()
            )));
        }
        Ok(())
    }

    /// Topic scores of a corpus document, vectorized the way the model expects.
    pub fn document_topics(&self, model: &LdaModel, index: usize) -> Result<Vec<(usize, f64)>> {
        self.check_index(index)?;
        match model.representation() {
            Representation::Counts => model.document_topics(&self.bow[index]),
            Representation::Tfidf => model.document_topics(&self.tfidf[index]),
        }
    }

    pub fn fit(&self, representation: Representation, config: LdaConfig) -> Result<LdaModel> {
        match representation {
            Representation::Counts => LdaModel::fit(&self.bow, &self.dictionary, config),
            Representation::Tfidf => LdaModel::fit(&self.tfidf, &self.dictionary, config),
        }
    }

    pub fn scorer<'a>(
        &'a self,
        normalizer: &'a Normalizer,
        model: &'a LdaModel,
    ) -> Result<TopicScorer<'a>> {
        TopicScorer::new(normalizer, &self.dictionary, &self.tfidf_model, model)
    }
}

#[derive(Debug, Clone)]
pub struct FittedVariant {
    pub representation: Representation,
    pub num_topics: usize,
    pub model: LdaModel,
}

/// Fit one model per topic count on each representation. Every fit is
/// independent and gets its own copy of the config.
pub fn fit_variants(
    prepared: &PreparedCorpus,
    topic_counts: &[usize],
    config: &LdaConfig,
) -> Result<Vec<FittedVariant>> {
    let mut variants = Vec::with_capacity(topic_counts.len() * 2);
    for &num_topics in topic_counts {
        for representation in [Representation::Counts, Representation::Tfidf] {
            info!("Fitting {} topic model on {} vectors", num_topics, representation);
            let model = prepared.fit(representation, config.clone().num_topics(num_topics))?;
            variants.push(FittedVariant {
                representation,
                num_topics,
                model,
            });
        }
    }
    Ok(variants)
}

/// Scores raw text against a fitted model using the exact normalizer,
/// dictionary and TF-IDF weighting the model was built from.
#[derive(Debug, Clone, Copy)]
pub struct TopicScorer<'a> {
    normalizer: &'a Normalizer,
    dictionary: &'a Dictionary,
    tfidf_model: &'a TfidfModel,
    model: &'a LdaModel,
}

impl<'a> TopicScorer<'a> {
    pub fn new(
        normalizer: &'a Normalizer,
        dictionary: &'a Dictionary,
        tfidf_model: &'a TfidfModel,
        model: &'a LdaModel,
    ) -> Result<Self> {
        tfidf_model.check_dictionary(dictionary)?;
        if model.vocabulary() != dictionary.tokens() {
            return Err(Error::VocabularyMismatch(format!(
                "model has {} terms, dictionary has {}",
                model.num_terms(),
                dictionary.len()
            )));
        }
        Ok(TopicScorer {
            normalizer,
            dictionary,
            tfidf_model,
            model,
        })
    }

    pub fn model(&self) -> &LdaModel {
        self.model
    }

    pub fn bow(&self, raw: &str) -> BowVector {
        self.dictionary.doc2bow(&self.normalizer.normalize(raw))
    }

    /// Full topic distribution of raw text.
    pub fn distribution(&self, raw: &str) -> Result<Vec<f64>> {
        let bow = self.bow(raw);
        match self.model.representation() {
            Representation::Counts => self.model.topic_distribution(&bow),
            Representation::Tfidf => {
                let weights = self.tfidf_model.transform_with(&bow, self.dictionary)?;
                self.model.topic_distribution(&weights)
            }
        }
    }

    /// `(topic, score)` pairs above the model's minimum probability.
    pub fn score(&self, raw: &str) -> Result<Vec<(usize, f64)>> {
        let bow = self.bow(raw);
        match self.model.representation() {
            Representation::Counts => self.model.document_topics(&bow),
            Representation::Tfidf => {
                let weights = self.tfidf_model.transform_with(&bow, self.dictionary)?;
                self.model.document_topics(&weights)
            }
        }
    }
}
