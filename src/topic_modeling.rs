//! Latent Dirichlet Allocation.
//!
//! Fitted with online variational Bayes: every chunk of documents runs a
//! per-document variational E-step, and the topic-word statistics are blended
//! in with a decaying step size. Input weights may be fractional, so the same
//! trainer works on counts and on TF-IDF vectors.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::digamma;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::vectorizer::{BowVector, Representation, TermVector};
use crate::vocabulary::Dictionary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeledTopic {
    pub id: usize,
    pub name: String,
    pub words: Vec<(String, f64)>, // Word and its probability in this topic
    pub coherence_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdaConfig {
    pub num_topics: usize,
    pub passes: usize,
    pub iterations: usize, // Max E-step iterations per document
    pub chunksize: usize,
    pub alpha: Option<f64>, // Document-topic prior, 1/K when unset
    pub eta: Option<f64>,   // Topic-word prior, 1/K when unset
    pub decay: f64,
    pub offset: f64,
    pub gamma_threshold: f64,
    pub minimum_probability: f64,
    pub random_seed: Option<u64>,
}

impl Default for LdaConfig {
    fn default() -> Self {
        LdaConfig {
            num_topics: 10,
            passes: 1,
            iterations: 50,
            chunksize: 2000,
            alpha: None,
            eta: None,
            decay: 0.5,
            offset: 1.0,
            gamma_threshold: 0.001,
            minimum_probability: 0.01,
            random_seed: None,
        }
    }
}

impl LdaConfig {
    pub fn new(num_topics: usize) -> Self {
        LdaConfig {
            num_topics,
            ..Default::default()
        }
    }

    pub fn num_topics(mut self, n: usize) -> Self {
        self.num_topics = n;
        self
    }

    pub fn passes(mut self, n: usize) -> Self {
        self.passes = n;
        self
    }

    pub fn iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    pub fn chunksize(mut self, n: usize) -> Self {
        self.chunksize = n;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn minimum_probability(mut self, p: f64) -> Self {
        self.minimum_probability = p;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_topics == 0 {
            return Err(Error::InvalidTopicCount);
        }
        if self.passes == 0 || self.iterations == 0 || self.chunksize == 0 {
            return Err(Error::InvalidParameter(
                "passes, iterations and chunksize must be positive".into(),
            ));
        }
        for (name, prior) in [("alpha", self.alpha), ("eta", self.eta)] {
            if let Some(value) = prior {
                if !(value > 0.0) {
                    return Err(Error::InvalidParameter(format!("{name} must be positive")));
                }
            }
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(Error::InvalidParameter("decay must be in (0, 1]".into()));
        }
        if self.offset < 0.0 || self.gamma_threshold < 0.0 || self.minimum_probability < 0.0 {
            return Err(Error::InvalidParameter(
                "offset, gamma_threshold and minimum_probability must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// A fitted LDA model. Immutable once built; every instance owns its state.
#[derive(Debug, Clone)]
pub struct LdaModel {
    config: LdaConfig,
    representation: Representation,
    seed: u64,
    alpha: Vec<f64>,
    eta: f64,
    lambda: Vec<Vec<f64>>,        // Topics x Words, variational topic-word parameters
    exp_elog_beta: Vec<Vec<f64>>, // Topics x Words
    vocabulary: Vec<String>,
}

impl LdaModel {
    pub fn fit<V: TermVector>(
        corpus: &[V],
        dictionary: &Dictionary,
        config: LdaConfig,
    ) -> Result<Self> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if dictionary.is_empty() {
            return Err(Error::VocabularyMismatch("dictionary is empty".into()));
        }

        // Step 1: Collect documents and check they share one id space and representation
        let representation = corpus[0].representation();
        let num_terms = dictionary.len();
        let mut documents = Vec::with_capacity(corpus.len());
        for doc in corpus {
            if doc.representation() != representation {
                return Err(Error::RepresentationMismatch {
                    expected: representation,
                    actual: doc.representation(),
                });
            }
            let entries = doc.weighted_entries();
            check_ids(&entries, num_terms)?;
            documents.push(entries);
        }

        let num_topics = config.num_topics;
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let init = init_distribution()?;

        let alpha = vec![config.alpha.unwrap_or(1.0 / num_topics as f64); num_topics];
        let eta = config.eta.unwrap_or(1.0 / num_topics as f64);

        // Step 2: Random initialization of the sufficient statistics
        let mut sstats: Vec<Vec<f64>> = (0..num_topics)
            .map(|_| (0..num_terms).map(|_| init.sample(&mut rng)).collect())
            .collect();
        let mut exp_elog_beta = exp_dirichlet_expectation_rows(&sstats);

        info!(
            "Fitting LDA: {} topics, {} {} documents, {} terms, {} passes (seed {})",
            num_topics,
            documents.len(),
            representation,
            num_terms,
            config.passes,
            seed
        );

        // Step 3: Online variational Bayes over chunks
        let num_docs = documents.len() as f64;
        let mut num_updates = 0usize;
        for pass in 0..config.passes {
            let mut total_change = 0.0;
            for chunk in documents.chunks(config.chunksize) {
                let progress = num_updates as f64 / config.chunksize as f64;
                let rho = (config.offset + pass as f64 + progress).powf(-config.decay);

                let mut chunk_sstats = vec![vec![0.0; num_terms]; num_topics];
                for entries in chunk {
                    infer_gamma(
                        entries,
                        &alpha,
                        &exp_elog_beta,
                        &config,
                        &init,
                        &mut rng,
                        Some(&mut chunk_sstats),
                    );
                }

                // M-step: blend the chunk estimate into the running statistics
                let scale = num_docs / chunk.len() as f64;
                for (topic, row) in sstats.iter_mut().enumerate() {
                    for (word, value) in row.iter_mut().enumerate() {
                        let estimate =
                            chunk_sstats[topic][word] * exp_elog_beta[topic][word] * scale;
                        let blended = (1.0 - rho) * *value + rho * estimate;
                        total_change += (blended - *value).abs();
                        *value = blended;
                    }
                }
                exp_elog_beta = exp_dirichlet_expectation_rows(&with_prior(&sstats, eta));
                num_updates += chunk.len();
            }
            debug!(
                "Pass {}/{}: mean topic-word change {:.6}",
                pass + 1,
                config.passes,
                total_change / (num_topics * num_terms) as f64
            );
        }

        let lambda = with_prior(&sstats, eta);
        Ok(LdaModel {
            config: LdaConfig {
                random_seed: Some(seed),
                ..config
            },
            representation,
            seed,
            alpha,
            eta,
            lambda,
            exp_elog_beta,
            vocabulary: dictionary.tokens().to_vec(),
        })
    }

    pub fn num_topics(&self) -> usize {
        self.lambda.len()
    }

    pub fn num_terms(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &LdaConfig {
        &self.config
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Topic-word probabilities, one row per topic.
    pub fn topic_term_matrix(&self) -> Vec<Vec<f64>> {
        self.lambda.iter().map(|row| normalize(row)).collect()
    }

    fn check_topic(&self, topic: usize) -> Result<()> {
        if topic >= self.num_topics() {
            return Err(Error::TopicOutOfRange {
                topic,
                num_topics: self.num_topics(),
            });
        }
        Ok(())
    }

    /// Ids of the `topn` most probable words of a topic, best first.
    pub fn top_term_ids(&self, topic: usize, topn: usize) -> Result<Vec<usize>> {
        self.check_topic(topic)?;
        let row = &self.lambda[topic];
        let mut ids: Vec<usize> = (0..row.len()).collect();
        // Stable sort: equal probabilities keep id order
        ids.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
        ids.truncate(topn);
        Ok(ids)
    }

    pub fn show_topic(&self, topic: usize, topn: usize) -> Result<Vec<(String, f64)>> {
        let ids = self.top_term_ids(topic, topn)?;
        let total: f64 = self.lambda[topic].iter().sum();
        Ok(ids
            .into_iter()
            .map(|id| (self.vocabulary[id].clone(), self.lambda[topic][id] / total))
            .collect())
    }

    pub fn show_topics(&self, num_words: usize) -> Vec<ModeledTopic> {
        (0..self.num_topics())
            .filter_map(|topic| self.show_topic(topic, num_words).ok().map(|words| (topic, words)))
            .map(|(id, words)| ModeledTopic {
                id,
                name: topic_name(&words),
                words,
                coherence_score: None,
            })
            .collect()
    }

    /// Topics with their UMass coherence over a count corpus.
    pub fn show_topics_with_coherence(
        &self,
        num_words: usize,
        corpus: &[BowVector],
    ) -> Result<Vec<ModeledTopic>> {
        let mut topics = self.show_topics(num_words);
        for topic in topics.iter_mut() {
            topic.coherence_score = Some(self.umass_coherence(topic.id, num_words, corpus)?);
        }
        Ok(topics)
    }

    /// `0.034*"food" + 0.021*"place" + ...`
    pub fn print_topic(&self, topic: usize, topn: usize) -> Result<String> {
        let words = self.show_topic(topic, topn)?;
        Ok(words
            .iter()
            .map(|(word, prob)| format!("{:.3}*\"{}\"", prob, word))
            .collect::<Vec<_>>()
            .join(" + "))
    }

    /// Full topic distribution of one document.
    ///
    /// Inference starts from a generator seeded with the model seed, so the
    /// same document always gets the same scores.
    pub fn topic_distribution<V: TermVector>(&self, doc: &V) -> Result<Vec<f64>> {
        if doc.representation() != self.representation {
            return Err(Error::RepresentationMismatch {
                expected: self.representation,
                actual: doc.representation(),
            });
        }
        let entries = doc.weighted_entries();
        check_ids(&entries, self.num_terms())?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let init = init_distribution()?;
        let gamma = infer_gamma(
            &entries,
            &self.alpha,
            &self.exp_elog_beta,
            &self.config,
            &init,
            &mut rng,
            None,
        );
        Ok(normalize(&gamma))
    }

    /// `(topic, score)` pairs above the minimum probability, by topic id.
    pub fn document_topics<V: TermVector>(&self, doc: &V) -> Result<Vec<(usize, f64)>> {
        let threshold = self.config.minimum_probability.max(1e-8);
        Ok(self
            .topic_distribution(doc)?
            .into_iter()
            .enumerate()
            .filter(|&(_, p)| p >= threshold)
            .collect())
    }

    pub fn primary_topic<V: TermVector>(&self, doc: &V) -> Result<usize> {
        let distribution = self.topic_distribution(doc)?;
        Ok(distribution
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0))
    }

    /// UMass coherence of a topic's top words; closer to zero is more coherent.
    pub fn umass_coherence(&self, topic: usize, topn: usize, corpus: &[BowVector]) -> Result<f64> {
        let top = self.top_term_ids(topic, topn)?;
        let doc_sets: Vec<HashSet<usize>> = top
            .iter()
            .map(|&word| {
                corpus
                    .iter()
                    .enumerate()
                    .filter(|(_, bow)| bow.entries().iter().any(|&(id, _)| id == word))
                    .map(|(doc, _)| doc)
                    .collect()
            })
            .collect();

        let mut score = 0.0;
        let mut pairs = 0usize;
        for i in 1..top.len() {
            for j in 0..i {
                let d_j = doc_sets[j].len() as f64;
                if d_j == 0.0 {
                    continue;
                }
                let co = doc_sets[i].intersection(&doc_sets[j]).count() as f64;
                score += ((co + 1.0) / d_j).ln();
                pairs += 1;
            }
        }
        Ok(if pairs > 0 { score / pairs as f64 } else { 0.0 })
    }
}

fn check_ids(entries: &[(usize, f64)], num_terms: usize) -> Result<()> {
    if let Some(&(id, _)) = entries.iter().find(|&&(id, _)| id >= num_terms) {
        return Err(Error::VocabularyMismatch(format!(
            "token id {} outside the {} terms of the dictionary",
            id, num_terms
        )));
    }
    Ok(())
}

fn init_distribution() -> Result<Gamma<f64>> {
    Gamma::new(100.0, 0.01).map_err(|e| Error::InvalidParameter(e.to_string()))
}

fn topic_name(words: &[(String, f64)]) -> String {
    if words.is_empty() {
        return "Topic".to_string();
    }
    let top_words: Vec<&str> = words.iter().take(3).map(|(word, _)| word.as_str()).collect();
    top_words.join("-")
}

/// Variational E-step for one document; returns its gamma.
///
/// When `sstats` is given, the document's expected topic-word counts are
/// added to it (still to be multiplied by `exp_elog_beta`).
fn infer_gamma(
    entries: &[(usize, f64)],
    alpha: &[f64],
    exp_elog_beta: &[Vec<f64>],
    config: &LdaConfig,
    init: &Gamma<f64>,
    rng: &mut StdRng,
    sstats: Option<&mut Vec<Vec<f64>>>,
) -> Vec<f64> {
    let num_topics = alpha.len();
    if entries.is_empty() {
        return alpha.to_vec();
    }

    let mut gamma: Vec<f64> = (0..num_topics).map(|_| init.sample(rng)).collect();
    let mut exp_elog_theta = exp_dirichlet_expectation(&gamma);
    let mut phinorm = phi_normalizer(entries, &exp_elog_theta, exp_elog_beta);

    for _ in 0..config.iterations {
        let last_gamma = gamma.clone();
        for topic in 0..num_topics {
            let expected: f64 = entries
                .iter()
                .zip(phinorm.iter())
                .map(|(&(id, weight), norm)| weight / norm * exp_elog_beta[topic][id])
                .sum();
            gamma[topic] = alpha[topic] + exp_elog_theta[topic] * expected;
        }
        exp_elog_theta = exp_dirichlet_expectation(&gamma);
        phinorm = phi_normalizer(entries, &exp_elog_theta, exp_elog_beta);

        let mean_change = gamma
            .iter()
            .zip(last_gamma.iter())
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / num_topics as f64;
        if mean_change < config.gamma_threshold {
            break;
        }
    }

    if let Some(sstats) = sstats {
        for (topic, row) in sstats.iter_mut().enumerate() {
            for (&(id, weight), norm) in entries.iter().zip(phinorm.iter()) {
                row[id] += exp_elog_theta[topic] * weight / norm;
            }
        }
    }

    gamma
}

fn phi_normalizer(
    entries: &[(usize, f64)],
    exp_elog_theta: &[f64],
    exp_elog_beta: &[Vec<f64>],
) -> Vec<f64> {
    entries
        .iter()
        .map(|&(id, _)| {
            exp_elog_theta
                .iter()
                .zip(exp_elog_beta.iter())
                .map(|(theta, beta)| theta * beta[id])
                .sum::<f64>()
                + 1e-100
        })
        .collect()
}

/// `exp(E[log x])` for `x ~ Dirichlet(params)`.
fn exp_dirichlet_expectation(params: &[f64]) -> Vec<f64> {
    let total = digamma(params.iter().sum());
    params.iter().map(|&p| (digamma(p) - total).exp()).collect()
}

fn exp_dirichlet_expectation_rows(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter().map(|row| exp_dirichlet_expectation(row)).collect()
}

fn with_prior(sstats: &[Vec<f64>], eta: f64) -> Vec<Vec<f64>> {
    sstats
        .iter()
        .map(|row| row.iter().map(|v| v + eta).collect())
        .collect()
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / values.len() as f64; values.len()];
    }
    values.iter().map(|v| v / total).collect()
}
