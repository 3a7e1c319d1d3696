//! Token dictionary: a frozen token <-> id mapping with corpus statistics.

use std::collections::HashMap;

use counter::Counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{PruneConfig, VocabularyConfig};
use crate::error::{Error, Result};
use crate::vectorizer::BowVector;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    token2id: HashMap<String, usize>,
    id2token: Vec<String>,
    /// Number of documents each token appears in
    dfs: Vec<usize>,
    /// Total occurrences of each token
    cfs: Vec<usize>,
    num_docs: usize,
    num_pos: usize,
}

impl Dictionary {
    /// Build from token sequences, applying pruning if configured.
    pub fn build(documents: &[Vec<String>], config: &VocabularyConfig) -> Result<Self> {
        config.validate()?;

        let mut dictionary = Dictionary::default();
        for doc in documents {
            dictionary.add_document(doc);
        }
        info!(
            "Built dictionary with {} unique tokens from {} documents ({} positions)",
            dictionary.len(),
            dictionary.num_docs,
            dictionary.num_pos
        );

        if let Some(prune) = &config.prune {
            dictionary.filter_extremes(prune)?;
        }
        Ok(dictionary)
    }

    // Unseen tokens of one document get ids in sorted token order, so the
    // mapping only depends on the input sequences and their order.
    fn add_document(&mut self, tokens: &[String]) {
        let counts: Counter<&String> = tokens.iter().collect();

        let mut missing: Vec<&String> = counts
            .keys()
            .filter(|token| !self.token2id.contains_key(token.as_str()))
            .copied()
            .collect();
        missing.sort();
        for token in missing {
            let id = self.id2token.len();
            self.token2id.insert(token.clone(), id);
            self.id2token.push(token.clone());
            self.dfs.push(0);
            self.cfs.push(0);
        }

        for (token, count) in counts.iter() {
            let id = self.token2id[token.as_str()];
            self.dfs[id] += 1;
            self.cfs[id] += *count;
        }

        self.num_docs += 1;
        self.num_pos += tokens.len();
    }

    /// Drop tokens in fewer than `no_below` documents or more than `no_above`
    /// of all documents, keep the `keep_n` most frequent, then compact ids.
    pub fn filter_extremes(&mut self, prune: &PruneConfig) -> Result<()> {
        if !(prune.no_above > 0.0 && prune.no_above <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "no_above must be in (0, 1], got {}",
                prune.no_above
            )));
        }
        let before = self.len();
        let no_above_abs = (prune.no_above * self.num_docs as f64) as usize;

        let mut good: Vec<usize> = (0..self.len())
            .filter(|&id| self.dfs[id] >= prune.no_below && self.dfs[id] <= no_above_abs)
            .collect();

        if let Some(keep_n) = prune.keep_n {
            // Most frequent first; ties keep the lower id.
            good.sort_by(|&a, &b| self.dfs[b].cmp(&self.dfs[a]).then(a.cmp(&b)));
            good.truncate(keep_n);
        }
        good.sort_unstable();

        let mut token2id = HashMap::with_capacity(good.len());
        let mut id2token = Vec::with_capacity(good.len());
        let mut dfs = Vec::with_capacity(good.len());
        let mut cfs = Vec::with_capacity(good.len());
        for old_id in good {
            token2id.insert(self.id2token[old_id].clone(), id2token.len());
            id2token.push(self.id2token[old_id].clone());
            dfs.push(self.dfs[old_id]);
            cfs.push(self.cfs[old_id]);
        }
        self.token2id = token2id;
        self.id2token = id2token;
        self.dfs = dfs;
        self.cfs = cfs;

        info!(
            "Pruned dictionary from {} to {} tokens (no_below={}, no_above={})",
            before,
            self.len(),
            prune.no_below,
            prune.no_above
        );
        Ok(())
    }

    /// Count vector for a token sequence; unknown tokens are dropped.
    pub fn doc2bow(&self, tokens: &[String]) -> BowVector {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        let mut unknown = 0usize;
        for token in tokens {
            match self.token2id.get(token) {
                Some(&id) => *counts.entry(id).or_insert(0) += 1,
                None => unknown += 1,
            }
        }
        if unknown > 0 {
            debug!("Dropped {} out-of-vocabulary tokens", unknown);
        }

        let mut entries: Vec<(usize, u32)> = counts.into_iter().collect();
        entries.sort_unstable_by_key(|&(id, _)| id);
        BowVector::from_sorted(entries)
    }

    pub fn id_of(&self, token: &str) -> Option<usize> {
        self.token2id.get(token).copied()
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.id2token.get(id).map(|s| s.as_str())
    }

    pub fn contains_id(&self, id: usize) -> bool {
        id < self.id2token.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.id2token
    }

    pub fn document_frequency(&self, id: usize) -> Option<usize> {
        self.dfs.get(id).copied()
    }

    pub fn collection_frequency(&self, id: usize) -> Option<usize> {
        self.cfs.get(id).copied()
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn num_pos(&self) -> usize {
        self.num_pos
    }

    pub fn len(&self) -> usize {
        self.id2token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2token.is_empty()
    }
}
