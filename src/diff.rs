//! Topic-by-topic dissimilarity between two fitted models.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topic_modeling::LdaModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Overlap of the top-word sets
    Jaccard,
    Hellinger,
    KullbackLeibler,
    JensenShannon,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Distance::Jaccard => "jaccard",
            Distance::Hellinger => "hellinger",
            Distance::KullbackLeibler => "kullback_leibler",
            Distance::JensenShannon => "jensen_shannon",
        };
        f.write_str(name)
    }
}

impl FromStr for Distance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jaccard" => Ok(Distance::Jaccard),
            "hellinger" => Ok(Distance::Hellinger),
            "kullback_leibler" | "kl" => Ok(Distance::KullbackLeibler),
            "jensen_shannon" | "js" => Ok(Distance::JensenShannon),
            other => Err(Error::InvalidParameter(format!("unknown distance '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub distance: Distance,
    /// Top words per topic used for jaccard sets and annotations
    pub num_words: usize,
    /// Max tokens listed per annotation side
    pub n_ann_terms: usize,
    /// Only compare topic i with topic i
    pub diagonal: bool,
    pub annotation: bool,
    /// Scale the matrix so its maximum is 1
    pub normed: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        DiffConfig {
            distance: Distance::Jaccard,
            num_words: 100,
            n_ann_terms: 10,
            diagonal: false,
            annotation: true,
            normed: true,
        }
    }
}

impl DiffConfig {
    pub fn distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    pub fn num_words(mut self, n: usize) -> Self {
        self.num_words = n;
        self
    }

    pub fn diagonal(mut self, enable: bool) -> Self {
        self.diagonal = enable;
        self
    }

    pub fn normed(mut self, enable: bool) -> Self {
        self.normed = enable;
        self
    }
}

/// Shared (`+++`) and distinct (`---`) top words of a topic pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub shared: Vec<String>,
    pub distinct: Vec<String>,
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+++ {}<br>--- {}", self.shared.join(", "), self.distinct.join(", "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDiff {
    /// Rows follow the first model's topics. In diagonal mode every row has
    /// a single value, the distance between topic i of both models.
    pub matrix: Vec<Vec<f64>>,
    pub annotations: Option<Vec<Vec<Annotation>>>,
    pub distance: Option<Distance>,
    pub diagonal: bool,
}

impl TopicDiff {
    /// What a perfectly separated model would show: ones with a zero diagonal.
    pub fn ideal(num_topics: usize) -> Self {
        let matrix = (0..num_topics)
            .map(|i| (0..num_topics).map(|j| if i == j { 0.0 } else { 1.0 }).collect())
            .collect();
        TopicDiff {
            matrix,
            annotations: None,
            distance: None,
            diagonal: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.matrix.len()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.matrix.get(i).and_then(|row| row.get(j)).copied()
    }
}

impl fmt::Display for TopicDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.matrix.first().map(|row| row.len()).unwrap_or(0);
        write!(f, "{:>6}", "")?;
        for j in 0..columns {
            write!(f, "{:>8}", j)?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "{:>6}", i)?;
            for value in row {
                write!(f, "{:>8.3}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Compare every topic of `first` with every topic of `second` (or only the
/// matching ones in diagonal mode). Neither model is modified.
pub fn diff(first: &LdaModel, second: &LdaModel, config: &DiffConfig) -> Result<TopicDiff> {
    let (k1, k2) = (first.num_topics(), second.num_topics());
    if config.diagonal && k1 != k2 {
        return Err(Error::TopicCountMismatch { left: k1, right: k2 });
    }
    if config.distance != Distance::Jaccard && first.vocabulary() != second.vocabulary() {
        return Err(Error::VocabularyMismatch(format!(
            "{} distance needs models over the same dictionary ({} vs {} terms)",
            config.distance,
            first.num_terms(),
            second.num_terms()
        )));
    }

    let top_first = top_word_sets(first, config.num_words)?;
    let top_second = top_word_sets(second, config.num_words)?;
    let dist_first = first.topic_term_matrix();
    let dist_second = second.topic_term_matrix();

    let pairs: Vec<Vec<(usize, usize)>> = if config.diagonal {
        (0..k1).map(|i| vec![(i, i)]).collect()
    } else {
        (0..k1).map(|i| (0..k2).map(|j| (i, j)).collect()).collect()
    };

    let mut matrix: Vec<Vec<f64>> = pairs
        .iter()
        .map(|row| {
            row.iter()
                .map(|&(i, j)| match config.distance {
                    Distance::Jaccard => jaccard(&top_first[i], &top_second[j]),
                    Distance::Hellinger => hellinger(&dist_first[i], &dist_second[j]),
                    Distance::KullbackLeibler => kullback_leibler(&dist_first[i], &dist_second[j]),
                    Distance::JensenShannon => jensen_shannon(&dist_first[i], &dist_second[j]),
                })
                .collect()
        })
        .collect();

    if config.normed {
        let max = matrix.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        if max.abs() > 1e-8 {
            for value in matrix.iter_mut().flatten() {
                *value /= max;
            }
        }
    }

    let annotations = config.annotation.then(|| {
        pairs
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&(i, j)| annotate(&top_first[i], &top_second[j], config.n_ann_terms))
                    .collect()
            })
            .collect()
    });

    Ok(TopicDiff {
        matrix,
        annotations,
        distance: Some(config.distance),
        diagonal: config.diagonal,
    })
}

fn top_word_sets(model: &LdaModel, num_words: usize) -> Result<Vec<BTreeSet<String>>> {
    (0..model.num_topics())
        .map(|topic| {
            let ids = model.top_term_ids(topic, num_words)?;
            Ok(ids.into_iter().map(|id| model.vocabulary()[id].clone()).collect())
        })
        .collect()
}

fn annotate(a: &BTreeSet<String>, b: &BTreeSet<String>, n_ann_terms: usize) -> Annotation {
    // BTreeSet iteration is sorted, so the selection is alphabetical
    Annotation {
        shared: a.intersection(b).take(n_ann_terms).cloned().collect(),
        distinct: a.symmetric_difference(b).take(n_ann_terms).cloned().collect(),
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    1.0 - a.intersection(b).count() as f64 / union as f64
}

fn hellinger(p: &[f64], q: &[f64]) -> f64 {
    let sum: f64 = p
        .iter()
        .zip(q)
        .map(|(a, b)| (a.sqrt() - b.sqrt()).powi(2))
        .sum();
    (0.5 * sum).sqrt()
}

fn kullback_leibler(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .filter(|(a, _)| **a > 0.0)
        .map(|(a, b)| a * (a / b).ln())
        .sum()
}

fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p.iter().zip(q).map(|(a, b)| 0.5 * (a + b)).collect();
    0.5 * kullback_leibler(p, &m) + 0.5 * kullback_leibler(q, &m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabularyConfig;
    use crate::topic_modeling::LdaConfig;
    use crate::vocabulary::Dictionary;

    fn fit(topics: usize, seed: u64) -> LdaModel {
        let raw = [
            "burger fries shake burger",
            "fries burger onion",
            "sushi roll tuna sushi",
            "tuna roll salmon",
            "coffee pastry latte",
            "latte coffee croissant pastry",
        ];
        let docs: Vec<Vec<String>> = raw
            .iter()
            .map(|d| d.split_whitespace().map(|t| t.to_string()).collect())
            .collect();
        let dictionary = Dictionary::build(&docs, &VocabularyConfig::default()).unwrap();
        let bow: Vec<_> = docs.iter().map(|d| dictionary.doc2bow(d)).collect();
        let config = LdaConfig::new(topics).passes(10).random_seed(seed);
        LdaModel::fit(&bow, &dictionary, config).unwrap()
    }

    #[test]
    fn test_self_diff_has_zero_diagonal() {
        let model = fit(3, 1);
        for distance in [
            Distance::Jaccard,
            Distance::Hellinger,
            Distance::KullbackLeibler,
            Distance::JensenShannon,
        ] {
            let config = DiffConfig::default().distance(distance).num_words(5);
            let result = diff(&model, &model, &config).unwrap();
            assert_eq!(result.rows(), 3);
            for i in 0..3 {
                assert_eq!(result.get(i, i), Some(0.0), "{distance} diagonal");
                for j in 0..3 {
                    let value = result.get(i, j).unwrap();
                    assert!((0.0..=1.0).contains(&value));
                }
            }
        }
    }

    #[test]
    fn test_annotations() {
        let model = fit(2, 3);
        let config = DiffConfig::default().num_words(4);
        let result = diff(&model, &model, &config).unwrap();
        let annotations = result.annotations.unwrap();

        let same = &annotations[0][0];
        assert_eq!(same.shared.len(), 4);
        assert!(same.distinct.is_empty());
        let mut sorted = same.shared.clone();
        sorted.sort();
        assert_eq!(&sorted, &same.shared);
        assert!(same.to_string().starts_with("+++ "));
        assert!(same.to_string().contains("<br>--- "));
    }

    #[test]
    fn test_diagonal_mode() {
        let a = fit(3, 1);
        let b = fit(3, 2);
        let result = diff(&a, &b, &DiffConfig::default().diagonal(true)).unwrap();
        assert_eq!(result.rows(), 3);
        assert!(result.matrix.iter().all(|row| row.len() == 1));

        let c = fit(2, 1);
        let err = diff(&a, &c, &DiffConfig::default().diagonal(true)).unwrap_err();
        assert!(matches!(err, Error::TopicCountMismatch { left: 3, right: 2 }));
    }

    #[test]
    fn test_diff_leaves_models_untouched() {
        let a = fit(3, 1);
        let b = fit(2, 5);
        let before = a.topic_term_matrix();
        let result = diff(&a, &b, &DiffConfig::default().distance(Distance::Hellinger)).unwrap();
        assert_eq!(result.rows(), 3);
        assert_eq!(result.matrix[0].len(), 2);
        assert_eq!(a.topic_term_matrix(), before);
    }

    #[test]
    fn test_ideal_and_parse() {
        let ideal = TopicDiff::ideal(3);
        assert_eq!(ideal.get(1, 1), Some(0.0));
        assert_eq!(ideal.get(0, 2), Some(1.0));
        assert_eq!("hellinger".parse::<Distance>().unwrap(), Distance::Hellinger);
        assert_eq!("KL".parse::<Distance>().unwrap(), Distance::KullbackLeibler);
        assert!("cosine".parse::<Distance>().is_err());
    }
}
