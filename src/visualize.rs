//! HTML heatmaps of topic diffs and LDAvis-style topic summaries.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::diff::{diff, DiffConfig, Distance, TopicDiff};
use crate::error::{Error, Result};
use crate::topic_modeling::LdaModel;
use crate::vectorizer::{Representation, TermVector};
use crate::vocabulary::Dictionary;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.32.0.min.js";
const FIGURE_SIZE: u32 = 950;

/// Default weight of the topic-specific probability in the relevance score.
pub const DEFAULT_RELEVANCE_LAMBDA: f64 = 0.6;

/// Top words per topic compared in the self-diff heatmaps.
pub const HEATMAP_NUM_WORDS: usize = 50;

/// A titled diff and the file name its page is written under.
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub title: String,
    pub file_name: String,
    pub diff: TopicDiff,
}

/// Each model compared with itself: jaccard and hellinger on the TF-IDF
/// model, jaccard on the count model.
pub fn self_diff_heatmaps(tfidf_model: &LdaModel, count_model: &LdaModel) -> Result<Vec<Heatmap>> {
    for (model, expected) in [
        (tfidf_model, Representation::Tfidf),
        (count_model, Representation::Counts),
    ] {
        if model.representation() != expected {
            return Err(Error::RepresentationMismatch {
                expected,
                actual: model.representation(),
            });
        }
    }

    [
        (tfidf_model, Distance::Jaccard, "tfidf_jaccard.html"),
        (tfidf_model, Distance::Hellinger, "tfidf_hellinger.html"),
        (count_model, Distance::Jaccard, "count_jaccard.html"),
    ]
    .into_iter()
    .map(|(model, distance, file_name)| {
        let config = DiffConfig::default()
            .distance(distance)
            .num_words(HEATMAP_NUM_WORDS);
        Ok(Heatmap {
            title: format!(
                "Topic difference ({} model) [{} distance]",
                model.representation(),
                distance
            ),
            file_name: file_name.to_string(),
            diff: diff(model, model, &config)?,
        })
    })
    .collect()
}

/// Plotly figure (data and layout) for a diff matrix.
pub fn heatmap_figure(diff: &TopicDiff, title: &str) -> Value {
    let mut trace = json!({
        "type": "heatmap",
        "z": diff.matrix,
        "colorscale": "RdBu",
        "reversescale": true,
    });
    if let Some(annotations) = &diff.annotations {
        let text: Vec<Vec<String>> = annotations
            .iter()
            .map(|row| row.iter().map(|ann| ann.to_string()).collect())
            .collect();
        trace["text"] = json!(text);
        trace["hoverinfo"] = json!("x+y+z+text");
    }

    json!({
        "data": [trace],
        "layout": {
            "title": { "text": title },
            "width": FIGURE_SIZE,
            "height": FIGURE_SIZE,
            "xaxis": { "title": { "text": "topic" } },
            "yaxis": { "title": { "text": "topic" } },
        }
    })
}

/// Standalone page embedding the heatmap. Needs network access to load plotly.
pub fn heatmap_html(
    diff: &TopicDiff,
    title: &str,
    generated_at: DateTime<Local>,
) -> Result<String> {
    let figure = heatmap_figure(diff, title);
    let data = serde_json::to_string(&figure["data"])?;
    let layout = serde_json::to_string(&figure["layout"])?;

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="heatmap"></div>
<p>Generated {stamp}</p>
<script>
Plotly.newPlot("heatmap", {data}, {layout});
</script>
</body>
</html>
"#,
        title = escape_html(title),
        stamp = generated_at.format("%Y-%m-%d %H:%M:%S"),
    ))
}

pub fn write_heatmap_html<P: AsRef<Path>>(diff: &TopicDiff, title: &str, path: P) -> Result<()> {
    let path = path.as_ref();
    let html = heatmap_html(diff, title, Local::now())?;
    fs::write(path, html)?;
    info!("Wrote heatmap '{}' to {}", title, path.display());
    Ok(())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRelevance {
    pub term: String,
    /// p(term | topic)
    pub probability: f64,
    /// p(term | topic) / p(term)
    pub lift: f64,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: usize,
    /// Share of the corpus assigned to this topic, weighted by document length
    pub prevalence: f64,
    pub terms: Vec<TermRelevance>,
}

/// Per-topic prevalence and the `topn` most relevant terms, where
/// relevance = λ·log p(w|t) + (1−λ)·log(p(w|t)/p(w)).
pub fn prepare_topic_summary<V: TermVector>(
    model: &LdaModel,
    corpus: &[V],
    dictionary: &Dictionary,
    topn: usize,
    lambda: f64,
) -> Result<Vec<TopicSummary>> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(Error::InvalidParameter(format!(
            "relevance lambda must be in [0, 1], got {lambda}"
        )));
    }
    if model.vocabulary() != dictionary.tokens() {
        return Err(Error::VocabularyMismatch(format!(
            "model has {} terms, dictionary has {}",
            model.num_terms(),
            dictionary.len()
        )));
    }

    let term_totals: Vec<f64> = (0..dictionary.len())
        .map(|id| dictionary.collection_frequency(id).unwrap_or(0) as f64)
        .collect();
    let total: f64 = term_totals.iter().sum();
    let marginal: Vec<f64> = term_totals
        .iter()
        .map(|&cf| if total > 0.0 { cf / total } else { 0.0 })
        .collect();

    let mut prevalence = vec![0.0; model.num_topics()];
    for doc in corpus {
        let length: f64 = doc.weighted_entries().iter().map(|&(_, w)| w).sum();
        for (topic, p) in model.topic_distribution(doc)?.into_iter().enumerate() {
            prevalence[topic] += p * length;
        }
    }
    let mass: f64 = prevalence.iter().sum();
    if mass > 0.0 {
        prevalence.iter_mut().for_each(|p| *p /= mass);
    }

    let summaries = model
        .topic_term_matrix()
        .into_iter()
        .enumerate()
        .map(|(topic, row)| {
            let mut terms: Vec<TermRelevance> = row
                .iter()
                .enumerate()
                .filter(|&(id, &p)| p > 0.0 && marginal[id] > 0.0)
                .map(|(id, &p)| {
                    let lift = p / marginal[id];
                    TermRelevance {
                        term: dictionary.tokens()[id].clone(),
                        probability: p,
                        lift,
                        relevance: lambda * p.ln() + (1.0 - lambda) * lift.ln(),
                    }
                })
                .collect();
            terms.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
            terms.truncate(topn);
            TopicSummary {
                topic,
                prevalence: prevalence[topic],
                terms,
            }
        })
        .collect();
    Ok(summaries)
}

pub fn write_topic_summary_json<P: AsRef<Path>>(summaries: &[TopicSummary], path: P) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_string_pretty(summaries)?)?;
    info!("Wrote summary of {} topics to {}", summaries.len(), path.display());
    Ok(())
}
