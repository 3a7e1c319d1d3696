use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use review_topics::corpus;
use review_topics::diff::{diff, DiffConfig, TopicDiff};
use review_topics::pipeline::{self, FittedVariant, PreparedCorpus};
use review_topics::visualize::{self, DEFAULT_RELEVANCE_LAMBDA};
use review_topics::{Normalizer, PipelineConfig, Representation, TermVector};

const DEFAULT_NEW_REVIEW: &str =
    "The food was too salty but I liked the atmosphere. What's with the attitude?! :-/ ";

#[derive(Parser, Debug)]
#[command(version, about = "Topic modeling walkthrough over a review corpus", long_about = None)]
struct Args {
    /// Delimited review file with a header row
    path: PathBuf,
    #[clap(long, help = "JSON config file; command line flags override it")]
    config: Option<PathBuf>,
    #[clap(short, long, help = "Header name of the review text column")]
    column: Option<String>,
    #[clap(short, long, help = "Field delimiter (default: tab)")]
    delimiter: Option<char>,
    #[clap(short, long, value_delimiter = ',', help = "Topic counts to fit, e.g. 2,3,5")]
    topics: Option<Vec<usize>>,
    #[clap(long, help = "Passes over the corpus per fit")]
    passes: Option<usize>,
    #[clap(long, help = "Random seed; drawn and reported when unset")]
    seed: Option<u64>,
    #[clap(long, help = "Minimum token length")]
    min_len: Option<usize>,
    #[clap(long, help = "Stem tokens after lemmatizing")]
    stem: bool,
    #[clap(long, help = "Prune tokens in fewer documents than this")]
    no_below: Option<usize>,
    #[clap(long, help = "Prune tokens in more than this fraction of documents")]
    no_above: Option<f64>,
    #[clap(long, help = "Keep at most this many tokens after pruning")]
    keep_n: Option<usize>,
    #[clap(long, default_value_t = 10, help = "Words shown per topic")]
    top_words: usize,
    #[clap(long, default_value_t = 3, help = "Corpus document to walk through")]
    inspect_doc: usize,
    #[clap(long, default_value_t = 194, help = "Corpus document to score against every model")]
    score_doc: usize,
    #[clap(long, default_value = DEFAULT_NEW_REVIEW, help = "Unseen review to score")]
    new_review: String,
    #[clap(long, default_value_t = 5, help = "Topic count of the model compared with itself")]
    diff_model_topics: usize,
    #[clap(long, help = "Directory for heatmap HTML pages")]
    heatmap_dir: Option<PathBuf>,
    #[clap(long, help = "Write an LDAvis-style topic summary to this JSON file")]
    summary_json: Option<PathBuf>,
    #[clap(long, default_value = "info", help = "Log level: trace, debug, info, warn, error")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = build_config(&args)?;
    println!("Path: {}", args.path.display());

    // Stage 1: load
    let corpus = corpus::load_path(&args.path, &config.corpus)
        .with_context(|| format!("failed to load {}", args.path.display()))?;
    println!(
        "Loaded {} reviews ({} rows read, {} duplicates removed, {} blank rows skipped)",
        corpus.len(),
        corpus.report.rows_read,
        corpus.report.duplicates_removed,
        corpus.report.blank_skipped
    );

    // Stage 2: normalize
    let normalizer = Normalizer::new(config.normalizer.clone())?;
    if let Some(doc) = corpus.documents.get(args.inspect_doc) {
        println!("\nNormalizing review {}:", args.inspect_doc);
        println!("  {:<28} {}", "raw", doc.text);
        let trace = normalizer.trace(&doc.text);
        for (stage, output) in &trace.stages {
            println!("  {:<28} {}", stage.to_string(), output);
        }
        println!("  {:<28} {:?}", "tokens", trace.tokens);
    }

    // Stages 3 and 4: dictionary and vectors
    let prepared = pipeline::prepare(corpus.documents, &normalizer, &config.vocabulary)?;
    println!(
        "\nDictionary: {} unique tokens over {} documents",
        prepared.dictionary.len(),
        prepared.dictionary.num_docs()
    );
    print_vectors(&prepared, args.inspect_doc);

    // Stage 5: fit and inspect
    let variants = pipeline::fit_variants(&prepared, &config.topic_counts, &config.lda)?;
    for variant in &variants {
        print_variant(variant, &prepared, args.top_words)?;
    }

    if args.score_doc < prepared.len() {
        println!("\nScores of review {}:", args.score_doc);
        println!("  {}", prepared.documents[args.score_doc].text);
        for variant in &variants {
            let scores = prepared.document_topics(&variant.model, args.score_doc)?;
            println!(
                "  {:>2} topics, {:<6} {}",
                variant.num_topics,
                variant.representation,
                format_scores(&scores)
            );
        }
    } else {
        println!(
            "\nSkipping review {}: corpus has only {} documents",
            args.score_doc,
            prepared.len()
        );
    }

    println!("\nNew review: {}", args.new_review.trim());
    println!("  tokens: {:?}", normalizer.normalize(&args.new_review));
    for variant in &variants {
        let scorer = prepared.scorer(&normalizer, &variant.model)?;
        let scores = scorer.score(&args.new_review)?;
        println!(
            "  {:>2} topics, {:<6} {}",
            variant.num_topics,
            variant.representation,
            format_scores(&scores)
        );
    }

    // Each model diffed with itself, next to a perfectly separated model
    let diff_config = config.lda.clone().num_topics(args.diff_model_topics);
    let diff_model = prepared.fit(Representation::Tfidf, diff_config.clone())?;
    let count_model = prepared.fit(Representation::Counts, diff_config)?;
    let heatmaps = visualize::self_diff_heatmaps(&diff_model, &count_model)?;
    for heatmap in &heatmaps {
        println!("\n{} ({} topics):", heatmap.title, args.diff_model_topics);
        print!("{}", heatmap.diff);
    }

    if let Some(dir) = &args.heatmap_dir {
        std::fs::create_dir_all(dir)?;
        for heatmap in &heatmaps {
            let path = dir.join(&heatmap.file_name);
            visualize::write_heatmap_html(&heatmap.diff, &heatmap.title, path)?;
        }
        let ideal = TopicDiff::ideal(args.diff_model_topics);
        visualize::write_heatmap_html(
            &ideal,
            "Topic difference (ideal world)",
            dir.join("ideal.html"),
        )?;
        if let Some(pair) = matching_pair(&variants) {
            let cross_config = DiffConfig {
                diagonal: true,
                ..config.diff.clone()
            };
            let cross = diff(&pair.0.model, &pair.1.model, &cross_config)?;
            visualize::write_heatmap_html(
                &cross,
                &format!("Count vs TF-IDF topics (diagonal) [{} distance]", cross_config.distance),
                dir.join("count_vs_tfidf.html"),
            )?;
        }
        println!("Heatmaps written to {}", dir.display());
    }

    if let Some(path) = &args.summary_json {
        let summaries = visualize::prepare_topic_summary(
            &diff_model,
            &prepared.tfidf,
            &prepared.dictionary,
            args.top_words,
            DEFAULT_RELEVANCE_LAMBDA,
        )?;
        visualize::write_topic_summary_json(&summaries, path)?;
        println!("Topic summary written to {}", path.display());
    }

    info!("Done");
    Ok(())
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(column) = &args.column {
        config.corpus.text_column = column.clone();
    }
    if let Some(delimiter) = args.delimiter {
        config.corpus.delimiter = delimiter;
    }
    if let Some(topics) = &args.topics {
        config.topic_counts = topics.clone();
    }
    if let Some(passes) = args.passes {
        config.lda.passes = passes;
    }
    if args.seed.is_some() {
        config.lda.random_seed = args.seed;
    }
    if let Some(min_len) = args.min_len {
        config.normalizer.min_token_len = min_len;
    }
    if args.stem {
        config.normalizer.stem = true;
    }
    if args.no_below.is_some() || args.no_above.is_some() || args.keep_n.is_some() {
        let mut prune = config.vocabulary.prune.clone().unwrap_or_default();
        if let Some(no_below) = args.no_below {
            prune.no_below = no_below;
        }
        if let Some(no_above) = args.no_above {
            prune.no_above = no_above;
        }
        if args.keep_n.is_some() {
            prune.keep_n = args.keep_n;
        }
        config.vocabulary.prune = Some(prune);
    }
    if args.diff_model_topics == 0 {
        bail!("--diff-model-topics must be positive");
    }

    config.validate()?;
    Ok(config)
}

fn print_vectors(prepared: &PreparedCorpus, index: usize) {
    let (Some(bow), Some(tfidf)) = (prepared.bow.get(index), prepared.tfidf.get(index)) else {
        return;
    };
    let named = |entries: Vec<(usize, f64)>| -> Vec<String> {
        entries
            .into_iter()
            .map(|(id, w)| format!("{}:{}", prepared.dictionary.get(id).unwrap_or("?"), round3(w)))
            .collect()
    };
    println!("Review {} as counts: {:?}", index, named(bow.weighted_entries()));
    println!("Review {} as TF-IDF: {:?}", index, named(tfidf.weighted_entries()));
}

fn print_variant(
    variant: &FittedVariant,
    prepared: &PreparedCorpus,
    top_words: usize,
) -> Result<()> {
    let model = &variant.model;
    println!(
        "\n=== LDA with {} topics on {} vectors (seed {}) ===",
        variant.num_topics,
        variant.representation,
        model.seed()
    );
    for topic in model.show_topics_with_coherence(top_words, &prepared.bow)? {
        println!(
            "Topic {} [{}] coherence {:.3}",
            topic.id,
            topic.name,
            topic.coherence_score.unwrap_or(f64::NAN)
        );
        println!("  {}", model.print_topic(topic.id, top_words)?);
    }
    Ok(())
}

fn matching_pair(variants: &[FittedVariant]) -> Option<(&FittedVariant, &FittedVariant)> {
    let counts = variants.iter().find(|v| v.representation == Representation::Counts)?;
    let tfidf = variants
        .iter()
        .find(|v| v.representation == Representation::Tfidf && v.num_topics == counts.num_topics)?;
    Some((counts, tfidf))
}

fn format_scores(scores: &[(usize, f64)]) -> String {
    scores
        .iter()
        .map(|(topic, score)| format!("({}, {:.3})", topic, score))
        .collect::<Vec<_>>()
        .join(" ")
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
