use std::collections::HashSet;

use review_topics::config::{CorpusConfig, VocabularyConfig};
use review_topics::corpus::{self, Corpus};
use review_topics::diff::{diff, Distance, DiffConfig};
use review_topics::pipeline::{self, PreparedCorpus};
use review_topics::preprocessing::NormalizerConfig;
use review_topics::topic_modeling::LdaConfig;
use review_topics::{Error, Normalizer, Representation};

const REVIEWS: &str = "Review\tLiked
Wow... Loved this place.\t1
Crust is not good.\t0
Not tasty and the texture was just nasty.\t0
Stopped by during the late May bank holiday off Rick Steve recommendation and loved it.\t1
The selection on the menu was great and so were the prices.\t1
Now I am getting angry and I want my damn pho.\t0
Honeslty it didn't taste THAT fresh.)\t0
The potatoes were like rubber and you could tell they had been made up ahead of time being kept under a warmer.\t0
The fries were great too.\t1
Crust is not good.\t0
A great touch.\t1
Service was very prompt.\t1
Would not go back.\t0
The cashier had no care what so ever on what I had to say it still ended up being wayyy overpriced.\t0
I tried the Cape Cod ravoli, chicken, with cranberry...mmmm!\t1
The fries were great too.\t1
I was disgusted because I was pretty sure that was human hair.\t0
I was shocked because no signs indicate cash only.\t0
Highly recommended.\t1
Waitress was a little slow in service.\t0
This place is not worth your time, let alone Vegas.\t0
did not like at all.\t0
The Burrittos Blah!\t0
The food, amazing.\t1
Service is also cute.\t1
I could care less... The interior is just beautiful.\t1
So they performed.\t1
That's right....the red velvet cake.....ohhh this stuff is so good.\t1
They never brought a salad we asked for.\t0
This hole in the wall has great Mexican street tacos, and friendly staff.\t1
";

const NEW_REVIEW: &str = "The food was too salty but I liked the atmosphere. What's with the attitude?! :-/ ";

fn load() -> Corpus {
    corpus::load_reader(REVIEWS.as_bytes(), &CorpusConfig::default()).unwrap()
}

fn prepare() -> (Normalizer, PreparedCorpus) {
    let normalizer = Normalizer::new(NormalizerConfig::default()).unwrap();
    let prepared =
        pipeline::prepare(load().documents, &normalizer, &VocabularyConfig::default()).unwrap();
    (normalizer, prepared)
}

fn seeded(num_topics: usize) -> LdaConfig {
    LdaConfig::new(num_topics).passes(10).random_seed(2024)
}

#[test]
fn test_deduplication_preserves_order() {
    let corpus = load();
    let raw: Vec<&str> = REVIEWS
        .lines()
        .skip(1)
        .map(|line| line.split('\t').next().unwrap())
        .collect();
    let distinct: HashSet<&str> = raw.iter().copied().collect();

    assert_eq!(raw.len(), 30);
    assert_eq!(corpus.len(), distinct.len());
    assert!(corpus.len() < raw.len());
    assert_eq!(corpus.report.duplicates_removed, 2);

    let mut expected = Vec::new();
    let mut seen = HashSet::new();
    for text in raw {
        if seen.insert(text) {
            expected.push(text);
        }
    }
    assert_eq!(corpus.texts().collect::<Vec<_>>(), expected);
}

#[test]
fn test_missing_column_is_reported() {
    let config = CorpusConfig::default().text_column("Text");
    assert!(matches!(
        corpus::load_reader(REVIEWS.as_bytes(), &config),
        Err(Error::MissingColumn { .. })
    ));
}

#[test]
fn test_empty_file_is_an_empty_corpus() {
    assert!(matches!(
        corpus::load_reader("".as_bytes(), &CorpusConfig::default()),
        Err(Error::EmptyCorpus)
    ));
}

#[test]
fn test_normalized_tokens_are_clean() {
    let (normalizer, prepared) = prepare();
    for (doc, tokens) in prepared.documents.iter().zip(&prepared.tokens) {
        for token in tokens {
            assert_eq!(token, &token.to_lowercase());
            assert!(!token.chars().any(|c| c.is_ascii_punctuation()), "{token}");
            assert!(token.chars().count() >= 3, "{token}");
        }
        assert_eq!(&normalizer.normalize(&doc.text), tokens);
    }
}

#[test]
fn test_new_review_normalization() {
    let normalizer = Normalizer::new(NormalizerConfig::default()).unwrap();
    let tokens = normalizer.normalize(NEW_REVIEW);

    for stopword in ["the", "was", "but", "with", "what"] {
        assert!(!tokens.iter().any(|t| t == stopword), "{stopword} survived");
    }
    for token in &tokens {
        assert!(token.chars().all(|c| c.is_alphabetic()), "{token}");
    }
    for word in ["food", "salty", "atmosphere", "attitude"] {
        assert!(tokens.iter().any(|t| t == word), "{word} missing from {tokens:?}");
    }
    assert!(tokens.iter().any(|t| t == "liked" || t == "like"));
}

#[test]
fn test_vectors_stay_in_vocabulary() {
    let (normalizer, prepared) = prepare();
    for bow in &prepared.bow {
        for &(id, count) in bow.entries() {
            assert!(prepared.dictionary.contains_id(id));
            assert!(count > 0);
        }
    }

    // Mixed known and unseen tokens are dropped, not rejected
    let bow = prepared.dictionary.doc2bow(&normalizer.normalize(NEW_REVIEW));
    assert!(bow.entries().iter().all(|&(id, _)| prepared.dictionary.contains_id(id)));
    assert!(prepared.tfidf_model.transform(&bow).is_ok());
}

#[test]
fn test_fitting_is_reproducible_and_isolated() {
    let (_, prepared) = prepare();
    for representation in [Representation::Counts, Representation::Tfidf] {
        let first = prepared.fit(representation, seeded(3)).unwrap();
        let snapshot = first.topic_term_matrix();
        let doc_scores = prepared.document_topics(&first, 4).unwrap();

        let second = prepared.fit(representation, seeded(3)).unwrap();
        assert_eq!(second.topic_term_matrix(), snapshot);

        let _other = prepared.fit(representation, seeded(5)).unwrap();
        assert_eq!(first.topic_term_matrix(), snapshot);
        assert_eq!(prepared.document_topics(&first, 4).unwrap(), doc_scores);
    }
}

#[test]
fn test_variants_and_scoring() {
    let (normalizer, prepared) = prepare();
    let config = LdaConfig::default().passes(5);
    let variants = pipeline::fit_variants(&prepared, &[2, 3, 5], &config).unwrap();
    assert_eq!(variants.len(), 6);

    for variant in &variants {
        let model = &variant.model;
        assert_eq!(model.num_topics(), variant.num_topics);
        assert_eq!(model.representation(), variant.representation);

        let top = model.show_topic(0, 5).unwrap();
        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|pair| pair[0].1 >= pair[1].1));

        let scorer = prepared.scorer(&normalizer, model).unwrap();
        let first = scorer.score(NEW_REVIEW).unwrap();
        assert_eq!(scorer.score(NEW_REVIEW).unwrap(), first);
        assert!(first.iter().all(|&(topic, score)| topic < variant.num_topics && score >= 0.0));
    }

    // A count vector cannot be scored by a TF-IDF model
    let tfidf_model = &variants[1].model;
    assert_eq!(tfidf_model.representation(), Representation::Tfidf);
    assert!(matches!(
        tfidf_model.document_topics(&prepared.bow[0]),
        Err(Error::RepresentationMismatch { .. })
    ));
}

#[test]
fn test_self_diff_diagonal_is_zero() {
    let (_, prepared) = prepare();
    let model = prepared.fit(Representation::Tfidf, seeded(5)).unwrap();
    for distance in [
        Distance::Jaccard,
        Distance::Hellinger,
        Distance::KullbackLeibler,
        Distance::JensenShannon,
    ] {
        let result = diff(&model, &model, &DiffConfig::default().distance(distance)).unwrap();
        for i in 0..5 {
            assert_eq!(result.get(i, i), Some(0.0), "{distance}");
        }
    }
}
