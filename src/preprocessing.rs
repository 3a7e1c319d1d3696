//! Text normalization for reviews.
//!
//! Each cleaning step is a standalone pure function over a string. The
//! [`Normalizer`] chains them in a fixed order:
//!
//! 1. strip markup tags
//! 2. lowercase
//! 3. collapse repeated whitespace
//! 4. strip punctuation
//! 5. strip numerals (optional)
//! 6. drop short words
//! 7. remove stopwords
//! 8. lemmatize (optional, on by default)
//! 9. stem (optional, off by default)
//! 10. tokenize into alphabetic words
//!
//! Later steps rely on the shape produced by earlier ones, e.g. stopword
//! removal expects lowercase input.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Words shorter than this (in characters) are dropped
    pub min_token_len: usize,
    pub strip_numeric: bool,
    pub lemmatize: bool,
    pub stem: bool,
    /// Added on top of the default English stopword list
    pub extra_stopwords: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            min_token_len: 3,
            strip_numeric: false,
            lemmatize: true,
            stem: false,
            extra_stopwords: Vec::new(),
        }
    }
}

impl NormalizerConfig {
    /// All filters on: the default chain plus numeral stripping and stemming.
    pub fn full_filters() -> Self {
        NormalizerConfig {
            strip_numeric: true,
            stem: true,
            ..Default::default()
        }
    }

    pub fn min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    pub fn stem(mut self, enable: bool) -> Self {
        self.stem = enable;
        self
    }

    pub fn lemmatize(mut self, enable: bool) -> Self {
        self.lemmatize = enable;
        self
    }

    pub fn strip_numeric(mut self, enable: bool) -> Self {
        self.strip_numeric = enable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_token_len == 0 {
            return Err(Error::InvalidMinLength);
        }
        Ok(())
    }
}

/// One step of the normalization chain, used by [`Normalizer::trace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StripTags,
    Lowercase,
    StripMultipleWhitespaces,
    StripPunctuation,
    StripNumeric,
    StripShort,
    RemoveStopwords,
    Lemmatize,
    Stem,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StripTags => "strip_tags",
            Stage::Lowercase => "lowercase",
            Stage::StripMultipleWhitespaces => "strip_multiple_whitespaces",
            Stage::StripPunctuation => "strip_punctuation",
            Stage::StripNumeric => "strip_numeric",
            Stage::StripShort => "strip_short",
            Stage::RemoveStopwords => "remove_stopwords",
            Stage::Lemmatize => "lemmatize",
            Stage::Stem => "stem",
        };
        f.write_str(name)
    }
}

/// Intermediate outputs of every stage plus the final tokens.
#[derive(Debug, Clone)]
pub struct Trace {
    pub stages: Vec<(Stage, String)>,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    stop_words: HashSet<String>,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate()?;

        let mut stop_words: HashSet<String> =
            DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect();
        stop_words.extend(config.extra_stopwords.iter().map(|w| w.to_lowercase()));

        Ok(Normalizer { config, stop_words })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Normalize one raw document into tokens.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let mut text = text.to_string();
        self.run_stages(&mut text, |_, _| {});
        self.finish(&text)
    }

    pub fn normalize_all<'a, I>(&self, texts: I) -> Vec<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts.into_iter().map(|text| self.normalize(text)).collect()
    }

    /// Same as [`normalize`](Self::normalize) but records every stage.
    pub fn trace(&self, text: &str) -> Trace {
        let mut stages = Vec::new();
        let mut text = text.to_string();
        self.run_stages(&mut text, |stage, out| stages.push((stage, out.to_string())));
        let tokens = self.finish(&text);
        Trace { stages, tokens }
    }

    fn run_stages<F>(&self, text: &mut String, mut observe: F)
    where
        F: FnMut(Stage, &str),
    {
        let mut apply = |stage: Stage, text: &mut String, f: &dyn Fn(&str) -> String| {
            *text = f(text);
            observe(stage, text);
        };

        apply(Stage::StripTags, text, &strip_tags);
        apply(Stage::Lowercase, text, &|t| t.to_lowercase());
        apply(Stage::StripMultipleWhitespaces, text, &strip_multiple_whitespaces);
        apply(Stage::StripPunctuation, text, &strip_punctuation);
        if self.config.strip_numeric {
            apply(Stage::StripNumeric, text, &strip_numeric);
        }
        let min_len = self.config.min_token_len;
        apply(Stage::StripShort, text, &|t| strip_short(t, min_len));
        apply(Stage::RemoveStopwords, text, &|t| remove_stopwords(t, &self.stop_words));
        if self.config.lemmatize {
            apply(Stage::Lemmatize, text, &lemmatize);
        }
        if self.config.stem {
            apply(Stage::Stem, text, &stem_text);
        }
    }

    // Tokenizing can split words like "x2y" into fragments, and a lemma can
    // land on a stopword ("ones" -> "one"), so both rules run again here.
    fn finish(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|token| token.chars().count() >= self.config.min_token_len)
            .filter(|token| !self.stop_words.contains(token))
            .collect()
    }
}

fn tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^>]+)>").expect("tag pattern compiles"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern compiles"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[[:punct:]]+").expect("punctuation pattern compiles"))
}

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("numeric pattern compiles"))
}

fn alphabetic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\W\d_]+").expect("alphabetic pattern compiles"))
}

/// Remove markup-like `<...>` tags.
pub fn strip_tags(text: &str) -> String {
    tags_re().replace_all(text, "").into_owned()
}

/// Collapse every whitespace run into a single space.
pub fn strip_multiple_whitespaces(text: &str) -> String {
    whitespace_re().replace_all(text, " ").into_owned()
}

/// Replace ASCII punctuation runs with a single space.
pub fn strip_punctuation(text: &str) -> String {
    punctuation_re().replace_all(text, " ").into_owned()
}

pub fn strip_numeric(text: &str) -> String {
    numeric_re().replace_all(text, "").into_owned()
}

/// Keep only whitespace-separated words with at least `min_len` characters.
pub fn strip_short(text: &str, min_len: usize) -> String {
    text.split_whitespace()
        .filter(|word| word.chars().count() >= min_len)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn remove_stopwords(text: &str, stop_words: &HashSet<String>) -> String {
    text.split_whitespace()
        .filter(|word| !stop_words.contains(*word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce each word to its dictionary form.
pub fn lemmatize(text: &str) -> String {
    text.split_whitespace()
        .map(lemma)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn stem_text(text: &str) -> String {
    let stemmer = Stemmer::create(Algorithm::English);
    text.split_whitespace()
        .map(|word| stemmer.stem(word).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maximal runs of letters; digits, underscores and anything else separate.
pub fn tokenize(text: &str) -> Vec<String> {
    alphabetic_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn lemma_exceptions() -> &'static HashMap<&'static str, &'static str> {
    static EXCEPTIONS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    EXCEPTIONS.get_or_init(|| {
        [
            ("children", "child"),
            ("men", "man"),
            ("women", "woman"),
            ("people", "people"),
            ("feet", "foot"),
            ("teeth", "tooth"),
            ("mice", "mouse"),
            ("geese", "goose"),
            ("knives", "knife"),
            ("wives", "wife"),
            ("leaves", "leaf"),
            ("loaves", "loaf"),
            ("halves", "half"),
            ("shelves", "shelf"),
            ("cookies", "cookie"),
            ("movies", "movie"),
            ("pies", "pie"),
            ("brownies", "brownie"),
            ("smoothies", "smoothie"),
            ("veggies", "veggie"),
            ("calories", "calorie"),
            ("sauces", "sauce"),
            ("prices", "price"),
            ("places", "place"),
            ("pieces", "piece"),
            ("slices", "slice"),
            ("services", "service"),
            ("plates", "plate"),
            ("tables", "table"),
            ("dates", "date"),
            ("tomatoes", "tomato"),
            ("potatoes", "potato"),
            ("heroes", "hero"),
        ]
        .into_iter()
        .collect()
    })
}

/// Words ending in `s` that are not plurals.
const NON_PLURALS: &[&str] = &[
    "always", "perhaps", "sometimes", "news", "series", "species", "lens", "yes", "gas",
    "bus", "plus", "minus", "chaos", "atlas", "canvas", "nachos", "hummus", "couscous",
    "asparagus", "octopus", "citrus", "molasses", "especially", "various", "delicious",
    "gorgeous", "famous", "generous", "nervous", "serious", "obvious", "previous",
    "ridiculous", "tremendous", "fabulous", "marvelous", "anxious", "curious", "jealous",
    "outrageous", "courteous", "spacious", "gracious", "luscious", "scrumptious",
    "bonus", "menus", "thus",
];

fn lemma(word: &str) -> String {
    if let Some(base) = lemma_exceptions().get(word) {
        return base.to_string();
    }
    if NON_PLURALS.contains(&word) || word.chars().count() <= 3 {
        return word.to_string();
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }

    // Noun plural suffix rules, longest first.
    const RULES: &[(&str, &str)] = &[
        ("sses", "ss"),
        ("shes", "sh"),
        ("ches", "ch"),
        ("xes", "x"),
        ("zes", "z"),
        ("ies", "y"),
        ("s", ""),
    ];
    for (suffix, replacement) in RULES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.chars().count() >= 2 {
                return format!("{}{}", stem, replacement);
            }
        }
    }
    word.to_string()
}

/// The standard English stopword list shipped with common topic modeling toolkits.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
    "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
    "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
    "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
    "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
    "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
    "but", "by", "call", "can", "cannot", "cant", "co", "computer", "con", "could",
    "couldnt", "cry", "de", "describe", "detail", "did", "didn", "do", "does", "doesn",
    "doing", "don", "done", "down", "due", "during", "each", "eg", "eight", "either",
    "eleven", "else", "elsewhere", "empty", "enough", "etc", "even", "ever", "every",
    "everyone", "everything", "everywhere", "except", "few", "fifteen", "fifty", "fill",
    "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found", "four",
    "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt", "have",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers",
    "herself", "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in",
    "inc", "indeed", "interest", "into", "is", "it", "its", "itself", "just", "keep", "kg",
    "km", "last", "latter", "latterly", "least", "less", "ltd", "made", "make", "many",
    "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly",
    "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
    "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "quite", "rather", "re", "really",
    "regarding", "same", "say", "see", "seem", "seemed", "seeming", "seems", "serious",
    "several", "she", "should", "show", "side", "since", "sincere", "six", "sixty", "so",
    "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them",
    "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
    "therein", "thereupon", "these", "they", "thick", "thin", "third", "this", "those",
    "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "unless",
    "until", "up", "upon", "us", "used", "using", "various", "very", "via", "was", "we",
    "well", "were", "what", "whatever", "when", "whence", "whenever", "where",
    "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever", "whether",
    "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;

    const NEW_REVIEW: &str =
        "The food was too salty but I liked the atmosphere. What's with the attitude?! :-/ ";

    fn normalizer() -> Normalizer {
        Normalizer::new(NormalizerConfig::default()).unwrap()
    }

    #[test]
    fn test_individual_filters() {
        assert_eq!(strip_tags("<i>Great</i> pho<br/>"), "Great pho");
        assert_eq!(strip_multiple_whitespaces("a \t\n  b"), "a b");
        assert_eq!(strip_punctuation("what's up?!"), "what s up ");
        assert_eq!(strip_numeric("5 stars in 2020"), " stars in ");
        assert_eq!(strip_short("it is so good", 3), "good");
        assert_eq!(
            tokenize("fries x2y caf\u{e9} under_score"),
            vec!["fries", "x", "y", "caf\u{e9}", "under", "score"]
        );
    }

    #[test]
    fn test_lemmatize_plurals() {
        assert_eq!(lemmatize("fries dishes glasses boxes burgers"), "fry dish glass box burger");
        assert_eq!(lemmatize("delicious always hummus"), "delicious always hummus");
        assert_eq!(lemmatize("knives cookies"), "knife cookie");
    }

    #[test]
    fn test_stem_text() {
        assert_eq!(stem_text("running waited"), "run wait");
    }

    #[test]
    fn test_new_review_tokens() {
        let tokens = normalizer().normalize(NEW_REVIEW);

        for stop in ["the", "was", "but", "with", "too", "what"] {
            assert!(!tokens.contains(&stop.to_string()), "stopword {stop} survived");
        }
        for content in ["food", "salty", "atmosphere", "attitude"] {
            assert!(tokens.contains(&content.to_string()), "missing {content}");
        }
        assert!(tokens.iter().any(|t| t.starts_with("like")));
        for token in &tokens {
            assert!(token.chars().all(|c| c.is_alphabetic()), "bad token {token}");
        }
    }

    #[test]
    fn test_tokens_lowercase_and_long_enough() {
        let normalizer = Normalizer::new(NormalizerConfig::default().min_token_len(4)).unwrap();
        let tokens =
            normalizer.normalize("<p>GREAT Service!!</p> The x2yz Pho was <b>HOT</b>, 10/10 a+");
        assert!(!tokens.is_empty());
        for token in &tokens {
            assert_eq!(token, &token.to_lowercase());
            assert!(token.chars().count() >= 4, "short token {token}");
            assert!(!token.chars().any(|c| c.is_ascii_punctuation()));
        }
    }

    #[test]
    fn test_lemmas_that_are_stopwords_dropped() {
        assert_eq!(lemmatize("ones"), "one");
        let tokens = normalizer().normalize("The spicy ones were the tasty ones");
        assert!(!tokens.contains(&"one".to_string()), "{tokens:?}");
        assert!(tokens.contains(&"spicy".to_string()));
        assert!(tokens.contains(&"tasty".to_string()));
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize(NEW_REVIEW), normalizer.normalize(NEW_REVIEW));
    }

    #[test]
    fn test_full_filters_variant_stems() {
        let plain = normalizer().normalize("Waiters were amazing, 10 stars");
        let full = Normalizer::new(NormalizerConfig::full_filters())
            .unwrap()
            .normalize("Waiters were amazing, 10 stars");

        assert!(plain.contains(&"amazing".to_string()));
        assert!(full.contains(&"amaz".to_string()));
        assert!(!full.iter().any(|t| t.chars().any(|c| c.is_ascii_digit())));
    }

    #[test]
    fn test_trace_stage_order() {
        let trace = normalizer().trace(NEW_REVIEW);
        let stages: Vec<Stage> = trace.stages.iter().map(|(stage, _)| *stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::StripTags,
                Stage::Lowercase,
                Stage::StripMultipleWhitespaces,
                Stage::StripPunctuation,
                Stage::StripShort,
                Stage::RemoveStopwords,
                Stage::Lemmatize,
            ]
        );
        assert_eq!(trace.tokens, normalizer().normalize(NEW_REVIEW));
    }

    #[test]
    fn test_extra_stopwords_and_invalid_length() {
        let config = NormalizerConfig {
            extra_stopwords: vec!["Food".to_string()],
            ..Default::default()
        };
        let tokens = Normalizer::new(config).unwrap().normalize(NEW_REVIEW);
        assert!(!tokens.contains(&"food".to_string()));

        let err = Normalizer::new(NormalizerConfig::default().min_token_len(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidMinLength));
    }
}
