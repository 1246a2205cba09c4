//! The tokenizer turns raw post text into the terms that make up a
//! document's dimensions.
//!
//! Every step of the pipeline is gated by a configuration flag so that all
//! documents are tokenized the same way:
//!
//! 1. Split hashtags on camel-case and digit boundaries
//! 2. Strip accents (Unicode NFD, dropping combining marks)
//! 3. Remove URLs, HTML entities and non-ASCII characters
//! 4. Collapse runs of repeated characters (`goooaaaal` becomes `goal`)
//! 5. Remove mentions, hashtags and numbers (keeping 4-digit years)
//! 6. Strip punctuation, case-fold, drop stop words and short tokens
//! 7. Stem with a memoised Porter stemmer

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Punctuation characters replaced with spaces before splitting.
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~\u{2019}";

/// Configuration for the [`Tokenizer`].
///
/// The defaults match how the detection consumers tokenize posts; the `idf`
/// tool exposes several of these as command-line flags.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    /// Remove mentions such as `@handle`.
    pub remove_mentions: bool,
    /// Remove hashtags entirely instead of keeping their text.
    pub remove_hashtags: bool,
    /// Split hashtags such as `#ManchesterUnited` into their words.
    pub split_hashtags: bool,
    /// Remove numbers, preserving 4-digit years.
    pub remove_numbers: bool,
    /// Remove URLs.
    pub remove_urls: bool,
    /// Remove HTML entities such as `&amp;`.
    pub remove_alt_codes: bool,
    /// Collapse runs of repeated characters.
    pub normalize_words: bool,
    /// Length of a character run before it is collapsed to one.
    pub character_normalization_count: usize,
    /// Case-fold tokens to lowercase.
    pub case_fold: bool,
    /// Replace punctuation with whitespace.
    pub remove_punctuation: bool,
    /// Drop non-ASCII characters, including emojis.
    pub remove_unicode_entities: bool,
    /// Minimum token length to retain.
    pub min_length: usize,
    /// Stop words to drop after case folding.
    pub stopwords: HashSet<String>,
    /// Stem the remaining tokens.
    pub stem: bool,
    /// Strip accents via Unicode NFD decomposition.
    pub normalize_special_characters: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            remove_mentions: true,
            remove_hashtags: false,
            split_hashtags: true,
            remove_numbers: true,
            remove_urls: true,
            remove_alt_codes: true,
            normalize_words: false,
            character_normalization_count: 3,
            case_fold: true,
            remove_punctuation: true,
            remove_unicode_entities: false,
            min_length: 3,
            stopwords: HashSet::new(),
            stem: true,
            normalize_special_characters: true,
        }
    }
}

/// Splits text into normalized tokens according to a fixed configuration.
///
/// The stemmer's output is memoised: large corpora repeat the same words
/// constantly, so each distinct token is stemmed once.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Stemmer,
    stem_cache: Mutex<HashMap<String, String>>,
    url_pattern: Regex,
    alt_code_pattern: Regex,
    mention_pattern: Regex,
    hashtag_pattern: Regex,
    number_pattern: Regex,
    camel_case_pattern: Regex,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

impl Tokenizer {
    /// Creates a tokenizer with the given configuration.
    pub fn new(config: TokenizerConfig) -> Self {
        Self {
            config,
            stemmer: Stemmer::create(Algorithm::English),
            stem_cache: Mutex::new(HashMap::new()),
            url_pattern: Regex::new(r"(https?://)?([^\s]+)?\.[a-zA-Z0-9]+?/?([^\s,\.]+)?")
                .expect("url pattern"),
            alt_code_pattern: Regex::new(r"&.+?;").expect("alt-code pattern"),
            mention_pattern: Regex::new(r"@[a-zA-Z0-9_]+").expect("mention pattern"),
            hashtag_pattern: Regex::new(r"#([a-zA-Z0-9_]+)").expect("hashtag pattern"),
            number_pattern: Regex::new(r"\b([0-9]{1,3}|[0-9]{5,})\b").expect("number pattern"),
            camel_case_pattern: Regex::new(r"(([a-z]+)?([A-Z]+|[0-9]+))").expect("camel pattern"),
        }
    }

    /// Returns the tokenizer's configuration.
    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Tokenizes the given text.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let config = &self.config;

        let mut text = if config.split_hashtags {
            self.split_hashtags(text)
        } else {
            text.to_string()
        };

        if config.normalize_special_characters {
            text = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
        }

        if config.remove_urls {
            text = self.url_pattern.replace_all(&text, "").into_owned();
        }
        if config.remove_alt_codes {
            text = self.alt_code_pattern.replace_all(&text, "").into_owned();
        }
        if config.remove_unicode_entities {
            text = text.chars().filter(char::is_ascii).collect();
        }
        if config.normalize_words {
            text = collapse_repeats(&text, config.character_normalization_count);
        }
        if config.remove_mentions {
            text = self.mention_pattern.replace_all(&text, "").into_owned();
        }
        text = if config.remove_hashtags {
            self.hashtag_pattern.replace_all(&text, "").into_owned()
        } else {
            self.hashtag_pattern.replace_all(&text, "$1").into_owned()
        };
        if config.remove_numbers {
            text = self.number_pattern.replace_all(&text, "").into_owned();
        }

        if config.remove_punctuation {
            text = text
                .chars()
                .map(|c| if PUNCTUATION.contains(c) { ' ' } else { c })
                .collect();
        }

        let mut tokens: Vec<String> = text
            .split_whitespace()
            .map(|token| {
                if config.case_fold {
                    token.to_lowercase()
                } else {
                    token.to_string()
                }
            })
            .filter(|token| !config.stopwords.contains(token))
            .filter(|token| token.chars().count() >= config.min_length)
            .collect();

        if config.stem {
            tokens = self.stem(tokens);
        }

        tokens
    }

    /// Splits hashtags on camel-case and digit boundaries.
    ///
    /// Hashtags with a single component are left untouched.
    fn split_hashtags(&self, text: &str) -> String {
        let mut text = text.to_string();

        let hashtags: Vec<String> = self
            .hashtag_pattern
            .captures_iter(&text)
            .map(|capture| capture[1].to_string())
            .collect();

        for hashtag in hashtags {
            let components = self
                .camel_case_pattern
                .replace_all(&hashtag, "$2 $3")
                .into_owned();
            if components.split_whitespace().count() > 1 {
                text = text.replace(&format!("#{hashtag}"), &components);
            }
        }

        text
    }

    fn stem(&self, tokens: Vec<String>) -> Vec<String> {
        let Ok(mut cache) = self.stem_cache.lock() else {
            return tokens
                .into_iter()
                .map(|token| self.stemmer.stem(&token).into_owned())
                .collect();
        };

        tokens
            .into_iter()
            .map(|token| {
                if let Some(stem) = cache.get(&token) {
                    return stem.clone();
                }

                let stem = self.stemmer.stem(&token).into_owned();
                cache.insert(token, stem.clone());
                stem
            })
            .collect()
    }
}

/// Collapses runs of `count` or more identical characters to one.
fn collapse_repeats(text: &str, count: usize) -> String {
    if count == 0 {
        return text.to_string();
    }

    let mut collapsed = String::with_capacity(text.len());
    let mut run_char: Option<char> = None;
    let mut run_length = 0usize;

    for c in text.chars() {
        if run_char == Some(c) {
            run_length += 1;
        } else {
            flush_run(&mut collapsed, run_char, run_length, count);
            run_char = Some(c);
            run_length = 1;
        }
    }
    flush_run(&mut collapsed, run_char, run_length, count);

    collapsed
}

fn flush_run(out: &mut String, c: Option<char>, length: usize, count: usize) {
    let Some(c) = c else {
        return;
    };

    if length >= count {
        out.push(c);
    } else {
        for _ in 0..length {
            out.push(c);
        }
    }
}
