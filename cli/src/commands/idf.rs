//! IDF command - build a TF-IDF scheme from a corpus.
//!
//! The scheme is built one line at a time: each post contributes to a
//! term's document frequency once, however often the term repeats within
//! it. The output feeds the consume tool's `--scheme` flag.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};

use eventline_core::TfIdf;
use eventline_nlp::{post, stopwords, Tokenizer, TokenizerConfig};

use super::{meta, save};

/// Arguments for the idf command.
#[derive(Args, Serialize)]
pub struct IdfArgs {
    /// The corpus to build the TF-IDF scheme from
    #[arg(short, long)]
    pub file: PathBuf,

    /// Where to save the TF-IDF scheme
    #[arg(short, long)]
    pub output: PathBuf,

    /// Exclude retweets from the corpus
    #[arg(long)]
    pub remove_retweets: bool,

    /// Exclude posts from unverified authors
    #[arg(long)]
    pub skip_unverified: bool,

    /// Remove non-ASCII characters before tokenizing
    #[arg(long)]
    pub remove_unicode_entities: bool,

    /// Collapse runs of repeated characters
    #[arg(long)]
    pub normalize_words: bool,

    /// Length of a character run before it is collapsed to one
    #[arg(long, default_value_t = 3)]
    pub character_normalization_count: usize,

    /// Stem the tokens
    #[arg(long)]
    pub stem: bool,
}

/// Runs the idf command.
pub fn execute(args: IdfArgs) -> Result<()> {
    let cmd = meta(&args)?;
    let pcmd = cmd.clone();

    let tfidf = construct(&args)?;
    info!(
        "TF-IDF scheme built from {} documents",
        tfidf.documents()
    );

    let result = json!({
        "cmd": cmd,
        "pcmd": pcmd,
        "tfidf": tfidf,
    });
    save(&args.output, &result)
}

/// Builds the scheme by streaming the corpus.
fn construct(args: &IdfArgs) -> Result<TfIdf> {
    let tokenizer = Tokenizer::new(TokenizerConfig {
        stopwords: stopwords::english(),
        remove_unicode_entities: args.remove_unicode_entities,
        normalize_words: args.normalize_words,
        character_normalization_count: args.character_normalization_count,
        stem: args.stem,
        ..TokenizerConfig::default()
    });

    let file = std::fs::File::open(&args.file)
        .with_context(|| format!("could not open {}", args.file.display()))?;
    let reader = BufReader::new(file);

    let mut tfidf = TfIdf::new();
    for line in reader.lines() {
        let line = line.context("could not read corpus line")?;
        let record: Value = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed line: {}", e);
                continue;
            }
        };

        if args.remove_retweets && post::is_retweet(&record) {
            continue;
        }
        if args.skip_unverified && !post::is_verified(&record) {
            continue;
        }

        let tokens = tokenizer.tokenize(&post::full_text(&record));
        tfidf.add_document(&tokens);
    }

    Ok(tfidf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_corpus(posts: &[Value]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("corpus");
        for post in posts {
            writeln!(file, "{post}").expect("write post");
        }
        file
    }

    fn args(file: PathBuf, output: PathBuf) -> IdfArgs {
        IdfArgs {
            file,
            output,
            remove_retweets: false,
            skip_unverified: false,
            remove_unicode_entities: false,
            normalize_words: false,
            character_normalization_count: 3,
            stem: false,
        }
    }

    #[test]
    fn counts_documents_and_frequencies() {
        let corpus = write_corpus(&[
            json!({"text": "an early goal tonight", "timestamp_ms": "1000"}),
            json!({"text": "goal goal goal", "timestamp_ms": "2000"}),
        ]);

        let tfidf = construct(&args(corpus.path().to_path_buf(), PathBuf::new())).unwrap();

        assert_eq!(tfidf.documents(), 2);
        assert_eq!(tfidf.frequency("goal"), 2);
        assert_eq!(tfidf.frequency("tonight"), 1);
    }

    #[test]
    fn remove_retweets_excludes_them() {
        let corpus = write_corpus(&[
            json!({"text": "original", "retweeted_status": {"text": "original"}}),
            json!({"text": "fresh goal"}),
        ]);

        let mut idf_args = args(corpus.path().to_path_buf(), PathBuf::new());
        idf_args.remove_retweets = true;
        let tfidf = construct(&idf_args).unwrap();

        assert_eq!(tfidf.documents(), 1);
    }

    #[test]
    fn output_carries_the_class_tags() {
        let corpus = write_corpus(&[json!({"text": "a goal"})]);
        let output = tempfile::tempdir().unwrap();
        let output_path = output.path().join("idf.json");

        let mut idf_args = args(corpus.path().to_path_buf(), output_path.clone());
        idf_args.stem = true;
        execute(idf_args).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
        assert_eq!(written["tfidf"]["class"], "TFIDF");
        assert_eq!(written["tfidf"]["idf"]["class"], "IDF");
        assert_eq!(written["tfidf"]["idf"]["documents"], 1);
    }
}
