//! CONSUME command - replay an event corpus and build a timeline.
//!
//! The tool runs two tasks over a shared queue: a reader replaying the
//! corpus and a consumer processing it. When an understanding corpus is
//! given, an understanding pass runs first (at high speed) to build a
//! TF-IDF scheme; the result is cached next to the understanding file and
//! reused unless `--no-cache` is passed.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use eventline_core::{TermWeighting, TfIdf};
use eventline_stream::{
    EldConsumer, EldConsumerConfig, PostQueue, ReaderConfig, SimulatedFileReader, ZhaoConsumer,
    ZhaoConsumerConfig,
};
use eventline_tdt::Timeline;

use super::{meta, save};

/// Replay speed of the understanding pass, which is always retrospective.
const UNDERSTANDING_SPEED: f64 = 120.0;

/// The available consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum ConsumerKind {
    /// Cluster posts incrementally and burst-test the clusters.
    #[value(name = "ELDConsumer")]
    #[serde(rename = "ELDConsumer")]
    Eld,

    /// Watch the posting volume for spikes.
    #[value(name = "ZhaoConsumer")]
    #[serde(rename = "ZhaoConsumer")]
    Zhao,
}

/// Arguments for the consume command.
#[derive(Args, Serialize)]
pub struct ConsumeArgs {
    /// The event corpus to consume
    #[arg(short, long)]
    pub event: PathBuf,

    /// The consumer to use
    #[arg(short, long, value_enum)]
    pub consumer: ConsumerKind,

    /// Pre-event corpus used to understand the event's vocabulary
    #[arg(short, long)]
    pub understanding: Option<PathBuf>,

    /// Where to save the timeline (default: `.out` next to the event file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rebuild the understanding even when a cached copy exists
    #[arg(long)]
    pub no_cache: bool,

    /// Replay speed; 1 is real time, larger is faster
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Minutes to skip from the beginning of the corpus
    #[arg(long, default_value_t = 0)]
    pub skip: i64,

    /// Seconds without new posts before the consumer stops
    #[arg(long, default_value_t = 60)]
    pub max_inactivity: i64,

    /// Minutes of the corpus to read; negative reads everything
    #[arg(long, default_value_t = -1)]
    pub max_time: i64,

    /// Skip retweets while reading the corpus
    #[arg(long)]
    pub skip_retweets: bool,

    /// Skip posts from unverified authors while reading the corpus
    #[arg(long)]
    pub skip_unverified: bool,

    /// Seconds between wake-ups (ZhaoConsumer)
    #[arg(long, default_value_t = 5)]
    pub periodicity: i64,

    /// Path to a TF-IDF scheme built by the idf tool
    #[arg(long)]
    pub scheme: Option<PathBuf>,

    /// Minimum cluster size before a burst test (ELDConsumer)
    #[arg(long, default_value_t = 3)]
    pub min_size: usize,

    /// Exclusive minimum burst for a breaking term (ELDConsumer)
    #[arg(long, default_value_t = 0.5)]
    pub min_burst: f64,

    /// Minimum similarity between a post and a cluster (ELDConsumer)
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Minimum increase in posting rate for a burst (ZhaoConsumer)
    #[arg(long, default_value_t = 1.7)]
    pub post_rate: f64,

    /// Maximum intra-similarity of a candidate cluster (ELDConsumer)
    #[arg(long, default_value_t = 0.8)]
    pub max_intra_similarity: f64,

    /// Cluster freeze period in seconds (ELDConsumer)
    #[arg(long, default_value_t = 20)]
    pub freeze_period: i64,

    /// Store the logarithm of nutrition in checkpoints (ELDConsumer)
    #[arg(long)]
    pub log_nutrition: bool,
}

/// Runs the consume command.
pub async fn execute(args: ConsumeArgs) -> Result<()> {
    let cmd = meta(&args)?;

    let scheme = resolve_scheme(&args).await?;
    let scheme_name = scheme.name();

    info!("Starting event period");
    let timeline = consume(&args, scheme).await?;
    info!("Event period ended");

    let output = args.output.clone().unwrap_or_else(|| default_output(&args.event));

    let mut pcmd = cmd.clone();
    pcmd["output"] = json!(output);
    pcmd["scheme"] = json!(scheme_name);

    let result = json!({
        "cmd": cmd,
        "pcmd": pcmd,
        "timeline": timeline,
    });
    save(&output, &result)?;

    Ok(())
}

/// The default output path: `.out/<basename>` next to the event file.
fn default_output(event: &Path) -> PathBuf {
    let directory = event.parent().unwrap_or_else(|| Path::new("."));
    let basename = event.file_name().unwrap_or_default();
    directory.join(".out").join(basename)
}

/// Picks the weighting scheme: understanding first, then `--scheme`, then
/// plain term frequencies.
async fn resolve_scheme(args: &ConsumeArgs) -> Result<TermWeighting> {
    if let Some(understanding) = &args.understanding {
        let tfidf = understand(args, understanding).await?;
        return Ok(TermWeighting::TfIdf(tfidf));
    }

    if let Some(path) = &args.scheme {
        let tfidf = load_scheme(path)?;
        return Ok(TermWeighting::TfIdf(tfidf));
    }

    Ok(TermWeighting::Tf)
}

/// Runs or reloads the understanding pass.
///
/// The resulting scheme is cached under `.cache/` next to the
/// understanding file; the cache wins unless `--no-cache` is given.
async fn understand(args: &ConsumeArgs, understanding: &Path) -> Result<TfIdf> {
    let cache = cache_path(understanding);

    if !args.no_cache && cache.exists() {
        info!("Using cached understanding from {}", cache.display());
        return load_scheme(&cache);
    }

    info!("Starting understanding period");

    let queue = PostQueue::new();
    let reader = SimulatedFileReader::new(
        queue.clone(),
        ReaderConfig {
            speed: UNDERSTANDING_SPEED,
            skip_time: 0,
            max_time: -1,
            skip_retweets: args.skip_retweets,
            skip_unverified: args.skip_unverified,
        },
    )?;

    let mut consumer = EldConsumer::new(queue);
    let (read, tfidf) = tokio::join!(
        reader.read(understanding),
        consumer.understand(args.max_inactivity)
    );
    read?;
    let tfidf = tfidf?;

    save(&cache, &json!({ "tfidf": &tfidf }))?;
    info!("Understanding period ended");

    Ok(tfidf)
}

/// The cache path for an understanding file: `.cache/<basename>` next to
/// it.
fn cache_path(understanding: &Path) -> PathBuf {
    let directory = understanding.parent().unwrap_or_else(|| Path::new("."));
    let basename = understanding.file_name().unwrap_or_default();
    directory.join(".cache").join(basename)
}

/// Loads a TF-IDF scheme from an idf-tool output or cache file.
fn load_scheme(path: &Path) -> Result<TfIdf> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read scheme from {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;

    let Some(tfidf) = value.get("tfidf") else {
        bail!("{} does not contain a TF-IDF scheme", path.display());
    };

    serde_json::from_value(tfidf.clone())
        .with_context(|| format!("invalid TF-IDF scheme in {}", path.display()))
}

/// Replays the event corpus through the selected consumer.
async fn consume(args: &ConsumeArgs, scheme: TermWeighting) -> Result<Timeline> {
    let queue = PostQueue::new();

    let reader = SimulatedFileReader::new(
        queue.clone(),
        ReaderConfig {
            speed: args.speed,
            skip_time: args.skip * 60,
            max_time: if args.max_time >= 0 {
                args.max_time * 60
            } else {
                args.max_time
            },
            skip_retweets: args.skip_retweets,
            skip_unverified: args.skip_unverified,
        },
    )?;

    let timeline = match args.consumer {
        ConsumerKind::Eld => {
            let config = EldConsumerConfig {
                threshold: args.threshold,
                freeze_period: args.freeze_period,
                min_size: args.min_size,
                max_intra_similarity: args.max_intra_similarity,
                min_burst: args.min_burst,
                log_nutrition: args.log_nutrition,
                ..EldConsumerConfig::default()
            };
            let mut consumer = EldConsumer::with_config(queue, config, scheme);

            let (read, timeline) =
                tokio::join!(reader.read(&args.event), consumer.run(args.max_inactivity));
            read?;
            timeline?
        }
        ConsumerKind::Zhao => {
            let config = ZhaoConsumerConfig {
                periodicity: args.periodicity,
                post_rate: args.post_rate,
            };
            let mut consumer = ZhaoConsumer::with_config(queue, config, scheme);

            let (read, timeline) =
                tokio::join!(reader.read(&args.event), consumer.run(args.max_inactivity));
            read?;
            timeline?
        }
    };

    Ok(timeline)
}
