//! Accessors over raw post records.
//!
//! Posts arrive as opaque JSON objects, one per line of a corpus file. The
//! pipeline only ever reads a handful of fields; these functions centralise
//! that access, including the walk into `retweeted_status` and
//! `extended_tweet` for the full text.

use chrono::DateTime;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for post accessors.
pub type PostResult<T> = Result<T, PostError>;

/// Errors raised while reading post records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PostError {
    /// The record has neither `timestamp_ms` nor `created_at`.
    #[error("post has neither a 'timestamp_ms' nor a 'created_at' field")]
    MissingTimestamp,

    /// The record's timestamp field could not be parsed.
    #[error("could not parse post timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Extracts the full text of a post.
///
/// Walks into `retweeted_status` records, then prefers
/// `extended_tweet.full_text` over the truncated `text`. Returns an empty
/// string when neither exists.
pub fn full_text(post: &Value) -> String {
    let mut post = post;
    while let Some(retweeted) = post.get("retweeted_status") {
        post = retweeted;
    }

    if let Some(full) = post.pointer("/extended_tweet/full_text").and_then(Value::as_str) {
        return full.to_string();
    }

    post.get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Extracts the event timestamp of a post, in seconds since the epoch.
///
/// Prefers `timestamp_ms` (milliseconds, truncated to the second), falling
/// back to parsing `created_at` as a Twitter-style or RFC 3339 datetime.
pub fn timestamp(post: &Value) -> PostResult<i64> {
    if let Some(raw) = post.get("timestamp_ms") {
        let millis = match raw {
            Value::String(s) => s
                .parse::<i64>()
                .map_err(|_| PostError::InvalidTimestamp(s.clone()))?,
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| PostError::InvalidTimestamp(raw.to_string()))?,
            other => return Err(PostError::InvalidTimestamp(other.to_string())),
        };
        return Ok((millis - millis.rem_euclid(1000)) / 1000);
    }

    if let Some(created_at) = post.get("created_at").and_then(Value::as_str) {
        return parse_created_at(created_at)
            .ok_or_else(|| PostError::InvalidTimestamp(created_at.to_string()));
    }

    Err(PostError::MissingTimestamp)
}

fn parse_created_at(created_at: &str) -> Option<i64> {
    // Twitter's classic format first: `Wed Oct 10 20:19:24 +0000 2018`.
    if let Ok(datetime) = DateTime::parse_from_str(created_at, "%a %b %d %H:%M:%S %z %Y") {
        return Some(datetime.timestamp());
    }

    DateTime::parse_from_rfc3339(created_at)
        .ok()
        .map(|datetime| datetime.timestamp())
}

/// Checks whether the post is a retweet.
pub fn is_retweet(post: &Value) -> bool {
    post.get("retweeted_status").is_some()
}

/// Checks whether the post's author is verified.
pub fn is_verified(post: &Value) -> bool {
    post.pointer("/user/verified")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Returns the post's id as a string, if present.
pub fn id(post: &Value) -> Option<String> {
    match post.get("id_str").or_else(|| post.get("id")) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns the post's language code, if present.
pub fn language(post: &Value) -> Option<&str> {
    post.get("lang").and_then(Value::as_str)
}

/// Counts the hashtags in the post's entities.
pub fn hashtag_count(post: &Value) -> usize {
    post.pointer("/entities/hashtags")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// Counts the URLs in the post's entities. URLs include links and media.
pub fn url_count(post: &Value) -> usize {
    post.pointer("/entities/urls")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

/// Returns an author statistic such as `favourites_count`.
pub fn author_stat(post: &Value, stat: &str) -> i64 {
    post.pointer(&format!("/user/{stat}"))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Returns the author's profile description, if present.
pub fn author_description(post: &Value) -> Option<&str> {
    post.pointer("/user/description").and_then(Value::as_str)
}
