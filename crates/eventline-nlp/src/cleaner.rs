//! The cleaner improves the presentation of post text.
//!
//! Where the tokenizer prepares text for weighting, the cleaner prepares it
//! for people: summaries built from posts are noisy, so the cleaner strips
//! platform syntax, completes sentences and fixes capitalisation. Every step
//! is gated by a configuration flag so all text is cleaned the same way.

use regex::Regex;
use serde_json::Value;

/// Quote characters considered when completing sentences.
const CLOSING_QUOTES: &[char] = &['\'', '"', '\u{bb}'];

/// Quote characters considered when capitalising the first letter.
const OPENING_QUOTES: &[char] = &['\'', '"', '\u{ab}'];

/// ASCII punctuation, used by the sentence-completion rules.
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Configuration for the [`Cleaner`].
#[derive(Debug, Clone, Default)]
pub struct CleanerConfig {
    /// Remove HTML entities such as `&amp;`.
    pub remove_alt_codes: bool,
    /// Add a terminating period to the last sentence if it has none.
    pub complete_sentences: bool,
    /// Collapse new lines into spaces.
    pub collapse_new_lines: bool,
    /// Collapse runs of whitespace, including whitespace before periods.
    pub collapse_whitespaces: bool,
    /// Capitalize the first letter.
    pub capitalize_first: bool,
    /// Drop non-ASCII characters, including emojis.
    pub remove_unicode_entities: bool,
    /// Remove URLs.
    pub remove_urls: bool,
    /// Remove hashtags that cannot be split.
    pub remove_hashtags: bool,
    /// Split camel-case hashtags into their words.
    pub split_hashtags: bool,
    /// Remove the `RT @user: ` prefix.
    pub remove_retweet_prefix: bool,
    /// Replace mentions with the mentioned user's display name.
    /// Requires the post record, so it only applies in
    /// [`Cleaner::clean_post`].
    pub replace_mentions: bool,
}

/// Cleans post text for presentation.
pub struct Cleaner {
    config: CleanerConfig,
    url_pattern: Regex,
    alt_code_pattern: Regex,
    hashtag_pattern: Regex,
    camel_case_pattern: Regex,
    retweet_pattern: Regex,
    whitespace_pattern: Regex,
    whitespace_period_pattern: Regex,
}

impl Cleaner {
    /// Creates a cleaner with the given configuration.
    pub fn new(config: CleanerConfig) -> Self {
        Self {
            config,
            url_pattern: Regex::new(r"(https?://)?([^\s]+)?\.[a-zA-Z0-9]+?/?([^\s,\.]+)?")
                .expect("url pattern"),
            alt_code_pattern: Regex::new(r"&.+?;").expect("alt-code pattern"),
            hashtag_pattern: Regex::new(r"#([a-zA-Z0-9_]+)").expect("hashtag pattern"),
            camel_case_pattern: Regex::new(r"(([a-z]+)?([A-Z]+|[0-9]+))").expect("camel pattern"),
            retweet_pattern: Regex::new(r"^RT @.+?: ").expect("retweet pattern"),
            whitespace_pattern: Regex::new(r"(\s{2,}|\t)+").expect("whitespace pattern"),
            whitespace_period_pattern: Regex::new(r"\s\.").expect("whitespace-period pattern"),
        }
    }

    /// Cleans text without a post record.
    ///
    /// Mention replacement is skipped; use [`Cleaner::clean_post`] when the
    /// original record is available.
    pub fn clean(&self, text: &str) -> String {
        self.apply(text, None)
    }

    /// Cleans a post's text, using the record to resolve mentions.
    pub fn clean_post(&self, text: &str, post: &Value) -> String {
        self.apply(text, Some(post))
    }

    fn apply(&self, text: &str, post: Option<&Value>) -> String {
        let config = &self.config;
        let mut text = text.trim().to_string();

        if config.collapse_new_lines {
            text = self.collapse_new_lines(&text);
        }
        if config.remove_alt_codes {
            text = self.alt_code_pattern.replace_all(&text, "").into_owned();
        }
        if config.remove_unicode_entities {
            text = text.chars().filter(char::is_ascii).collect();
        }
        if config.remove_urls {
            text = self.url_pattern.replace_all(&text, " ").into_owned();
        }
        if config.split_hashtags {
            text = self.split_hashtags(&text);
        }
        if config.remove_hashtags {
            text = self.hashtag_pattern.replace_all(&text, " ").into_owned();
        }
        if config.remove_retweet_prefix {
            text = self.retweet_pattern.replace(&text, " ").into_owned();
        }
        if config.complete_sentences {
            text = complete_sentence(&text);
        }
        if config.collapse_whitespaces {
            text = self.collapse_whitespaces(&text);
        }
        if config.replace_mentions {
            if let Some(post) = post {
                text = replace_mentions(&text, post);
            }
        }
        if config.capitalize_first {
            text = capitalize_first(&text);
        }

        text.trim().to_string()
    }

    fn collapse_new_lines(&self, text: &str) -> String {
        text.split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| {
                if self.config.complete_sentences {
                    complete_sentence(line)
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collapse_whitespaces(&self, text: &str) -> String {
        let text = self.whitespace_pattern.replace_all(text, " ");
        self.whitespace_period_pattern
            .replace_all(&text, ".")
            .into_owned()
    }

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
}

/// Adds a terminating period if the text does not end with punctuation.
///
/// A trailing quote is kept trailing: the period goes before it unless the
/// quoted sentence already ends with punctuation.
fn complete_sentence(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();

    let Some(&last) = chars.last() else {
        return text.to_string();
    };

    let is_quote = |c: char| CLOSING_QUOTES.contains(&c);
    let is_punctuation = |c: char| PUNCTUATION.contains(c);

    if (is_punctuation(last) && !is_quote(last))
        || (chars.len() > 1 && is_quote(last) && is_punctuation(chars[chars.len() - 2]))
    {
        return text.to_string();
    }

    if chars.len() == 1 && is_quote(last) {
        return text.to_string();
    }

    if chars.len() > 1 && is_quote(last) {
        let body: String = chars[..chars.len() - 1].iter().collect();
        return format!("{body}.{last}");
    }

    format!("{text}.")
}

/// Capitalizes the first letter, skipping over an opening quote.
fn capitalize_first(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();

    let Some(&first) = chars.first() else {
        return text.to_string();
    };

    if chars.len() == 1 && OPENING_QUOTES.contains(&first) {
        return text.to_string();
    }

    if chars.len() > 1 && OPENING_QUOTES.contains(&first) {
        let rest: String = chars[2..].iter().collect();
        return format!("{}{}{}", first, chars[1].to_uppercase(), rest);
    }

    let rest: String = chars[1..].iter().collect();
    format!("{}{}", first.to_uppercase(), rest)
}

/// Replaces mentions with the mentioned users' display names.
///
/// Display names are looked up in `entities.user_mentions` of the post, its
/// retweeted and quoted records, and their extended variants.
fn replace_mentions(text: &str, post: &Value) -> String {
    let mut text = text.to_string();

    let sources = [
        post.pointer("/entities/user_mentions"),
        post.pointer("/extended_tweet/entities/user_mentions"),
        post.pointer("/retweeted_status/entities/user_mentions"),
        post.pointer("/retweeted_status/extended_tweet/entities/user_mentions"),
        post.pointer("/quoted_status/entities/user_mentions"),
        post.pointer("/quoted_status/extended_tweet/entities/user_mentions"),
    ];

    for mentions in sources.into_iter().flatten() {
        let Some(mentions) = mentions.as_array() else {
            continue;
        };

        for mention in mentions {
            let (Some(screen_name), Some(name)) = (
                mention.get("screen_name").and_then(Value::as_str),
                mention.get("name").and_then(Value::as_str),
            ) else {
                continue;
            };

            if name.contains('\\') {
                continue;
            }

            let handle = format!("@{screen_name}");
            let pattern = Regex::new(&format!(r"(?i){}\b", regex::escape(&handle)));
            if let Ok(pattern) = pattern {
                text = pattern.replace_all(&text, name).into_owned();
            }
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cleaner(config: CleanerConfig) -> Cleaner {
        Cleaner::new(config)
    }

    #[test]
    fn strips_surrounding_whitespace() {
        let cleaner = cleaner(CleanerConfig::default());
        assert_eq!(cleaner.clean("  goal!  "), "goal!");
    }

    #[test]
    fn complete_sentence_adds_period() {
        assert_eq!(complete_sentence("What a goal"), "What a goal.");
    }

    #[test]
    fn complete_sentence_keeps_existing_punctuation() {
        assert_eq!(complete_sentence("What a goal!"), "What a goal!");
    }

    #[test]
    fn complete_sentence_period_before_quote() {
        assert_eq!(complete_sentence("\"What a goal\""), "\"What a goal.\"");
    }

    #[test]
    fn complete_sentence_quoted_punctuation_untouched() {
        assert_eq!(complete_sentence("\"What a goal!\""), "\"What a goal!\"");
    }

    #[test]
    fn capitalize_first_basic() {
        assert_eq!(capitalize_first("what a goal."), "What a goal.");
    }

    #[test]
    fn capitalize_first_after_quote() {
        assert_eq!(capitalize_first("\"what a goal.\""), "\"What a goal.\"");
    }

    #[test]
    fn collapse_whitespaces_including_before_period() {
        let cleaner = cleaner(CleanerConfig {
            collapse_whitespaces: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("a  goal ."), "a goal.");
    }

    #[test]
    fn collapse_new_lines() {
        let cleaner = cleaner(CleanerConfig {
            collapse_new_lines: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("first\nsecond"), "first second");
    }

    #[test]
    fn removes_retweet_prefix() {
        let cleaner = cleaner(CleanerConfig {
            remove_retweet_prefix: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("RT @fan: what a goal"), "what a goal");
    }

    #[test]
    fn removes_urls() {
        let cleaner = cleaner(CleanerConfig {
            remove_urls: true,
            collapse_whitespaces: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("watch https://example.com/clip now"), "watch now");
    }

    #[test]
    fn splits_hashtags() {
        let cleaner = cleaner(CleanerConfig {
            split_hashtags: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("#ManchesterUnited win"), "Manchester United win");
    }

    #[test]
    fn removes_unsplittable_hashtags() {
        let cleaner = cleaner(CleanerConfig {
            split_hashtags: true,
            remove_hashtags: true,
            collapse_whitespaces: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("#goal for the ages"), "for the ages");
    }

    #[test]
    fn replaces_mentions_from_post() {
        let cleaner = cleaner(CleanerConfig {
            replace_mentions: true,
            ..CleanerConfig::default()
        });
        let post = json!({
            "entities": {
                "user_mentions": [
                    {"screen_name": "mosalah", "name": "Mohamed Salah"}
                ]
            }
        });
        assert_eq!(
            cleaner.clean_post("@mosalah scores again", &post),
            "Mohamed Salah scores again"
        );
    }

    #[test]
    fn mentions_skipped_without_post() {
        let cleaner = cleaner(CleanerConfig {
            replace_mentions: true,
            ..CleanerConfig::default()
        });
        assert_eq!(cleaner.clean("@mosalah scores again"), "@mosalah scores again");
    }
}
