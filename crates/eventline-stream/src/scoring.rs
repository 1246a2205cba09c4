//! Document scoring for summarisation candidates.
//!
//! When a timeline node closes, its documents are ranked and only the best
//! reach the summariser. The score is the product of two components:
//!
//! - a brevity score, `min(exp(1 - r / tokens), 1)`, which penalises posts
//!   much shorter than the ideal length `r`, and
//! - an emotion score, the complement of the capitalised share of letters:
//!   shouty posts rank low.

use eventline_core::Document;
use eventline_nlp::Tokenizer;

/// Ideal token count for the brevity score.
const IDEAL_TOKENS: f64 = 10.0;

/// Computes the brevity score of a text from its token count.
///
/// Texts with no tokens score 0; texts at or beyond the ideal length score
/// 1.
pub fn brevity_score(tokens: usize, ideal: f64) -> f64 {
    if tokens == 0 {
        return 0.0;
    }

    (1.0 - ideal / tokens as f64).exp().min(1.0)
}

/// Computes the emotion score of a text.
///
/// The score is `1 - upper / (upper + lower)` over the ASCII letters, or 0
/// when the text has none.
pub fn emotion_score(text: &str) -> f64 {
    let upper = text.chars().filter(char::is_ascii_uppercase).count();
    let lower = text.chars().filter(char::is_ascii_lowercase).count();

    if upper + lower == 0 {
        return 0.0;
    }

    1.0 - upper as f64 / (upper + lower) as f64
}

/// Ranks documents by brevity times emotion, best first.
pub fn rank_documents<'a>(documents: Vec<&'a Document>, tokenizer: &Tokenizer) -> Vec<&'a Document> {
    let mut scored: Vec<(&Document, f64)> = documents
        .into_iter()
        .map(|document| {
            let tokens = tokenizer.tokenize(document.text()).len();
            let score = brevity_score(tokens, IDEAL_TOKENS) * emotion_score(document.text());
            (document, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(document, _)| document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventline_core::Vector;

    #[test]
    fn brevity_zero_for_empty_text() {
        assert_eq!(brevity_score(0, 10.0), 0.0);
    }

    #[test]
    fn brevity_capped_at_one() {
        assert_eq!(brevity_score(50, 10.0), 1.0);
    }

    #[test]
    fn brevity_penalises_short_texts() {
        let short = brevity_score(2, 10.0);
        let longer = brevity_score(8, 10.0);
        assert!(short < longer);
        assert!((short - (1.0f64 - 5.0).exp()).abs() < 1e-9);
    }

    #[test]
    fn emotion_zero_without_letters() {
        assert_eq!(emotion_score("1234 !!!"), 0.0);
    }

    #[test]
    fn emotion_penalises_capitals() {
        assert!(emotion_score("GOAL GOAL GOAL") < emotion_score("what a goal"));
        assert_eq!(emotion_score("goal"), 1.0);
    }

    #[test]
    fn rank_prefers_calm_full_sentences() {
        let tokenizer = Tokenizer::default();

        let calm_text = "what a goal that was from the edge of the area tonight";
        let calm = Document::new(calm_text, Vector::new());
        let shouty = Document::new(
            "GOAL GOAL GOAL GOAL GOAL GOAL GOAL GOAL GOAL GOAL",
            Vector::new(),
        );

        let ranked = rank_documents(vec![&shouty, &calm], &tokenizer);
        assert_eq!(ranked[0].text(), calm_text);
    }
}
