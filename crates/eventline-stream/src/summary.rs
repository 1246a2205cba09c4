//! The seam to the downstream summariser.
//!
//! Proper summarisation is a separate concern; the consumers only need
//! something to hand a closed node's best documents to. The trait keeps
//! that boundary explicit, and the bundled implementation simply takes the
//! leading documents' text up to a length budget.

use eventline_core::{Document, Vector};

/// Produces a textual summary from ranked documents.
pub trait Summarizer: Send {
    /// Summarises the documents, best-ranked first, within `length`
    /// characters. The query hints at the topic the summary should cover.
    fn summarize(&self, documents: &[&Document], length: usize, query: Option<&Vector>) -> String;
}

/// A baseline summariser that concatenates the leading documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadSummarizer;

impl Summarizer for LeadSummarizer {
    fn summarize(&self, documents: &[&Document], length: usize, _query: Option<&Vector>) -> String {
        let mut summary = String::new();

        for document in documents {
            let text = document.text().trim();
            if text.is_empty() {
                continue;
            }

            let appended = if summary.is_empty() {
                text.chars().count()
            } else {
                text.chars().count() + 1
            };
            if summary.chars().count() + appended > length {
                break;
            }

            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(text);
        }

        summary
    }
}
