//! eventline-nlp: text processing for the Eventline TDT pipeline
//!
//! This crate provides:
//! - A configurable tokenizer with hashtag splitting, accent stripping,
//!   character normalization, stop-word removal and memoised stemming
//! - A text cleaner that prepares post text for presentation
//! - Accessors over raw post records (full text, timestamps, author stats)
//! - A built-in English stop-word list

pub mod cleaner;
pub mod post;
pub mod stopwords;
pub mod tokenizer;

pub use cleaner::{Cleaner, CleanerConfig};
pub use post::{PostError, PostResult};
pub use tokenizer::{Tokenizer, TokenizerConfig};
