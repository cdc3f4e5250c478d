//! Text preparation shared by chain building and fragment scoring.

/// Removal of hashtags, mentions, links and HTML entities from raw posts.
pub mod sanitize;

/// Word tokenization and its inverse, detokenization.
pub mod tokenizer;

pub use sanitize::sanitize;
pub use tokenizer::{detokenize, tokenize, tokenize_post};
