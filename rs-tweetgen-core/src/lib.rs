//! Word-level Markov chains built from an author's short posts.
//!
//! This crate provides:
//! - Post sanitization and reversible word tokenization
//! - First-order chain construction with normalized transition probabilities
//! - Synthetic post generation by weighted random walk
//! - Fragment likelihood scoring and next-word prediction
//! - Versioned, atomic chain persistence keyed by author
//!
//! The [`service::ChainService`] facade ties storage and the corpus
//! provider together behind `get_or_build`.

/// Crate-wide error type.
pub mod error;

/// TOML configuration with compiled defaults.
pub mod config;

/// Sanitizer, tokenizer and detokenizer.
pub mod text;

/// Chain model, builder, generator and scorer.
pub mod model;

/// Blob storage, chain store and corpus providers.
pub mod storage;

/// Author-level facade over storage, building, generation and scoring.
pub mod service;

/// File and path helpers.
///
/// Not exposed
pub(crate) mod io;

pub use error::{ChainError, Result};
