//! Top-level module for the word-level Markov chain.
//!
//! This module provides:
//! - The chain itself and its typed nodes and edges (`Chain`)
//! - Frequency counting and normalization (`ChainBuilder`)
//! - Weighted random walks turned back into text (`generator`)
//! - Fragment likelihood and next-word prediction (`scorer`)

/// Normalized chain: token nodes, weighted edges and the `START`/`END` sentinels.
///
/// Serializable as a plain `token -> {count, edges}` mapping.
pub mod chain;

/// Two-phase chain construction: count transitions, then normalize.
pub mod builder;

/// Weighted random walks from `START` to `END` with an injected random source.
pub mod generator;

/// Joint probability of a text fragment and most likely continuation.
pub mod scorer;

pub use builder::{ChainBuilder, build};
pub use chain::{Chain, ChainNode, END, Edge, START, WordFrequency};
pub use generator::{Walk, generate, generate_many, generate_tokens, sample_next};
pub use scorer::{Anchor, Break, Report, Score, Step, next_word_after, next_word_prediction, probability_of, probability_with, report, score};
