use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors surfaced by chain construction, persistence and scoring.
///
/// Unknown tokens are deliberately absent: scoring and prediction degrade
/// to a zero probability or the `END` sentinel instead of failing.
#[derive(Error, Debug)]
pub enum ChainError {
	/// No post contributed a single token, so there is nothing to chain.
	#[error("No eligible posts to build a chain from")]
	EmptyCorpus,

	/// Empty or whitespace-only fragment handed to the scorer.
	#[error("Fragment must contain at least one word")]
	MalformedFragment,

	/// The persistence layer could not be read or written.
	#[error("Chain store unavailable: {0}")]
	StoreUnavailable(#[from] std::io::Error),

	/// The corpus provider failed to deliver the author's posts.
	#[error("Corpus unavailable for author '{author}': {source}")]
	CorpusUnavailable {
		author: String,
		#[source]
		source: std::io::Error,
	},

	/// A stored blob exists but cannot be decoded into a valid chain.
	#[error("Stored chain for '{author}' is corrupt: {reason}")]
	Corrupt { author: String, reason: String },

	/// A stored blob was written with a format version this build cannot read.
	#[error("Unsupported chain format version {found} (expected {expected})")]
	UnsupportedVersion { found: u16, expected: u16 },

	/// A chain could not be serialized.
	#[error("Chain encoding failed: {0}")]
	Encoding(String),

	/// Author identifier cannot be used as a storage key.
	#[error("Invalid author identifier '{0}'")]
	InvalidAuthor(String),

	/// Configuration loading or validation error.
	#[error("Configuration error: {0}")]
	Config(String),
}
