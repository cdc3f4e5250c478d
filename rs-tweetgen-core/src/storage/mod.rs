//! Persistence collaborators of the chain: blob storage, the chain store
//! layered on top of it, and the source of raw posts.

/// Byte-oriented, author-keyed storage with atomic replacement.
pub mod blob;

/// Versioned postcard encoding of chains over a blob store.
pub mod chain_store;

/// Raw post sources, reposts flagged.
pub mod corpus;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use chain_store::{ChainStore, FORMAT_VERSION, StoredChain};
pub use corpus::{CorpusProvider, FsCorpus, MemoryCorpus, Post};

use crate::error::{ChainError, Result};

/// Checks that an author identifier is usable as a storage key.
///
/// Accepts ASCII letters, digits, `_`, `-` and `.`, not starting with a
/// dot, so a key can never leave its directory or hide as a dotfile.
pub fn validate_author(author: &str) -> Result<&str> {
	let valid = !author.is_empty()
		&& !author.starts_with('.')
		&& author
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

	if valid {
		Ok(author)
	} else {
		Err(ChainError::InvalidAuthor(author.to_owned()))
	}
}
