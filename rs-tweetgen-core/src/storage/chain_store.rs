use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::blob::BlobStore;
use super::validate_author;
use crate::error::{ChainError, Result};
use crate::model::{Chain, START};

/// Version written at the head of every stored blob.
pub const FORMAT_VERSION: u16 = 1;

/// A chain as persisted, with the size of the corpus it was built from.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredChain {
	/// Number of posts that contributed tokens, the `START` count.
	pub posts: u64,
	pub chain: Chain,
}

/// Wire layout after the version prefix.
///
/// postcard encodes struct fields back to back, so a blob is
/// `version` followed by exactly this body.
#[derive(Serialize)]
struct BodyRef<'a> {
	posts: u64,
	chain: &'a Chain,
}

#[derive(Deserialize)]
struct Body {
	posts: u64,
	chain: Chain,
}

/// Encodes a stored chain as `version | posts | chain` with postcard.
pub fn encode(record: &StoredChain) -> Result<Vec<u8>> {
	let body = BodyRef { posts: record.posts, chain: &record.chain };
	postcard::to_stdvec(&(FORMAT_VERSION, body)).map_err(|e| ChainError::Encoding(e.to_string()))
}

/// Decodes and validates a blob written by [`encode`].
///
/// # Errors
/// - [`ChainError::UnsupportedVersion`] if the version prefix is unknown
/// - [`ChainError::Corrupt`] if the bytes do not decode or the chain
///   breaks its invariants
pub fn decode(author: &str, bytes: &[u8]) -> Result<StoredChain> {
	let corrupt = |reason: String| ChainError::Corrupt { author: author.to_owned(), reason };

	let (version, rest) = postcard::take_from_bytes::<u16>(bytes).map_err(|e| corrupt(e.to_string()))?;
	if version != FORMAT_VERSION {
		return Err(ChainError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
	}

	let body: Body = postcard::from_bytes(rest).map_err(|e| corrupt(e.to_string()))?;
	body.chain.validate().map_err(corrupt)?;

	Ok(StoredChain { posts: body.posts, chain: body.chain })
}

/// Pretty JSON rendering of a chain, for inspection and export.
pub fn to_json(chain: &Chain) -> Result<String> {
	serde_json::to_string_pretty(chain).map_err(|e| ChainError::Encoding(e.to_string()))
}

/// Serializes chains into a [`BlobStore`], one blob per author.
///
/// The store owns the serialized form exclusively; callers only ever see
/// decoded, validated chains.
#[derive(Debug)]
pub struct ChainStore<B: BlobStore> {
	blobs: B,
}

impl<B: BlobStore> ChainStore<B> {
	pub fn new(blobs: B) -> Self {
		Self { blobs }
	}

	pub fn blobs(&self) -> &B {
		&self.blobs
	}

	/// Persists `chain` for `author`, replacing any previous version atomically.
	///
	/// The recorded post count is the number of posts linked from `START`.
	pub fn save(&self, author: &str, chain: &Chain) -> Result<()> {
		let posts = chain.get(START).map_or(0, |node| node.count());
		self.save_record(author, &StoredChain { posts, chain: chain.clone() })
	}

	/// Persists a chain along with the corpus size it was built from.
	pub fn save_record(&self, author: &str, record: &StoredChain) -> Result<()> {
		let author = validate_author(author)?;
		let bytes = encode(record)?;
		self.blobs.write(author, &bytes)?;
		info!("Saved chain for '{}' ({} nodes, {} bytes)", author, record.chain.len(), bytes.len());
		Ok(())
	}

	/// Loads the chain stored for `author`, or `None` if there is none.
	pub fn load(&self, author: &str) -> Result<Option<Chain>> {
		Ok(self.load_record(author)?.map(|record| record.chain))
	}

	/// Loads the stored chain and its corpus size.
	///
	/// # Errors
	/// Store failures, corrupt blobs and unknown versions are errors;
	/// a missing blob is `Ok(None)`.
	pub fn load_record(&self, author: &str) -> Result<Option<StoredChain>> {
		let author = validate_author(author)?;
		let Some(bytes) = self.blobs.read(author)? else {
			debug!("No stored chain for '{}'", author);
			return Ok(None);
		};

		match decode(author, &bytes) {
			Ok(record) => {
				debug!("Loaded chain for '{}' ({} nodes)", author, record.chain.len());
				Ok(Some(record))
			}
			Err(e) => {
				warn!("Could not decode stored chain for '{}': {}", author, e);
				Err(e)
			}
		}
	}

	/// Authors that currently have a stored chain.
	pub fn authors(&self) -> Result<Vec<String>> {
		Ok(self.blobs.keys()?)
	}
}
