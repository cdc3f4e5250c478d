//! Author-level entry points: fetch or rebuild a chain, then generate and score.

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::model::{self, Anchor, Chain, ChainBuilder, Score};
use crate::storage::{BlobStore, ChainStore, CorpusProvider, StoredChain};
use crate::text::tokenize_post;

/// When a stored chain is considered stale.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildPolicy {
	/// Only rebuild on explicit request or when nothing is stored.
	#[default]
	Explicit,
	/// Also rebuild when the number of posts contributing to the chain
	/// changed since it was stored. Costs one corpus fetch and
	/// tokenization pass per lookup.
	OnCorpusChange,
}

/// Ties a chain store to a corpus provider.
///
/// # Responsibilities
/// - Serve the stored chain of an author
/// - Build, persist and serve a fresh one when asked to or when none exists
/// - Expose generation and scoring over a loaded chain
///
/// Concurrent rebuilds for the same author are not coordinated here: the
/// blob store's atomic replace makes the last writer win.
#[derive(Debug)]
pub struct ChainService<B: BlobStore, C: CorpusProvider> {
	store: ChainStore<B>,
	corpus: C,
	policy: RebuildPolicy,
}

impl<B: BlobStore, C: CorpusProvider> ChainService<B, C> {
	pub fn new(blobs: B, corpus: C, policy: RebuildPolicy) -> Self {
		Self { store: ChainStore::new(blobs), corpus, policy }
	}

	pub fn store(&self) -> &ChainStore<B> {
		&self.store
	}

	/// Returns the chain of `author`, building it first if needed.
	///
	/// A chain is built from the author's posts (reposts excluded) when
	/// `force_new` is set, when nothing is stored, or when the rebuild
	/// policy deems the stored chain stale. The fresh chain replaces the
	/// stored one.
	///
	/// # Returns
	/// - `Ok(Some(chain))` with the stored or freshly built chain
	/// - `Ok(None)` if the author has no eligible post; nothing is persisted
	///
	/// # Errors
	/// Corpus and store failures propagate, distinct from `Ok(None)`.
	pub fn get_or_build(&self, author: &str, force_new: bool) -> Result<Option<Chain>> {
		Ok(self.get_or_build_record(author, force_new)?.map(|record| record.chain))
	}

	/// Same as [`ChainService::get_or_build`], keeping the stored post count.
	pub fn get_or_build_record(&self, author: &str, force_new: bool) -> Result<Option<StoredChain>> {
		if !force_new {
			if let Some(stored) = self.store.load_record(author)? {
				match self.policy {
					RebuildPolicy::Explicit => return Ok(Some(stored)),
					RebuildPolicy::OnCorpusChange => {
						let posts = self.eligible_posts(author)?;
						let contributing = contributing_posts(&posts);
						if contributing == stored.posts {
							return Ok(Some(stored));
						}
						info!(
							"Corpus of '{}' changed ({} -> {} posts), rebuilding",
							author, stored.posts, contributing
						);
						return self.build_and_save(author, posts);
					}
				}
			}
		}

		let posts = self.eligible_posts(author)?;
		self.build_and_save(author, posts)
	}

	/// Non-repost texts of `author`, including those sanitized to nothing.
	fn eligible_posts(&self, author: &str) -> Result<Vec<String>> {
		let posts: Vec<String> = self
			.corpus
			.posts(author)?
			.into_iter()
			.filter(|post| !post.is_repost)
			.map(|post| post.text)
			.collect();
		debug!("{} eligible posts for '{}'", posts.len(), author);
		Ok(posts)
	}

	fn build_and_save(&self, author: &str, posts: Vec<String>) -> Result<Option<StoredChain>> {
		let mut builder = ChainBuilder::new();
		for post in &posts {
			builder.add_text(post);
		}
		let contributing = builder.posts();

		let chain = match builder.build() {
			Ok(chain) => chain,
			Err(ChainError::EmptyCorpus) => {
				info!("No eligible posts for '{}', no chain built", author);
				return Ok(None);
			}
			Err(e) => return Err(e),
		};

		let record = StoredChain { posts: contributing, chain };
		self.store.save_record(author, &record)?;
		info!("Built chain for '{}' from {} posts ({} nodes)", author, record.posts, record.chain.len());
		Ok(Some(record))
	}

	/// Stored chain of `author` without ever building one.
	pub fn load(&self, author: &str) -> Result<Option<Chain>> {
		self.store.load(author)
	}

	/// Authors with a stored chain.
	pub fn analyzed_authors(&self) -> Result<Vec<String>> {
		self.store.authors()
	}

	/// Generates `count` synthetic posts from `chain`.
	pub fn generate<R: Rng>(&self, chain: &Chain, count: usize, max_length: usize, rng: &mut R) -> Vec<String> {
		model::generate_many(chain, count, max_length, rng)
	}

	/// Probability of `fragment` under `chain` and its likely next word.
	pub fn score(&self, chain: &Chain, fragment: &str, anchor: Anchor) -> Result<Score> {
		model::score(chain, fragment, anchor)
	}
}

/// Posts that yield at least one token, i.e. the `START` count of the
/// chain they build.
fn contributing_posts(posts: &[String]) -> u64 {
	posts.iter().filter(|post| !tokenize_post(post).is_empty()).count() as u64
}
