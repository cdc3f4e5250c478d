use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::debug;

use super::validate_author;
use crate::error::{ChainError, Result};
use crate::io::{key_path, read_lines};

/// Extension of the per-author post files read by [`FsCorpus`].
pub const CORPUS_EXTENSION: &str = "dat";

/// Prefix marking a repost of someone else's content in a corpus file.
pub const REPOST_PREFIX: &str = "RT @";

/// A single raw post as stored by the collector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
	pub text: String,
	/// Reposts of other authors' content never feed the chain.
	pub is_repost: bool,
}

impl Post {
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into(), is_repost: false }
	}

	pub fn repost(text: impl Into<String>) -> Self {
		Self { text: text.into(), is_repost: true }
	}
}

/// Source of an author's raw posts.
///
/// Order does not matter to the builder. An unknown author has an empty
/// corpus; only a provider failure is an error.
pub trait CorpusProvider {
	fn posts(&self, author: &str) -> Result<Vec<Post>>;
}

/// Reads `<dir>/<author>.dat`, one post per line.
///
/// Blank lines are skipped and lines starting with `RT @` are reposts.
#[derive(Clone, Debug)]
pub struct FsCorpus {
	dir: PathBuf,
}

impl FsCorpus {
	pub fn new<P: AsRef<Path>>(dir: P) -> Self {
		Self { dir: dir.as_ref().to_path_buf() }
	}
}

impl CorpusProvider for FsCorpus {
	fn posts(&self, author: &str) -> Result<Vec<Post>> {
		let author = validate_author(author)?;
		let path = key_path(&self.dir, author, CORPUS_EXTENSION);

		let lines = match read_lines(&path) {
			Ok(lines) => lines,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				debug!("No corpus file at {}", path.display());
				return Ok(Vec::new());
			}
			Err(source) => return Err(ChainError::CorpusUnavailable { author: author.to_owned(), source }),
		};

		let posts: Vec<Post> = lines
			.into_iter()
			.filter(|line| !line.trim().is_empty())
			.map(|line| {
				if line.starts_with(REPOST_PREFIX) {
					Post::repost(line)
				} else {
					Post::new(line)
				}
			})
			.collect();

		debug!("Read {} posts for '{}' from {}", posts.len(), author, path.display());
		Ok(posts)
	}
}

/// Posts held in memory, keyed by author.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
	posts: RwLock<HashMap<String, Vec<Post>>>,
}

impl MemoryCorpus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends posts to an author's corpus.
	///
	/// # Errors
	/// Returns [`ChainError::CorpusUnavailable`] if the lock is poisoned.
	pub fn add<I: IntoIterator<Item = Post>>(&self, author: &str, posts: I) -> Result<()> {
		let mut all = self.posts.write().map_err(|_| poisoned(author))?;
		all.entry(author.to_owned()).or_default().extend(posts);
		Ok(())
	}
}

fn poisoned(author: &str) -> ChainError {
	ChainError::CorpusUnavailable {
		author: author.to_owned(),
		source: io::Error::other("Corpus lock poisoned"),
	}
}

impl CorpusProvider for MemoryCorpus {
	fn posts(&self, author: &str) -> Result<Vec<Post>> {
		let all = self.posts.read().map_err(|_| poisoned(author))?;
		Ok(all.get(author).cloned().unwrap_or_default())
	}
}
