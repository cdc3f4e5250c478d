use std::collections::HashMap;

use log::debug;

use super::chain::{Chain, ChainNode, Edge, END, START};
use crate::error::{ChainError, Result};
use crate::text::tokenize_post;

/// Raw observation counts for one source token, before normalization.
///
/// Conceptually a node of the chain whose outgoing edges only carry the
/// number of times they were observed.
///
/// ## Invariants
/// - Each transition occurrence count is strictly positive
/// - `count` equals the sum of all transition counts
#[derive(Clone, Debug, Default)]
struct Tally {
	count: u64,
	transitions: HashMap<String, u64>,
}

impl Tally {
	/// Records one traversal of this token toward `next`.
	fn add_transition(&mut self, next: &str) {
		self.count += 1;
		match self.transitions.get_mut(next) {
			Some(occurrence) => *occurrence += 1,
			None => {
				self.transitions.insert(next.to_owned(), 1);
			}
		}
	}

	/// Converts raw counts into a node with normalized edge probabilities.
	fn normalize(self) -> ChainNode {
		let total: u64 = self.transitions.values().sum();
		let edges = self
			.transitions
			.into_iter()
			.map(|(next, occurrence)| {
				let edge = Edge::new(occurrence, occurrence as f64 / total as f64);
				(next, edge)
			})
			.collect();
		ChainNode::new(self.count, edges)
	}
}

/// Accumulates posts and produces a normalized [`Chain`].
///
/// Counting and normalization are two separate phases: probabilities do
/// not exist until [`ChainBuilder::build`] runs, which is why the builder
/// and the chain are distinct types.
///
/// # Responsibilities
/// - Link the first token of each non-empty post to `START`
/// - Link each token to its successor, or to `END` for the last one
/// - Normalize every node's outgoing counts into probabilities
#[derive(Clone, Debug)]
pub struct ChainBuilder {
	tallies: HashMap<String, Tally>,
}

impl Default for ChainBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ChainBuilder {
	/// Creates a builder holding only the `START` and `END` sentinels.
	pub fn new() -> Self {
		let mut tallies = HashMap::new();
		tallies.insert(START.to_owned(), Tally::default());
		tallies.insert(END.to_owned(), Tally::default());
		Self { tallies }
	}

	/// Number of posts that contributed at least one token so far.
	pub fn posts(&self) -> u64 {
		self.tallies.get(START).map_or(0, |tally| tally.count)
	}

	/// Adds one post's token sequence to the counts.
	///
	/// An empty sequence is accepted and contributes nothing.
	/// Tokens are expected to come from the tokenizer; passing the
	/// sentinels themselves as words would corrupt the chain.
	pub fn add_post<S: AsRef<str>>(&mut self, tokens: &[S]) {
		let Some(first) = tokens.first() else {
			return;
		};

		self.tally(START).add_transition(first.as_ref());

		for (index, token) in tokens.iter().enumerate() {
			let next = tokens.get(index + 1).map_or(END, |next| next.as_ref());
			self.tally(token.as_ref()).add_transition(next);
		}
	}

	/// Sanitizes, tokenizes and adds a raw post.
	pub fn add_text(&mut self, raw: &str) {
		let tokens = tokenize_post(raw);
		self.add_post(&tokens);
	}

	fn tally(&mut self, token: &str) -> &mut Tally {
		self.tallies.entry(token.to_owned()).or_default()
	}

	/// Runs the normalization pass and returns the finished chain.
	///
	/// # Errors
	/// Returns [`ChainError::EmptyCorpus`] if no post contributed a token.
	pub fn build(self) -> Result<Chain> {
		let posts = self.posts();
		if posts == 0 {
			return Err(ChainError::EmptyCorpus);
		}

		let nodes: HashMap<String, ChainNode> = self
			.tallies
			.into_iter()
			.map(|(token, tally)| (token, tally.normalize()))
			.collect();

		debug!("Built chain with {} nodes from {} posts", nodes.len(), posts);
		Ok(Chain::from_nodes(nodes))
	}
}

/// Builds a chain from a corpus of already tokenized posts.
///
/// # Errors
/// Returns [`ChainError::EmptyCorpus`] if the corpus has no tokens at all.
pub fn build<I, S>(corpus: I) -> Result<Chain>
where
	I: IntoIterator,
	I::Item: AsRef<[S]>,
	S: AsRef<str>,
{
	let mut builder = ChainBuilder::new();
	for post in corpus {
		builder.add_post(post.as_ref());
	}
	builder.build()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus() -> Vec<Vec<String>> {
		["I love cats", "I love dogs", "I love cats"]
			.iter()
			.map(|post| tokenize_post(post))
			.collect()
	}

	fn probability(chain: &Chain, from: &str, to: &str) -> f64 {
		chain.get(from).and_then(|node| node.edge(to)).map_or(f64::NAN, Edge::probability)
	}

	#[test]
	fn builds_expected_probabilities() {
		let chain = build(corpus()).unwrap();

		assert_eq!(probability(&chain, "love", "cats"), 2.0 / 3.0);
		assert_eq!(probability(&chain, "love", "dogs"), 1.0 / 3.0);
		assert_eq!(probability(&chain, START, "i"), 1.0);
		assert_eq!(probability(&chain, "cats", END), 1.0);
		assert_eq!(probability(&chain, "dogs", END), 1.0);
	}

	#[test]
	fn counts_sources_including_start() {
		let chain = build(corpus()).unwrap();

		assert_eq!(chain.get(START).unwrap().count(), 3);
		assert_eq!(chain.get("i").unwrap().count(), 3);
		assert_eq!(chain.get("love").unwrap().count(), 3);
		assert_eq!(chain.get("cats").unwrap().count(), 2);
		assert_eq!(chain.get("dogs").unwrap().count(), 1);
		assert_eq!(chain.get(END).unwrap().count(), 0);
		assert!(chain.get(END).unwrap().edges().is_empty());
		assert_eq!(chain.get("love").unwrap().edge("cats").unwrap().count(), 2);
	}

	#[test]
	fn every_node_sums_to_one() {
		let mut builder = ChainBuilder::new();
		for post in [
			"The quick brown fox jumps over the lazy dog.",
			"The dog sleeps, the fox runs!",
			"Quick, quick, QUICK!!!",
			"",
			"#only @tags",
		] {
			builder.add_text(post);
		}
		assert_eq!(builder.posts(), 3);

		let chain = builder.build().unwrap();
		assert_eq!(chain.validate(), Ok(()));
		for (_, node) in chain.nodes() {
			if node.edges().is_empty() {
				continue;
			}
			let sum: f64 = node.edges().values().map(Edge::probability).sum();
			assert!((sum - 1.0).abs() < 1e-9);
		}
	}

	#[test]
	fn repeated_token_counts_each_occurrence() {
		let chain = build([["la", "la", "la"]]).unwrap();
		let la = chain.get("la").unwrap();
		assert_eq!(la.count(), 3);
		assert_eq!(la.edge("la").unwrap().count(), 2);
		assert_eq!(la.edge(END).unwrap().count(), 1);
	}

	#[test]
	fn empty_corpus_is_signaled() {
		let empty: Vec<Vec<String>> = Vec::new();
		assert!(matches!(build(empty), Err(ChainError::EmptyCorpus)));

		let blank: Vec<Vec<String>> = vec![Vec::new(), Vec::new()];
		assert!(matches!(build(blank), Err(ChainError::EmptyCorpus)));
	}

	#[test]
	fn rebuilding_is_idempotent() {
		assert_eq!(build(corpus()).unwrap(), build(corpus()).unwrap());
	}
}
