use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sentinel token every walk starts from.
pub const START: &str = "START";

/// Sentinel token every walk ends on.
///
/// Both sentinels are upper case while tokenized words are always lower
/// case, so text can never produce them.
pub const END: &str = "END";

/// Tolerance used when checking that outgoing probabilities sum to one.
const SUM_TOLERANCE: f64 = 1e-9;

/// A weighted link from a token to one of its observed successors.
///
/// `probability` is `count` divided by the number of times the source
/// token was traversed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Edge {
	count: u64,
	probability: f64,
}

impl Edge {
	pub(crate) fn new(count: u64, probability: f64) -> Self {
		Self { count, probability }
	}

	/// Number of times this transition was observed.
	pub fn count(&self) -> u64 {
		self.count
	}

	/// Probability of taking this transition from its source token.
	pub fn probability(&self) -> f64 {
		self.probability
	}
}

/// One node of the chain: a token, how often it was a source, and where it leads.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ChainNode {
	/// Times this token was traversed as a source across the corpus.
	count: u64,
	/// Outgoing transitions indexed by destination token.
	edges: HashMap<String, Edge>,
}

impl ChainNode {
	pub(crate) fn new(count: u64, edges: HashMap<String, Edge>) -> Self {
		Self { count, edges }
	}

	pub fn count(&self) -> u64 {
		self.count
	}

	pub fn edges(&self) -> &HashMap<String, Edge> {
		&self.edges
	}

	/// Returns the edge toward `destination`, if it was ever observed.
	pub fn edge(&self, destination: &str) -> Option<&Edge> {
		self.edges.get(destination)
	}

	/// Outgoing edges ordered by descending probability.
	///
	/// Ties are broken by the destination token's natural ordering so the
	/// order (and therefore seeded sampling) is reproducible.
	pub fn successors(&self) -> Vec<(&str, &Edge)> {
		let mut successors: Vec<(&str, &Edge)> = self
			.edges
			.iter()
			.map(|(token, edge)| (token.as_str(), edge))
			.collect();

		successors.sort_by(|a, b| {
			b.1.probability
				.total_cmp(&a.1.probability)
				.then_with(|| a.0.cmp(b.0))
		});
		successors
	}
}

/// Frequency of a single token across the whole chain.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct WordFrequency {
	pub word: String,
	pub count: u64,
	pub probability: f64,
}

/// First-order Markov chain for one author.
///
/// Maps every token (including the `START` and `END` sentinels) to its
/// node. A `Chain` is only ever produced fully normalized, either by
/// [`ChainBuilder`](super::builder::ChainBuilder) or by decoding a stored
/// blob that passed [`Chain::validate`].
///
/// Serializes as a plain mapping `token -> {count, edges}`, sentinels
/// included, with no extra wrapping.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Chain {
	nodes: HashMap<String, ChainNode>,
}

impl Chain {
	pub(crate) fn from_nodes(nodes: HashMap<String, ChainNode>) -> Self {
		Self { nodes }
	}

	pub fn get(&self, token: &str) -> Option<&ChainNode> {
		self.nodes.get(token)
	}

	pub fn contains(&self, token: &str) -> bool {
		self.nodes.contains_key(token)
	}

	/// Number of nodes, sentinels included.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Iterates over `(token, node)` pairs in no particular order.
	pub fn nodes(&self) -> impl Iterator<Item = (&str, &ChainNode)> {
		self.nodes.iter().map(|(token, node)| (token.as_str(), node))
	}

	/// Sum of every node count, `START` included.
	///
	/// This is the denominator of the unigram probability.
	pub fn total_count(&self) -> u64 {
		self.nodes.values().map(ChainNode::count).sum()
	}

	/// Frequency-based probability of a token: its count over [`Chain::total_count`].
	///
	/// Returns 0 for unknown tokens or an empty chain.
	pub fn unigram_probability(&self, token: &str) -> f64 {
		let total = self.total_count();
		match self.nodes.get(token) {
			Some(node) if total > 0 => node.count as f64 / total as f64,
			_ => 0.0,
		}
	}

	/// Outgoing edges of `token`, most probable first. Empty for unknown tokens.
	pub fn successors(&self, token: &str) -> Vec<(&str, &Edge)> {
		self.nodes
			.get(token)
			.map(ChainNode::successors)
			.unwrap_or_default()
	}

	/// Every token with its unigram probability, most frequent first.
	pub fn word_frequencies(&self) -> Vec<WordFrequency> {
		let total = self.total_count();
		let mut frequencies: Vec<WordFrequency> = self
			.nodes
			.iter()
			.map(|(word, node)| WordFrequency {
				word: word.clone(),
				count: node.count,
				probability: if total > 0 { node.count as f64 / total as f64 } else { 0.0 },
			})
			.collect();

		frequencies.sort_by(|a, b| {
			b.probability
				.total_cmp(&a.probability)
				.then_with(|| a.word.cmp(&b.word))
		});
		frequencies
	}

	/// Checks the structural invariants of a built chain.
	///
	/// - `START` and `END` are present
	/// - every edge points to an existing node
	/// - a node with edges has a count equal to the sum of its edge counts
	/// - each edge probability equals `edge.count / node.count`
	/// - outgoing probabilities sum to 1 within `1e-9`
	///
	/// # Errors
	/// Returns a description of the first violation found.
	pub fn validate(&self) -> Result<(), String> {
		for sentinel in [START, END] {
			if !self.nodes.contains_key(sentinel) {
				return Err(format!("Missing sentinel node {sentinel}"));
			}
		}

		for (token, node) in &self.nodes {
			if node.edges.is_empty() {
				continue;
			}

			let edge_total: u64 = node.edges.values().map(Edge::count).sum();
			if edge_total != node.count {
				return Err(format!(
					"Node '{token}' has count {} but its edges sum to {edge_total}",
					node.count
				));
			}

			let mut sum = 0.0;
			for (destination, edge) in &node.edges {
				if !self.nodes.contains_key(destination) {
					return Err(format!("Edge '{token}' -> '{destination}' points to a missing node"));
				}
				let expected = edge.count as f64 / node.count as f64;
				if (edge.probability - expected).abs() > f64::EPSILON {
					return Err(format!(
						"Edge '{token}' -> '{destination}' has probability {} instead of {expected}",
						edge.probability
					));
				}
				sum += edge.probability;
			}

			if (sum - 1.0).abs() > SUM_TOLERANCE {
				return Err(format!("Edges of '{token}' sum to {sum}"));
			}
		}

		Ok(())
	}
}
