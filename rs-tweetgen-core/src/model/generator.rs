use rand::Rng;

use super::chain::{Chain, END, START};
use crate::text::detokenize;

/// Picks the successor of `token` by weighted random sampling.
///
/// Draws `r` uniformly in `[0, 1)`, walks the successors in descending
/// probability order (see [`ChainNode::successors`](super::chain::ChainNode::successors))
/// and returns the first one whose cumulative probability reaches `r`.
///
/// Returns `END` when the token is unknown or has no outgoing edge.
pub fn sample_next<'a, R: Rng>(chain: &'a Chain, token: &str, rng: &mut R) -> &'a str {
	let successors = chain.successors(token);
	if successors.is_empty() {
		return END;
	}

	let r: f64 = rng.random();
	let mut cumulative = 0.0;
	let mut fallback = END;
	for (next, edge) in successors {
		cumulative += edge.probability();
		if cumulative >= r {
			return next;
		}
		fallback = next;
	}

	// Rounding left the cumulative sum just under r: take the last candidate.
	fallback
}

/// Weighted random walk over a chain, from `START` until `END`.
///
/// Yields the visited word tokens, sentinels excluded. The walk holds a
/// shared borrow of the chain, so any number of walks can run against the
/// same chain as long as each has its own random source.
pub struct Walk<'a, 'r, R: Rng> {
	chain: &'a Chain,
	current: &'a str,
	rng: &'r mut R,
}

impl<'a, 'r, R: Rng> Walk<'a, 'r, R> {
	pub fn new(chain: &'a Chain, rng: &'r mut R) -> Self {
		let current = sample_next(chain, START, rng);
		Self { chain, current, rng }
	}
}

impl<'a, R: Rng> Iterator for Walk<'a, '_, R> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		if self.current == END {
			return None;
		}
		let word = self.current;
		self.current = sample_next(self.chain, word, self.rng);
		Some(word)
	}
}

/// Generates the tokens of one synthetic post.
///
/// # Parameters
/// - `max_length`: maximum number of tokens; `0` lets the walk run until `END`.
pub fn generate_tokens<'a, R: Rng>(chain: &'a Chain, max_length: usize, rng: &mut R) -> Vec<&'a str> {
	let walk = Walk::new(chain, rng);
	if max_length == 0 {
		walk.collect()
	} else {
		walk.take(max_length).collect()
	}
}

/// Generates one synthetic post as readable text.
///
/// # Parameters
/// - `max_length`: maximum number of tokens; `0` lets the walk run until `END`.
pub fn generate<R: Rng>(chain: &Chain, max_length: usize, rng: &mut R) -> String {
	detokenize(&generate_tokens(chain, max_length, rng))
}

/// Generates `count` independent posts.
pub fn generate_many<R: Rng>(chain: &Chain, count: usize, max_length: usize, rng: &mut R) -> Vec<String> {
	(0..count).map(|_| generate(chain, max_length, rng)).collect()
}

#[cfg(test)]
mod tests {
	use rand::rngs::StdRng;
	use rand::{RngCore, SeedableRng};

	use super::*;
	use crate::model::builder::build;
	use crate::text::tokenize_post;

	fn love_chain() -> Chain {
		let corpus: Vec<Vec<String>> = ["I love cats", "I love dogs", "I love cats"]
			.iter()
			.map(|post| tokenize_post(post))
			.collect();
		build(corpus).unwrap()
	}

	/// Random source returning the same word forever.
	struct Fixed(u64);

	impl RngCore for Fixed {
		fn next_u32(&mut self) -> u32 {
			(self.0 >> 32) as u32
		}

		fn next_u64(&mut self) -> u64 {
			self.0
		}

		fn fill_bytes(&mut self, dst: &mut [u8]) {
			for (i, byte) in dst.iter_mut().enumerate() {
				*byte = self.0.to_le_bytes()[i % 8];
			}
		}
	}

	/// A random source whose `f64` draws are (almost exactly) `value`.
	fn fixed(value: f64) -> Fixed {
		// Uniform f64 sampling keeps the top 53 bits of a u64.
		Fixed(((value * (1u64 << 53) as f64) as u64) << 11)
	}

	#[test]
	fn low_draw_takes_most_probable_edge() {
		let chain = love_chain();
		assert_eq!(sample_next(&chain, "love", &mut fixed(0.0)), "cats");
		assert_eq!(sample_next(&chain, "love", &mut fixed(0.5)), "cats");
	}

	#[test]
	fn high_draw_takes_less_probable_edge() {
		let chain = love_chain();
		assert_eq!(sample_next(&chain, "love", &mut fixed(0.9)), "dogs");
	}

	#[test]
	fn unknown_token_leads_to_end() {
		let chain = love_chain();
		assert_eq!(sample_next(&chain, "zebra", &mut fixed(0.3)), END);
		assert_eq!(sample_next(&chain, END, &mut fixed(0.3)), END);
	}

	#[test]
	fn deterministic_walk() {
		let chain = love_chain();
		assert_eq!(generate(&chain, 0, &mut fixed(0.1)), "i love cats");
		assert_eq!(generate(&chain, 0, &mut fixed(0.99)), "i love dogs");
	}

	#[test]
	fn max_length_bounds_output() {
		let chain = love_chain();
		assert_eq!(generate_tokens(&chain, 2, &mut fixed(0.1)), ["i", "love"]);
		assert_eq!(generate_tokens(&chain, 1, &mut fixed(0.1)), ["i"]);
	}

	#[test]
	fn seeded_generation_is_reproducible() {
		let chain = love_chain();
		let first = generate_many(&chain, 20, 0, &mut StdRng::seed_from_u64(7));
		let second = generate_many(&chain, 20, 0, &mut StdRng::seed_from_u64(7));
		assert_eq!(first, second);
		assert!(first.iter().all(|post| post == "i love cats" || post == "i love dogs"));
	}

	#[test]
	fn generation_follows_edge_frequencies() {
		let chain = love_chain();
		let mut rng = StdRng::seed_from_u64(42);
		let posts = generate_many(&chain, 3000, 0, &mut rng);
		let cats = posts.iter().filter(|post| post.ends_with("cats")).count() as f64;
		let ratio = cats / posts.len() as f64;
		assert!((ratio - 2.0 / 3.0).abs() < 0.05, "ratio was {ratio}");
	}

	#[test]
	fn looping_chain_terminates() {
		let corpus = [vec!["go"; 50]];
		let chain = build(corpus).unwrap();
		let mut rng = StdRng::seed_from_u64(1);
		for _ in 0..200 {
			let tokens = generate_tokens(&chain, 0, &mut rng);
			assert!(!tokens.is_empty());
			assert!(tokens.iter().all(|token| *token == "go"));
		}
		assert!(generate_tokens(&chain, 5, &mut rng).len() <= 5);
	}
}
