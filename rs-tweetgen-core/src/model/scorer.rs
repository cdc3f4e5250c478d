use serde::{Deserialize, Serialize};

use super::chain::{Chain, END, START};
use crate::error::{ChainError, Result};
use crate::text::tokenize;

/// How the first word of a fragment is scored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
	/// The fragment may appear anywhere in a post: the first word is
	/// scored by its unigram frequency (`count / total_count`).
	#[default]
	Anywhere,
	/// The fragment opens a post: the first word is scored by the
	/// `START -> word` transition.
	Opening,
}

/// One accepted word of a probability report.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Step {
	pub word: String,
	/// Probability of this word given the previous one (or the anchor).
	pub probability: f64,
	/// Product of every step probability so far.
	pub cumulative: f64,
}

/// Why scoring stopped before the end of the fragment.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Break {
	/// The word never occurs in the chain.
	UnknownWord { word: String },
	/// The author never wrote `to` right after `from`.
	UnseenTransition { from: String, to: String },
}

/// Word-by-word breakdown of a fragment's probability.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Report {
	pub steps: Vec<Step>,
	pub stopped: Option<Break>,
	/// Most likely continuation of the whole fragment, when it was fully scored.
	pub next_word: Option<String>,
}

impl Report {
	/// Joint probability of the fragment: 0 if scoring stopped early.
	pub fn probability(&self) -> f64 {
		if self.stopped.is_some() {
			return 0.0;
		}
		self.steps.last().map_or(0.0, |step| step.cumulative)
	}
}

/// Probability and likely continuation of a fragment.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Score {
	pub probability: f64,
	pub next_word: String,
}

/// Tokenizes a query fragment, rejecting empty input up front.
fn fragment_tokens(fragment: &str) -> Result<Vec<String>> {
	if fragment.trim().is_empty() {
		return Err(ChainError::MalformedFragment);
	}
	let tokens = tokenize(fragment);
	if tokens.is_empty() {
		return Err(ChainError::MalformedFragment);
	}
	Ok(tokens)
}

/// Scores a fragment word by word.
///
/// The first word is scored according to `anchor`; every following word
/// by the edge probability from its predecessor. Scoring stops at the
/// first unknown word or unseen transition.
///
/// # Errors
/// Returns [`ChainError::MalformedFragment`] for empty or whitespace-only input.
pub fn report(chain: &Chain, fragment: &str, anchor: Anchor) -> Result<Report> {
	let words = fragment_tokens(fragment)?;
	let mut report = Report { steps: Vec::with_capacity(words.len()), stopped: None, next_word: None };

	let first = &words[0];
	if !chain.contains(first) {
		report.stopped = Some(Break::UnknownWord { word: first.clone() });
		return Ok(report);
	}

	let opening = match anchor {
		Anchor::Anywhere => Some(chain.unigram_probability(first)),
		Anchor::Opening => chain.get(START).and_then(|node| node.edge(first)).map(|edge| edge.probability()),
	};
	let Some(mut cumulative) = opening else {
		report.stopped = Some(Break::UnseenTransition { from: START.to_owned(), to: first.clone() });
		return Ok(report);
	};
	report.steps.push(Step { word: first.clone(), probability: cumulative, cumulative });

	for pair in words.windows(2) {
		let (previous, current) = (&pair[0], &pair[1]);
		let edge = chain.get(previous).and_then(|node| node.edge(current));
		let Some(edge) = edge else {
			report.stopped = Some(if chain.contains(current) {
				Break::UnseenTransition { from: previous.clone(), to: current.clone() }
			} else {
				Break::UnknownWord { word: current.clone() }
			});
			return Ok(report);
		};

		cumulative *= edge.probability();
		report.steps.push(Step { word: current.clone(), probability: edge.probability(), cumulative });
	}

	if let Some(last) = words.last() {
		report.next_word = Some(next_word_prediction(chain, last).to_owned());
	}
	Ok(report)
}

/// Joint probability that the author's chain produces `fragment`.
///
/// Unigram probability of the first word times the transition
/// probability of every following pair. Exactly 0 as soon as a word is
/// unknown or a pair was never observed; in `(0, 1]` otherwise.
///
/// # Errors
/// Returns [`ChainError::MalformedFragment`] for empty or whitespace-only input.
pub fn probability_of(chain: &Chain, fragment: &str) -> Result<f64> {
	probability_with(chain, fragment, Anchor::Anywhere)
}

/// Same as [`probability_of`] with an explicit first-word [`Anchor`].
pub fn probability_with(chain: &Chain, fragment: &str, anchor: Anchor) -> Result<f64> {
	Ok(report(chain, fragment, anchor)?.probability())
}

/// Most probable successor of `token`, or `END` if it is unknown or terminal.
pub fn next_word_prediction<'a>(chain: &'a Chain, token: &str) -> &'a str {
	chain
		.successors(token)
		.first()
		.map_or(END, |(next, _)| *next)
}

/// Most probable successor of the last word of `text`.
///
/// `text` goes through the same tokenizer as posts, so `"We're"` is
/// looked up as `'re` and `"win!"` as `!`.
///
/// # Errors
/// Returns [`ChainError::MalformedFragment`] when `text` holds no token.
pub fn next_word_after<'a>(chain: &'a Chain, text: &str) -> Result<&'a str> {
	let words = fragment_tokens(text)?;
	let last = words.last().map_or(END, String::as_str);
	Ok(next_word_prediction(chain, last))
}

/// Scores a fragment and predicts the word following its last token.
///
/// # Errors
/// Returns [`ChainError::MalformedFragment`] for empty or whitespace-only input.
pub fn score(chain: &Chain, fragment: &str, anchor: Anchor) -> Result<Score> {
	let report = report(chain, fragment, anchor)?;
	let probability = report.probability();

	// A fragment cut short still gets a continuation for its last word.
	let next_word = match report.next_word {
		Some(next_word) => next_word,
		None => next_word_after(chain, fragment)?.to_owned(),
	};

	Ok(Score { probability, next_word })
}

#[cfg(test)]
mod tests {
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

	#[test]
	fn unigram_anchored_probability() {
		let chain = love_chain();
		// START 3 + i 3 + love 3 + cats 2 + dogs 1 + END 0 = 12
		let expected = (3.0 / 12.0) * 1.0 * (2.0 / 3.0);
		assert_eq!(probability_of(&chain, "I love cats").unwrap(), expected);
	}

	#[test]
	fn opening_anchored_probability() {
		let chain = love_chain();
		assert_eq!(probability_with(&chain, "i love cats", Anchor::Opening).unwrap(), 2.0 / 3.0);
		assert_eq!(probability_with(&chain, "love cats", Anchor::Opening).unwrap(), 0.0);
	}

	#[test]
	fn unknown_words_and_pairs_score_zero() {
		let chain = love_chain();
		assert_eq!(probability_of(&chain, "zebras love cats").unwrap(), 0.0);
		assert_eq!(probability_of(&chain, "i love zebras").unwrap(), 0.0);
		assert_eq!(probability_of(&chain, "cats love i").unwrap(), 0.0);
	}

	#[test]
	fn known_fragments_score_in_unit_interval() {
		let chain = love_chain();
		for fragment in ["i", "love", "love dogs", "i love", "i love cats"] {
			let p = probability_of(&chain, fragment).unwrap();
			assert!(p > 0.0 && p <= 1.0, "{fragment}: {p}");
		}
	}

	#[test]
	fn empty_fragment_is_rejected() {
		let chain = love_chain();
		assert!(matches!(probability_of(&chain, ""), Err(ChainError::MalformedFragment)));
		assert!(matches!(probability_of(&chain, "  \n\t"), Err(ChainError::MalformedFragment)));
	}

	#[test]
	fn predicts_most_likely_next_word() {
		let chain = love_chain();
		assert_eq!(next_word_prediction(&chain, "love"), "cats");
		assert_eq!(next_word_prediction(&chain, "i"), "love");
		assert_eq!(next_word_prediction(&chain, "cats"), END);
		assert_eq!(next_word_prediction(&chain, "zebra"), END);
	}

	#[test]
	fn prediction_after_text_follows_tokenization() {
		let corpus: Vec<Vec<String>> = ["We're going to win", "We're here"]
			.iter()
			.map(|post| tokenize_post(post))
			.collect();
		let chain = build(corpus).unwrap();

		assert_eq!(next_word_after(&chain, "We're").unwrap(), "going");
		assert_eq!(next_word_after(&chain, "we\u{2019}re").unwrap(), "going");
		assert_eq!(next_word_after(&chain, "to WIN").unwrap(), END);
		assert_eq!(next_word_after(&chain, "We're").unwrap(), score(&chain, "We're", Anchor::Anywhere).unwrap().next_word);
		assert!(matches!(next_word_after(&chain, " "), Err(ChainError::MalformedFragment)));
	}

	#[test]
	fn report_explains_where_scoring_stopped() {
		let chain = love_chain();

		let full = report(&chain, "i love", Anchor::Anywhere).unwrap();
		assert_eq!(full.steps.len(), 2);
		assert_eq!(full.stopped, None);
		assert_eq!(full.next_word.as_deref(), Some("cats"));

		let cut = report(&chain, "i love love", Anchor::Anywhere).unwrap();
		assert_eq!(cut.steps.len(), 2);
		assert_eq!(
			cut.stopped,
			Some(Break::UnseenTransition { from: "love".to_owned(), to: "love".to_owned() })
		);
		assert_eq!(cut.probability(), 0.0);

		let unknown = report(&chain, "i hate", Anchor::Anywhere).unwrap();
		assert_eq!(unknown.stopped, Some(Break::UnknownWord { word: "hate".to_owned() }));
	}

	#[test]
	fn score_combines_probability_and_prediction() {
		let chain = love_chain();
		let score = score(&chain, "I love", Anchor::Anywhere).unwrap();
		assert_eq!(score.probability, 3.0 / 12.0);
		assert_eq!(score.next_word, "cats");

		let broken = super::score(&chain, "dogs love", Anchor::Anywhere).unwrap();
		assert_eq!(broken.probability, 0.0);
		assert_eq!(broken.next_word, "cats");
	}
}
