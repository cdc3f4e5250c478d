use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::sanitize;

/// Word-level token pattern, tried left to right:
/// ellipses, numbers with separators, words with inner hyphens or
/// apostrophes, then any other single non-space symbol.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\.{2,}|\d+(?:[.,:]\d+)+|\w+(?:[-']\w+)*|\S").expect("valid token pattern")
});

/// Clitics split off the word they follow (`it's` -> `it`, `'s`).
const CLITICS: [&str; 6] = ["'s", "'m", "'d", "'ll", "'re", "'ve"];

/// Negation clitic, split Treebank-style (`don't` -> `do`, `n't`).
const NEGATION: &str = "n't";

/// Tokens glued to the word on their left when detokenizing.
const CLOSING: [&str; 10] = [".", ",", "!", "?", ";", ":", "%", ")", "]", "}"];

/// Tokens glued to the word on their right when detokenizing.
const OPENING: [&str; 5] = ["(", "[", "{", "$", "#"];

/// Quote marks that alternate between opening and closing when detokenizing.
const QUOTES: [&str; 2] = ["\"", "'"];

/// Typographic characters folded into their ASCII form before tokenizing.
const TYPOGRAPHIC: [(char, &str); 5] = [
	('\u{2018}', "'"),
	('\u{2019}', "'"),
	('\u{201c}', "\""),
	('\u{201d}', "\""),
	('\u{2026}', "..."),
];

fn fold_typographic(text: &str) -> String {
	let mut folded = String::with_capacity(text.len());
	for c in text.chars() {
		match TYPOGRAPHIC.iter().find(|(from, _)| *from == c) {
			Some((_, to)) => folded.push_str(to),
			None => folded.push(c),
		}
	}
	folded
}

/// Splits already-clean text into lowercase word tokens.
///
/// Punctuation becomes separate tokens and contractions are split so
/// that [`detokenize`] can stitch them back together. Used as-is for
/// query fragments, which are not sanitized.
pub fn tokenize(text: &str) -> Vec<String> {
	let normalized = fold_typographic(text).to_lowercase();

	let mut tokens = Vec::new();
	for m in TOKEN.find_iter(&normalized) {
		split_contraction(m.as_str(), &mut tokens);
	}
	tokens
}

/// Sanitizes then tokenizes a raw post.
///
/// Hashtags, mentions and links never reach the token stream.
pub fn tokenize_post(raw: &str) -> Vec<String> {
	tokenize(&sanitize(raw))
}

/// Pushes `word` into `tokens`, splitting a trailing contraction if any.
fn split_contraction(word: &str, tokens: &mut Vec<String>) {
	if word.len() > NEGATION.len() && word.ends_with(NEGATION) {
		let stem = &word[..word.len() - NEGATION.len()];
		if stem.chars().all(char::is_alphanumeric) {
			tokens.push(stem.to_owned());
			tokens.push(NEGATION.to_owned());
			return;
		}
	}

	for clitic in CLITICS {
		if word.len() > clitic.len() && word.ends_with(clitic) {
			let stem = &word[..word.len() - clitic.len()];
			tokens.push(stem.to_owned());
			tokens.push(clitic.to_owned());
			return;
		}
	}

	tokens.push(word.to_owned());
}

/// Returns true if the token must be glued to the previous one.
fn attaches_left(token: &str) -> bool {
	CLOSING.contains(&token)
		|| CLITICS.contains(&token)
		|| token == NEGATION
		|| (token.len() > 1 && token.chars().all(|c| c == '.'))
}

/// Joins tokens back into readable text.
///
/// Inverse of [`tokenize`]: no space before closing punctuation or
/// clitics, none after opening brackets, and each kind of quote mark
/// alternates between opening and closing.
pub fn detokenize<S: AsRef<str>>(tokens: &[S]) -> String {
	let mut text = String::new();
	let mut glue_next = true;
	let mut quote_open = [false; QUOTES.len()];

	for token in tokens {
		let token = token.as_ref();

		if let Some(kind) = QUOTES.iter().position(|quote| *quote == token) {
			if quote_open[kind] {
				text.push_str(token);
				glue_next = false;
			} else {
				if !glue_next {
					text.push(' ');
				}
				text.push_str(token);
				glue_next = true;
			}
			quote_open[kind] = !quote_open[kind];
			continue;
		}

		if attaches_left(token) {
			text.push_str(token);
			glue_next = false;
			continue;
		}

		if !glue_next {
			text.push(' ');
		}
		text.push_str(token);
		glue_next = OPENING.contains(&token);
	}

	text
}
