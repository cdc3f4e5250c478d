use std::sync::LazyLock;

use regex::Regex;

/// `http://` and `https://` links, up to the next whitespace.
static URLS: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid URL pattern"));

/// Scheme-less short links produced by the platform (`t.co/...`, `pic.twitter.com/...`).
static SHORT_LINKS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\b(?:pic\.twitter\.com|t\.co)/\S+").expect("valid short link pattern")
});

/// Hashtags and @-mentions.
static TAGS: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[#@]\w+").expect("valid tag pattern"));

/// HTML entities commonly left in scraped post text, decoded in order.
/// `&amp;` must stay last so `&amp;lt;` decodes to the literal `&lt;`.
const ENTITIES: [(&str, &str); 6] = [
	("&lt;", "<"),
	("&gt;", ">"),
	("&quot;", "\""),
	("&#39;", "'"),
	("&apos;", "'"),
	("&amp;", "&"),
];

/// Removes everything from a raw post that should not end up in the chain.
///
/// - Decodes the usual HTML entities
/// - Drops `U+FFFD` replacement characters
/// - Strips `http(s)://` URLs and platform short links
/// - Strips hashtags and @-mentions
///
/// Total over any input: an empty or fully stripped post yields an empty
/// (or whitespace-only) string, never an error.
pub fn sanitize(text: &str) -> String {
	let mut decoded = text.to_owned();
	for (entity, replacement) in ENTITIES {
		if decoded.contains(entity) {
			decoded = decoded.replace(entity, replacement);
		}
	}

	// Left behind by lossy decoding of malformed input.
	decoded.retain(|c| c != char::REPLACEMENT_CHARACTER);

	let without_urls = URLS.replace_all(&decoded, "");
	let without_links = SHORT_LINKS.replace_all(&without_urls, "");
	TAGS.replace_all(&without_links, "").into_owned()
}
