//! End-to-end checks over on-disk corpus and chain files.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::thread;

use rand::SeedableRng;
use rand::rngs::StdRng;

use rs_tweetgen_core::model::{self, Anchor, Chain, END, START};
use rs_tweetgen_core::service::{ChainService, RebuildPolicy};
use rs_tweetgen_core::storage::{BlobStore, ChainStore, FsBlobStore, FsCorpus};
use rs_tweetgen_core::text::tokenize_post;
use rs_tweetgen_core::ChainError;

const POSTS: &str = "\
Make the economy great again! https://t.co/abc123
The economy is doing great, believe me.
RT @someone: The economy is terrible
Thank you #rally @crowd, it was great!
We're going to win. We're going to win so much.

The fake news won't tell you that.
";

fn setup() -> (tempfile::TempDir, ChainService<FsBlobStore, FsCorpus>) {
	let dir = tempfile::tempdir().unwrap();
	let corpus_dir = dir.path().join("data");
	fs::create_dir(&corpus_dir).unwrap();
	fs::write(corpus_dir.join("speaker.dat"), POSTS).unwrap();

	let service = ChainService::new(
		FsBlobStore::new(dir.path().join("chains")),
		FsCorpus::new(&corpus_dir),
		RebuildPolicy::Explicit,
	);
	(dir, service)
}

/// Counts how often each token is a source in the sanitized corpus.
fn source_counts(posts: &[&str]) -> HashMap<String, u64> {
	let mut counts = HashMap::new();
	for post in posts {
		let tokens = tokenize_post(post);
		if tokens.is_empty() {
			continue;
		}
		*counts.entry(START.to_owned()).or_insert(0) += 1;
		for token in tokens {
			*counts.entry(token).or_insert(0) += 1;
		}
	}
	counts
}

#[test]
fn build_persist_and_reload_from_disk() {
	let (dir, service) = setup();

	let built = service.get_or_build("speaker", false).unwrap().unwrap();
	assert!(dir.path().join("chains").join("speaker.bin").is_file());
	assert!(!built.contains("terrible"), "reposts are excluded");
	assert!(!built.contains("rally") && !built.contains("https"), "tags and links are stripped");

	let reopened = ChainStore::new(FsBlobStore::new(dir.path().join("chains")));
	assert_eq!(reopened.load("speaker").unwrap(), Some(built.clone()));
	assert_eq!(reopened.load_record("speaker").unwrap().unwrap().posts, 5);
	assert_eq!(reopened.authors().unwrap(), ["speaker"]);
}

#[test]
fn node_counts_match_source_occurrences() {
	let (_dir, service) = setup();
	let chain = service.get_or_build("speaker", false).unwrap().unwrap();

	let eligible: Vec<&str> = POSTS
		.lines()
		.filter(|line| !line.trim().is_empty() && !line.starts_with("RT @"))
		.collect();
	let expected = source_counts(&eligible);

	for (token, node) in chain.nodes() {
		let count = expected.get(token).copied().unwrap_or(0);
		assert_eq!(node.count(), count, "count of '{token}'");
	}
	assert_eq!(chain.get(END).unwrap().count(), 0);
	assert_eq!(chain.validate(), Ok(()));
}

#[test]
fn contractions_survive_generation() {
	let (_dir, service) = setup();
	let chain = service.get_or_build("speaker", false).unwrap().unwrap();

	assert!(chain.get("we").unwrap().edge("'re").is_some());
	assert!(chain.get("wo").unwrap().edge("n't").is_some());

	let mut rng = StdRng::seed_from_u64(11);
	for post in service.generate(&chain, 200, 0, &mut rng) {
		assert!(!post.contains(" 're") && !post.contains(" n't"), "{post}");
		assert!(!post.contains(" .") && !post.contains(" ,") && !post.contains(" !"), "{post}");
	}
}

#[test]
fn scoring_over_persisted_chain() {
	let (_dir, service) = setup();
	service.get_or_build("speaker", false).unwrap();
	let chain = service.load("speaker").unwrap().unwrap();

	let p = model::probability_of(&chain, "the economy").unwrap();
	let expected = chain.unigram_probability("the") * chain.get("the").unwrap().edge("economy").unwrap().probability();
	assert_eq!(p, expected);
	assert!(p > 0.0 && p <= 1.0);

	assert_eq!(model::probability_of(&chain, "economy the").unwrap(), 0.0);
	assert_eq!(model::probability_with(&chain, "the fake news", Anchor::Opening).unwrap(), {
		let start = chain.get(START).unwrap().edge("the").unwrap().probability();
		let fake = chain.get("the").unwrap().edge("fake").unwrap().probability();
		let news = chain.get("fake").unwrap().edge("news").unwrap().probability();
		start * fake * news
	});
	assert!(matches!(model::probability_of(&chain, " "), Err(ChainError::MalformedFragment)));
}

#[test]
fn readers_never_see_partial_writes() {
	let dir = tempfile::tempdir().unwrap();
	let store = Arc::new(ChainStore::new(FsBlobStore::new(dir.path())));

	let small = model::build([tokenize_post("short post")]).unwrap();
	let large: Chain = model::build(
		(0..200).map(|i| tokenize_post(&format!("post number {i} says word{i} and word{}", i + 1))),
	)
	.unwrap();
	store.save("author", &small).unwrap();

	let writer = {
		let store = Arc::clone(&store);
		let (small, large) = (small.clone(), large.clone());
		thread::spawn(move || {
			for i in 0..50 {
				let chain = if i % 2 == 0 { &large } else { &small };
				store.save("author", chain).unwrap();
			}
		})
	};

	let readers: Vec<_> = (0..4)
		.map(|_| {
			let store = Arc::clone(&store);
			let (small, large) = (small.clone(), large.clone());
			thread::spawn(move || {
				for _ in 0..50 {
					let loaded = store.load("author").unwrap().unwrap();
					assert!(loaded == small || loaded == large);
				}
			})
		})
		.collect();

	writer.join().unwrap();
	for reader in readers {
		reader.join().unwrap();
	}

	// Only the final blob remains, no temporary file.
	assert_eq!(store.blobs().keys().unwrap(), ["author"]);
	assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
