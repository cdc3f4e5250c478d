use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use rs_tweetgen_core::config::Config;
use rs_tweetgen_core::model::{self, Anchor, Break, Chain};
use rs_tweetgen_core::service::ChainService;
use rs_tweetgen_core::storage::chain_store::to_json;
use rs_tweetgen_core::storage::{FsBlobStore, FsCorpus};

/// Command-line access to per-author Markov chains.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
	/// Configuration file (TOML)
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Build (or reuse) the chain of an author and print a summary
	Build {
		author: String,
		/// Rebuild even if a chain is stored
		#[arg(short, long)]
		force: bool,
	},
	/// Generate synthetic posts
	Generate {
		author: String,
		/// Number of posts
		#[arg(short = 'n', long)]
		count: Option<usize>,
		/// Token limit per post, 0 for none
		#[arg(short = 'l', long)]
		max_length: Option<usize>,
		/// Seed for reproducible output
		#[arg(short, long)]
		seed: Option<u64>,
	},
	/// Print the word-by-word probability of a fragment
	Score {
		author: String,
		fragment: String,
		/// Score the first word as the opening of a post
		#[arg(short, long)]
		opening: bool,
	},
	/// Most likely word following WORD
	Predict { author: String, word: String },
	/// Most frequent words of an author
	Top {
		author: String,
		#[arg(short = 'n', long, default_value_t = 20)]
		limit: usize,
	},
	/// Dump the stored chain as JSON
	Export { author: String },
}

type Service = ChainService<FsBlobStore, FsCorpus>;

/// Stored chain of `author`, built on first use.
fn chain_of(service: &Service, author: &str) -> anyhow::Result<Chain> {
	match service.get_or_build(author, false)? {
		Some(chain) => Ok(chain),
		None => bail!("No eligible posts for '{author}'"),
	}
}

fn print_report(chain: &Chain, fragment: &str, anchor: Anchor) -> anyhow::Result<()> {
	let report = model::report(chain, fragment, anchor)?;

	println!("{:<20} {:>12} {:>12}", "WORD", "IND", "TOTAL");
	for step in &report.steps {
		println!("{:<20} {:>12.6} {:>12.6e}", step.word, step.probability, step.cumulative);
	}

	match &report.stopped {
		Some(Break::UnknownWord { word }) => println!("'{word}' was never used"),
		Some(Break::UnseenTransition { from, to }) => println!("'{to}' never follows '{from}'"),
		None => {}
	}

	let score = model::score(chain, fragment, anchor)?;
	println!("Probability: {:e}", score.probability);
	println!("Next most likely word: {}", score.next_word);
	Ok(())
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let cli = Cli::parse();
	let config = Config::load(cli.config.as_deref()).context("Invalid configuration")?;
	let service = ChainService::new(
		FsBlobStore::new(config.storage.chains_dir()),
		FsCorpus::new(config.storage.corpus_dir()),
		config.chain.rebuild,
	);
	debug!("{:?}", cli.command);

	match cli.command {
		Command::Build { author, force } => match service.get_or_build_record(&author, force)? {
			Some(record) => println!("{author}: {} posts, {} nodes", record.posts, record.chain.len()),
			None => bail!("No eligible posts for '{author}'"),
		},
		Command::Generate { author, count, max_length, seed } => {
			let chain = chain_of(&service, &author)?;
			let count = count.unwrap_or(config.generate.default_count);
			let max_length = max_length.unwrap_or(config.generate.max_length);
			let posts = match seed {
				Some(seed) => service.generate(&chain, count, max_length, &mut StdRng::seed_from_u64(seed)),
				None => service.generate(&chain, count, max_length, &mut rand::rng()),
			};
			for post in posts {
				println!("{post}");
			}
		}
		Command::Score { author, fragment, opening } => {
			let chain = chain_of(&service, &author)?;
			let anchor = if opening { Anchor::Opening } else { Anchor::Anywhere };
			print_report(&chain, &fragment, anchor)?;
		}
		Command::Predict { author, word } => {
			let chain = chain_of(&service, &author)?;
			println!("{}", model::next_word_after(&chain, &word)?);
		}
		Command::Top { author, limit } => {
			let chain = chain_of(&service, &author)?;
			for entry in chain.word_frequencies().into_iter().take(limit) {
				println!("{:<20} {:>8} {:>10.6}", entry.word, entry.count, entry.probability);
			}
		}
		Command::Export { author } => {
			let Some(chain) = service.load(&author)? else {
				bail!("'{author}' not yet analyzed");
			};
			println!("{}", to_json(&chain)?);
		}
	}

	Ok(())
}
