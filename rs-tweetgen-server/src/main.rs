use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, put, web};
use clap::Parser;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use rs_tweetgen_core::ChainError;
use rs_tweetgen_core::config::{Config, GenerateConfig};
use rs_tweetgen_core::model::{self, Anchor, Chain};
use rs_tweetgen_core::service::ChainService;
use rs_tweetgen_core::storage::{FsBlobStore, FsCorpus};

/// HTTP facade over per-author Markov chains.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
	/// Configuration file (TOML)
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Overrides `server.host`
	#[arg(long)]
	host: Option<String>,

	/// Overrides `server.port`
	#[arg(long)]
	port: Option<u16>,
}

/// Query parameters for `/v1/users`
#[derive(Deserialize)]
struct UserQuery {
	name: Option<String>,
	force: Option<bool>,
}

/// Query parameters for `/v1/generate`
#[derive(Deserialize)]
struct GenerateParams {
	user: Option<String>,
	count: Option<usize>,
	max_length: Option<usize>,
}

/// Query parameters for `/v1/score`
#[derive(Deserialize)]
struct ScoreParams {
	user: Option<String>,
	fragment: Option<String>,
	anchor: Option<Anchor>,
}

/// Query parameters for `/v1/predict`
#[derive(Deserialize)]
struct PredictParams {
	user: Option<String>,
	word: Option<String>,
}

/// Query parameters for `/v1/words`
#[derive(Deserialize)]
struct WordsParams {
	user: Option<String>,
	limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug)]
struct BuildSummary {
	author: String,
	nodes: usize,
	posts: u64,
}

#[derive(Serialize, Deserialize, Debug)]
struct Prediction {
	next_word: String,
}

/// State shared by every worker.
///
/// Chains are immutable once loaded, so handlers share them through
/// `Arc` and sample with their own thread-local random source.
struct SharedData {
	service: ChainService<FsBlobStore, FsCorpus>,
	chains: RwLock<HashMap<String, Arc<Chain>>>,
	generate: GenerateConfig,
}

impl SharedData {
	fn new(config: &Config) -> Self {
		Self {
			service: ChainService::new(
				FsBlobStore::new(config.storage.chains_dir()),
				FsCorpus::new(config.storage.corpus_dir()),
				config.chain.rebuild,
			),
			chains: RwLock::new(HashMap::new()),
			generate: config.generate.clone(),
		}
	}

	// The cache only ever holds complete `Arc<Chain>` values, so a panic
	// while the lock was held cannot leave it half-updated.
	fn cached(&self, author: &str) -> Option<Arc<Chain>> {
		let chains = self.chains.read().unwrap_or_else(|poisoned| {
			warn!("Chain cache lock poisoned, reusing it");
			poisoned.into_inner()
		});
		chains.get(author).cloned()
	}

	fn cache(&self, author: &str, chain: Chain) -> Arc<Chain> {
		let chain = Arc::new(chain);
		let mut chains = self.chains.write().unwrap_or_else(|poisoned| {
			warn!("Chain cache lock poisoned, reusing it");
			poisoned.into_inner()
		});
		chains.insert(author.to_owned(), Arc::clone(&chain));
		chain
	}
}

/// Maps a core error to the matching HTTP status.
fn error_response(e: &ChainError) -> HttpResponse {
	let status = match e {
		ChainError::MalformedFragment | ChainError::InvalidAuthor(_) => StatusCode::BAD_REQUEST,
		ChainError::EmptyCorpus => StatusCode::NOT_FOUND,
		ChainError::StoreUnavailable(_) | ChainError::CorpusUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
		ChainError::Corrupt { .. }
		| ChainError::UnsupportedVersion { .. }
		| ChainError::Encoding(_)
		| ChainError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
	};
	if status.is_server_error() {
		error!("{e}");
	}
	HttpResponse::build(status).body(e.to_string())
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, HttpResponse> {
	match value {
		Some(s) if !s.trim().is_empty() => Ok(s.trim()),
		_ => Err(HttpResponse::BadRequest().body(format!("Missing or empty {name}"))),
	}
}

/// Returns the loaded chain of `author`, reading the store on a cache miss.
///
/// Read routes never build: an author without a stored chain has not
/// been analyzed yet.
async fn loaded_chain(data: &web::Data<SharedData>, author: &str) -> Result<Arc<Chain>, HttpResponse> {
	if let Some(chain) = data.cached(author) {
		return Ok(chain);
	}

	let shared = data.clone();
	let key = author.to_owned();
	let loaded = web::block(move || shared.service.load(&key))
		.await
		.map_err(|_| HttpResponse::InternalServerError().body("Worker failed"))?;

	match loaded {
		Ok(Some(chain)) => Ok(data.cache(author, chain)),
		Ok(None) => Err(HttpResponse::NotFound().body(format!("User '{author}' not yet analyzed"))),
		Err(e) => Err(error_response(&e)),
	}
}

/// HTTP GET endpoint `/v1/users`
///
/// Lists authors with a stored chain.
#[get("/v1/users")]
async fn get_users(data: web::Data<SharedData>) -> impl Responder {
	let shared = data.clone();
	match web::block(move || shared.service.analyzed_authors()).await {
		Ok(Ok(authors)) => HttpResponse::Ok().json(authors),
		Ok(Err(e)) => error_response(&e),
		Err(_) => HttpResponse::InternalServerError().body("Worker failed"),
	}
}

/// HTTP PUT endpoint `/v1/users`
///
/// Builds (or with `force=true` rebuilds) the chain of `name` from its corpus.
#[put("/v1/users")]
async fn put_user(data: web::Data<SharedData>, query: web::Query<UserQuery>) -> impl Responder {
	let author = match required(&query.name, "name") {
		Ok(s) => s.to_owned(),
		Err(response) => return response,
	};
	let force = query.force.unwrap_or(false);

	let shared = data.clone();
	let key = author.clone();
	let built = match web::block(move || shared.service.get_or_build_record(&key, force)).await {
		Ok(result) => result,
		Err(_) => return HttpResponse::InternalServerError().body("Worker failed"),
	};

	match built {
		Ok(Some(record)) => {
			let summary = BuildSummary { author: author.clone(), nodes: record.chain.len(), posts: record.posts };
			data.cache(&author, record.chain);
			HttpResponse::Ok().json(summary)
		}
		Ok(None) => HttpResponse::NotFound().body(format!("No eligible posts for '{author}'")),
		Err(e) => error_response(&e),
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates `count` posts for an analyzed user.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<SharedData>, query: web::Query<GenerateParams>) -> impl Responder {
	let author = match required(&query.user, "user") {
		Ok(s) => s,
		Err(response) => return response,
	};
	let count = query.count.unwrap_or(data.generate.default_count).min(data.generate.max_count);
	let max_length = query.max_length.unwrap_or(data.generate.max_length);

	let chain = match loaded_chain(&data, author).await {
		Ok(chain) => chain,
		Err(response) => return response,
	};

	let posts = data.service.generate(&chain, count, max_length, &mut rand::rng());
	HttpResponse::Ok().json(posts)
}

/// HTTP GET endpoint `/v1/score`
///
/// Probability of `fragment` for an analyzed user and its likely next word.
#[get("/v1/score")]
async fn get_score(data: web::Data<SharedData>, query: web::Query<ScoreParams>) -> impl Responder {
	let author = match required(&query.user, "user") {
		Ok(s) => s,
		Err(response) => return response,
	};
	let fragment = query.fragment.as_deref().unwrap_or_default();

	let chain = match loaded_chain(&data, author).await {
		Ok(chain) => chain,
		Err(response) => return response,
	};

	match data.service.score(&chain, fragment, query.anchor.unwrap_or_default()) {
		Ok(score) => HttpResponse::Ok().json(score),
		Err(e) => error_response(&e),
	}
}

/// HTTP GET endpoint `/v1/predict`
///
/// Most likely word following `word`, or `END`.
///
/// `word` is tokenized like a score fragment, so `We're` predicts from `'re`.
#[get("/v1/predict")]
async fn get_prediction(data: web::Data<SharedData>, query: web::Query<PredictParams>) -> impl Responder {
	let author = match required(&query.user, "user") {
		Ok(s) => s,
		Err(response) => return response,
	};
	let word = query.word.as_deref().unwrap_or_default();

	let chain = match loaded_chain(&data, author).await {
		Ok(chain) => chain,
		Err(response) => return response,
	};

	match model::next_word_after(&chain, word) {
		Ok(next_word) => HttpResponse::Ok().json(Prediction { next_word: next_word.to_owned() }),
		Err(e) => error_response(&e),
	}
}

/// HTTP GET endpoint `/v1/words`
///
/// Most frequent words of an analyzed user.
#[get("/v1/words")]
async fn get_words(data: web::Data<SharedData>, query: web::Query<WordsParams>) -> impl Responder {
	let author = match required(&query.user, "user") {
		Ok(s) => s,
		Err(response) => return response,
	};

	let chain = match loaded_chain(&data, author).await {
		Ok(chain) => chain,
		Err(response) => return response,
	};

	let words: Vec<_> = chain.word_frequencies().into_iter().take(query.limit.unwrap_or(20)).collect();
	HttpResponse::Ok().json(words)
}

fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(get_users)
		.service(put_user)
		.service(get_generated)
		.service(get_score)
		.service(get_prediction)
		.service(get_words);
}

/// Main entry point for the server.
///
/// Resolves the configuration, then serves the chain routes with request
/// logging and permissive CORS for browser clients.
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = Args::parse();
	let mut config = Config::load(args.config.as_deref())?;
	if let Some(host) = args.host {
		config.server.host = host;
	}
	if let Some(port) = args.port {
		config.server.port = port;
	}

	info!(
		"Starting rs-tweetgen-server v{} (corpus: {}, chains: {}, rebuild: {:?})",
		env!("CARGO_PKG_VERSION"),
		config.storage.corpus_dir().display(),
		config.storage.chains_dir().display(),
		config.chain.rebuild
	);

	let shared_data = web::Data::new(SharedData::new(&config));
	let address = (config.server.host.clone(), config.server.port);
	info!("Listening on http://{}:{}", address.0, address.1);

	HttpServer::new(move || {
		App::new()
			.app_data(shared_data.clone())
			.wrap(Logger::default())
			.wrap(Cors::default().allow_any_origin().allowed_methods(vec!["GET", "PUT"]).allow_any_header())
			.configure(routes)
	})
		.bind(address)?
		.run()
		.await?;

	Ok(())
}
