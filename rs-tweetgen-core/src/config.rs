//! Configuration loading with graceful fallback to compiled defaults.
//!
//! Resolution order:
//! 1. Explicit path (command-line `--config`)
//! 2. `RS_TWEETGEN_CONFIG` environment variable
//! 3. `./rs-tweetgen.toml` if present
//! 4. Compiled defaults
//!
//! A path given explicitly (1 or 2) must be readable and valid. The
//! default file is optional: when it is missing, defaults are used.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::io::normalize_folder;
use crate::service::RebuildPolicy;

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV: &str = "RS_TWEETGEN_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rs-tweetgen.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self { host: "127.0.0.1".to_owned(), port: 5000 }
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
	/// Folder holding one `<author>.dat` post file per author.
	pub corpus_dir: String,
	/// Folder holding one `<author>.bin` chain per author.
	pub chains_dir: String,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self { corpus_dir: "./data".to_owned(), chains_dir: "./chains".to_owned() }
	}
}

impl StorageConfig {
	pub fn corpus_dir(&self) -> PathBuf {
		normalize_folder(&self.corpus_dir)
	}

	pub fn chains_dir(&self) -> PathBuf {
		normalize_folder(&self.chains_dir)
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ChainConfig {
	pub rebuild: RebuildPolicy,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerateConfig {
	/// Posts generated when the caller does not ask for a count.
	pub default_count: usize,
	/// Upper bound on posts generated per request.
	pub max_count: usize,
	/// Token limit per post, `0` for none.
	pub max_length: usize,
}

impl Default for GenerateConfig {
	fn default() -> Self {
		Self { default_count: 10, max_count: 100, max_length: 0 }
	}
}

/// Full application configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
	pub server: ServerConfig,
	pub storage: StorageConfig,
	pub chain: ChainConfig,
	pub generate: GenerateConfig,
}

impl Config {
	/// Parses and validates a TOML document. Missing keys take their defaults.
	pub fn from_toml(contents: &str) -> Result<Self> {
		let config: Config = toml::from_str(contents).map_err(|e| ChainError::Config(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a TOML file.
	///
	/// # Errors
	/// Returns [`ChainError::Config`] if the file cannot be read or parsed.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path)
			.map_err(|e| ChainError::Config(format!("Cannot read {}: {e}", path.display())))?;
		let config = Self::from_toml(&contents)?;
		info!("Loaded configuration from {}", path.display());
		Ok(config)
	}

	/// Resolves the configuration following the module-level order.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
		Self::resolve(explicit, from_env.as_deref(), Path::new(DEFAULT_CONFIG_FILE))
	}

	fn resolve(explicit: Option<&Path>, from_env: Option<&Path>, fallback: &Path) -> Result<Self> {
		if let Some(path) = explicit.or(from_env) {
			return Self::from_file(path);
		}

		if fallback.is_file() {
			return Self::from_file(fallback);
		}

		warn!("No configuration file found ({}), using defaults", fallback.display());
		Ok(Self::default())
	}

	fn validate(&self) -> Result<()> {
		if self.generate.max_count == 0 {
			return Err(ChainError::Config("generate.max_count must be at least 1".to_owned()));
		}
		if self.generate.default_count > self.generate.max_count {
			return Err(ChainError::Config(format!(
				"generate.default_count ({}) exceeds generate.max_count ({})",
				self.generate.default_count, self.generate.max_count
			)));
		}
		Ok(())
	}
}
