use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use log::warn;

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
/// - Invalid UTF-8 sequences become `U+FFFD` instead of failing the file
pub(crate) fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let filename = filename.as_ref();
	let mut bytes = Vec::new();
	File::open(filename)?.read_to_end(&mut bytes)?;

	let contents = String::from_utf8_lossy(&bytes);
	if let Cow::Owned(_) = contents {
		warn!("{} is not valid UTF-8, undecodable bytes replaced", filename.display());
	}
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds the path of the file holding `key` inside `folder`.
///
/// Example:
/// `chains` + `"alice"` + `"bin"` → `chains/alice.bin`
pub(crate) fn key_path<P: AsRef<Path>>(folder: P, key: &str, extension: &str) -> PathBuf {
	// Not `set_extension`: keys may contain dots.
	folder.as_ref().join(format!("{key}.{extension}"))
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub(crate) fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists the keys (file stems) of all files with a given extension in a directory.
///
/// A missing directory has no keys.
pub(crate) fn list_keys<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let dir = dir.as_ref();
	if !dir.is_dir() {
		return Ok(Vec::new());
	}

	let mut keys = Vec::new();
	for entry in fs::read_dir(dir)? {
		let path = entry?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(stem) = path.file_stem() {
				keys.push(stem.to_string_lossy().to_string());
			}
		}
	}

	keys.sort();
	Ok(keys)
}
