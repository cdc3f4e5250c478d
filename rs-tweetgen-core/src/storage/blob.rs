use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::debug;
use tempfile::NamedTempFile;

use crate::io::{key_path, list_keys};

/// Extension of blob files written by [`FsBlobStore`].
pub const BLOB_EXTENSION: &str = "bin";

/// Byte-oriented persistence keyed by author.
///
/// # Contract
/// - `read` distinguishes "absent" (`Ok(None)`) from failure (`Err`)
/// - `write` replaces the previous blob atomically: concurrent readers see
///   either the old or the new bytes, never a mix
/// - concurrent writers for the same key resolve as last-writer-wins
pub trait BlobStore {
	fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

	fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

	/// All keys currently holding a blob, sorted.
	fn keys(&self) -> io::Result<Vec<String>>;
}

/// One `<key>.bin` file per author inside a directory.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so the replacement is atomic on the same
/// filesystem.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
	dir: PathBuf,
}

impl FsBlobStore {
	/// Creates a store rooted at `dir`. The directory is created on first write.
	pub fn new<P: AsRef<Path>>(dir: P) -> Self {
		Self { dir: dir.as_ref().to_path_buf() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}
}

impl BlobStore for FsBlobStore {
	fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
		match fs::read(key_path(&self.dir, key, BLOB_EXTENSION)) {
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e),
		}
	}

	fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
		fs::create_dir_all(&self.dir)?;

		let target = key_path(&self.dir, key, BLOB_EXTENSION);
		let mut temp = NamedTempFile::new_in(&self.dir)?;
		temp.write_all(bytes)?;
		temp.as_file().sync_all()?;
		temp.persist(&target).map_err(|e| e.error)?;

		debug!("Wrote {} bytes to {}", bytes.len(), target.display());
		Ok(())
	}

	fn keys(&self) -> io::Result<Vec<String>> {
		list_keys(&self.dir, BLOB_EXTENSION)
	}
}

/// Blobs kept in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
	blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn poisoned() -> io::Error {
	io::Error::other("Blob store lock poisoned")
}

impl BlobStore for MemoryBlobStore {
	fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
		let blobs = self.blobs.read().map_err(|_| poisoned())?;
		Ok(blobs.get(key).cloned())
	}

	fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
		let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
		blobs.insert(key.to_owned(), bytes.to_vec());
		Ok(())
	}

	fn keys(&self) -> io::Result<Vec<String>> {
		let blobs = self.blobs.read().map_err(|_| poisoned())?;
		let mut keys: Vec<String> = blobs.keys().cloned().collect();
		keys.sort();
		Ok(keys)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn exercise(store: &dyn BlobStore) {
		assert_eq!(store.read("alice").unwrap(), None);
		assert!(store.keys().unwrap().is_empty());

		store.write("alice", b"first").unwrap();
		store.write("bob", b"other").unwrap();
		assert_eq!(store.read("alice").unwrap().as_deref(), Some(&b"first"[..]));

		store.write("alice", b"second").unwrap();
		assert_eq!(store.read("alice").unwrap().as_deref(), Some(&b"second"[..]));
		assert_eq!(store.keys().unwrap(), ["alice", "bob"]);
	}

	#[test]
	fn memory_store_contract() {
		exercise(&MemoryBlobStore::new());
	}

	#[test]
	fn fs_store_contract() {
		let dir = tempfile::tempdir().unwrap();
		let store = FsBlobStore::new(dir.path().join("chains"));
		exercise(&store);

		// No temporary files are left behind.
		let entries = fs::read_dir(store.dir()).unwrap().count();
		assert_eq!(entries, 2);
	}

	#[test]
	fn fs_store_reports_real_errors() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("not-a-dir");
		fs::write(&file, b"x").unwrap();

		let store = FsBlobStore::new(&file);
		assert!(store.write("alice", b"bytes").is_err());
	}
}
