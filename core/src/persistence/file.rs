use crate::error::PersistenceError;

use super::{Key, KeyValueStore};

use kiln_utils::error::FileIOError;

use std::{
	collections::BTreeMap,
	fs,
	io::Write,
	path::{Path, PathBuf},
	sync::{Mutex, PoisonError},
};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// All keys live in a single JSON document that is replaced atomically on every write:
/// the new content goes to a temporary file in the same directory, gets synced, and is
/// then renamed over the old one. The in-memory copy is only swapped after the rename.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	entries: Mutex<BTreeMap<String, Value>>,
}

impl FileStore {
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
		let path = path.into();

		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| {
				FileIOError::from((parent, e, "Failed to create store directory"))
			})?;
		}

		let entries = match fs::read(&path) {
			Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
			Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
				PersistenceError::CorruptedFile {
					path: path.as_path().into(),
					source,
				}
			})?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = %path.display(), "No store file yet, starting empty;");
				BTreeMap::new()
			}
			Err(e) => {
				return Err(FileIOError::from((&path, e, "Failed to read store file")).into());
			}
		};

		Ok(Self {
			path,
			entries: Mutex::new(entries),
		})
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn write(&self, entries: &BTreeMap<String, Value>) -> Result<(), PersistenceError> {
		let dir = self
			.path
			.parent()
			.filter(|parent| !parent.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));

		let bytes = serde_json::to_vec(entries)?;

		let mut temp = NamedTempFile::new_in(dir)
			.map_err(|e| FileIOError::from((dir, e, "Failed to create temporary store file")))?;

		temp.write_all(&bytes)
			.map_err(|e| FileIOError::from((temp.path(), e, "Failed to write temporary store file")))?;

		temp.as_file()
			.sync_all()
			.map_err(|e| FileIOError::from((temp.path(), e, "Failed to sync temporary store file")))?;

		temp.persist(&self.path)
			.map_err(|e| FileIOError::from((&self.path, e.error, "Failed to replace store file")))?;

		trace!(path = %self.path.display(), bytes = bytes.len(), "Store file replaced;");

		Ok(())
	}
}

impl KeyValueStore for FileStore {
	fn get(&self, key: Key) -> Result<Option<Value>, PersistenceError> {
		Ok(self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(key.as_str())
			.cloned())
	}

	fn set_many(&self, entries: Vec<(Key, Value)>) -> Result<(), PersistenceError> {
		let mut current = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		let mut next = current.clone();
		next.extend(
			entries
				.into_iter()
				.map(|(key, value)| (key.as_str().to_owned(), value)),
		);

		self.write(&next)?;
		*current = next;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;
	use serde_json::json;
	use tempfile::tempdir;

	#[test]
	fn writes_survive_reopen() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("nested").join("store.json");

		let store = FileStore::open(&path).unwrap();
		store
			.set_many(vec![
				(Key::Records, json!([])),
				(Key::UploadedIds, json!(["a", "b"])),
			])
			.unwrap();
		drop(store);

		let reopened = FileStore::open(&path).unwrap();
		assert_eq!(reopened.get(Key::UploadedIds).unwrap(), Some(json!(["a", "b"])));
		assert_eq!(reopened.get(Key::Records).unwrap(), Some(json!([])));
		assert_eq!(reopened.get(Key::CollectorName).unwrap(), None);
	}

	#[test]
	fn unknown_keys_are_kept() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("store.json");
		fs::write(&path, r#"{"userInfo":{"nickName":"wx"}}"#).unwrap();

		let store = FileStore::open(&path).unwrap();
		store.set(Key::FirstLaunch, json!(false)).unwrap();

		let on_disk: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
		assert_eq!(on_disk["userInfo"]["nickName"], json!("wx"));
		assert_eq!(on_disk["first_launch"], json!(false));
	}

	#[test]
	fn corrupted_file_is_reported() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("store.json");
		fs::write(&path, "{ definitely not json").unwrap();

		assert!(matches!(
			FileStore::open(&path),
			Err(PersistenceError::CorruptedFile { .. })
		));
	}

	#[cfg(unix)]
	#[test]
	fn failed_write_leaves_reads_untouched() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempdir().unwrap();
		let path = dir.path().join("store.json");

		let store = FileStore::open(&path).unwrap();
		store.set(Key::CollectorName, json!("before")).unwrap();

		fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o500)).unwrap();
		let res = store.set(Key::CollectorName, json!("after"));
		fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700)).unwrap();

		// Running as root ignores directory permissions, nothing to assert then
		if res.is_err() {
			assert_eq!(store.get(Key::CollectorName).unwrap(), Some(json!("before")));
		}
	}
}
