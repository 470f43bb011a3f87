//! Durable key-value persistence the stores are built on.
//!
//! Values are JSON documents. Implementations must make [`KeyValueStore::set_many`] atomic:
//! after it returns, either every entry is durable or none is, and a failed call must not be
//! observable through later reads.

use crate::error::PersistenceError;

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use strum::{Display, IntoStaticStr};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// The keyspaces we persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Key {
	#[strum(serialize = "ceramic_records")]
	Records,
	#[strum(serialize = "uploaded_record_ids")]
	UploadedIds,
	#[strum(serialize = "collector_name")]
	CollectorName,
	#[strum(serialize = "collector_avatar")]
	CollectorAvatar,
	#[strum(serialize = "first_launch")]
	FirstLaunch,
	#[strum(serialize = "install_time")]
	InstallTime,
}

impl Key {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		self.into()
	}
}

pub trait KeyValueStore: fmt::Debug + Send + Sync {
	fn get(&self, key: Key) -> Result<Option<Value>, PersistenceError>;

	/// Writes all entries in one durable step
	fn set_many(&self, entries: Vec<(Key, Value)>) -> Result<(), PersistenceError>;

	fn set(&self, key: Key, value: Value) -> Result<(), PersistenceError> {
		self.set_many(vec![(key, value)])
	}
}

/// Reads and decodes a key, `None` when it was never written
pub fn load<T: DeserializeOwned>(
	db: &dyn KeyValueStore,
	key: Key,
) -> Result<Option<T>, PersistenceError> {
	db.get(key)?
		.map(|value| {
			serde_json::from_value(value).map_err(|source| PersistenceError::Corrupted { key, source })
		})
		.transpose()
}

pub fn entry<T: Serialize>(key: Key, value: &T) -> Result<(Key, Value), PersistenceError> {
	Ok((key, serde_json::to_value(value)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	use serde_json::json;

	#[test]
	fn keys_match_stored_names() {
		assert_eq!(Key::Records.as_str(), "ceramic_records");
		assert_eq!(Key::UploadedIds.to_string(), "uploaded_record_ids");
	}

	#[test]
	fn load_reports_corrupted_values() {
		let db = MemoryStore::default();
		db.set(Key::InstallTime, json!({"not": "a timestamp"})).unwrap();

		let res = load::<chrono::DateTime<chrono::Utc>>(&db, Key::InstallTime);

		assert!(matches!(
			res,
			Err(PersistenceError::Corrupted {
				key: Key::InstallTime,
				..
			})
		));
		assert!(matches!(load::<String>(&db, Key::CollectorName), Ok(None)));
	}
}
