use crate::error::PersistenceError;

use super::{Key, KeyValueStore};

use std::{
	collections::HashMap,
	sync::{Mutex, PoisonError},
};

use serde_json::Value;

/// Volatile store, for tests and for running without a data directory
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<Key, Value>>,
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: Key) -> Result<Option<Value>, PersistenceError> {
		Ok(self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&key)
			.cloned())
	}

	fn set_many(&self, entries: Vec<(Key, Value)>) -> Result<(), PersistenceError> {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.extend(entries);

		Ok(())
	}
}
