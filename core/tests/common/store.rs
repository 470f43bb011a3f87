use kiln_core::{
	persistence::{Key, KeyValueStore, MemoryStore},
	PersistenceError,
};

use std::{
	collections::HashSet,
	sync::{Mutex, PoisonError},
};

use serde_json::Value;

/// In-memory store whose writes can be made to fail, per key or entirely
#[derive(Debug, Default)]
pub struct FlakyStore {
	inner: MemoryStore,
	failing: Mutex<Option<HashSet<Key>>>,
}

impl FlakyStore {
	/// Every write fails until [`FlakyStore::heal`]
	pub fn fail_all(&self) {
		*self.lock() = Some(HashSet::new());
	}

	/// Writes touching any of `keys` fail until [`FlakyStore::heal`]
	pub fn fail_keys(&self, keys: impl IntoIterator<Item = Key>) {
		*self.lock() = Some(keys.into_iter().collect());
	}

	pub fn heal(&self) {
		*self.lock() = None;
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Option<HashSet<Key>>> {
		self.failing.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl KeyValueStore for FlakyStore {
	fn get(&self, key: Key) -> Result<Option<Value>, PersistenceError> {
		self.inner.get(key)
	}

	fn set_many(&self, entries: Vec<(Key, Value)>) -> Result<(), PersistenceError> {
		let fails = match &*self.lock() {
			None => false,
			Some(keys) if keys.is_empty() => true,
			Some(keys) => entries.iter().any(|(key, _)| keys.contains(key)),
		};

		if fails {
			return Err(PersistenceError::Unavailable("injected write failure".to_string()));
		}

		self.inner.set_many(entries)
	}
}
