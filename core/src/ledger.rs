use crate::{
	error::PersistenceError,
	persistence::{Key, KeyValueStore},
	record::RecordId,
};

use std::{
	collections::BTreeSet,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Durable set of record ids confirmed present on the remote.
///
/// Kept under its own key, apart from the records, so sync progress survives record
/// rewrites. An id is only ever added after the remote confirmed the metadata write.
#[derive(Debug)]
pub struct UploadLedger {
	db: Arc<dyn KeyValueStore>,
	ids: Mutex<BTreeSet<RecordId>>,
}

impl UploadLedger {
	pub fn open(db: Arc<dyn KeyValueStore>) -> Result<Self, PersistenceError> {
		let ids = match db.get(Key::UploadedIds)? {
			None => BTreeSet::new(),
			Some(value) => match BTreeSet::<RecordId>::deserialize(&value) {
				Ok(ids) => ids,
				Err(e) => {
					warn!(?e, "Stored upload ledger is not a list of ids, resetting it;");
					db.set(Key::UploadedIds, Value::Array(Vec::new()))?;
					BTreeSet::new()
				}
			},
		};

		debug!(uploaded = ids.len(), "Upload ledger loaded;");

		Ok(Self {
			db,
			ids: Mutex::new(ids),
		})
	}

	#[must_use]
	pub fn contains(&self, id: &RecordId) -> bool {
		self.lock().contains(id)
	}

	/// Idempotent, nothing is written when the id is already present
	pub fn mark_uploaded(&self, id: &RecordId) -> Result<(), PersistenceError> {
		let mut ids = self.lock();
		if ids.contains(id) {
			return Ok(());
		}

		let mut next = ids.clone();
		next.insert(id.clone());

		self.db.set(Key::UploadedIds, serde_json::to_value(&next)?)?;
		*ids = next;

		Ok(())
	}

	/// Returns whether the id was present
	pub fn prune(&self, id: &RecordId) -> Result<bool, PersistenceError> {
		let mut ids = self.lock();
		if !ids.contains(id) {
			return Ok(false);
		}

		let mut next = ids.clone();
		next.remove(id);

		self.db.set(Key::UploadedIds, serde_json::to_value(&next)?)?;
		*ids = next;

		Ok(true)
	}

	#[must_use]
	pub fn snapshot(&self) -> BTreeSet<RecordId> {
		self.lock().clone()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub(crate) fn db(&self) -> &Arc<dyn KeyValueStore> {
		&self.db
	}

	/// The record store takes this lock after its own when it needs both
	pub(crate) fn lock(&self) -> MutexGuard<'_, BTreeSet<RecordId>> {
		self.ids.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
