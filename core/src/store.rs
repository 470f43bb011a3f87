use crate::{
	error::{Error, PersistenceError, ValidationError},
	ledger::UploadLedger,
	persistence::{self, Key, KeyValueStore},
	record::{Record, RecordId},
};

use std::{
	collections::BTreeSet,
	sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Durable, newest-first collection of records.
///
/// Records share the ledger's [`KeyValueStore`], so a deletion and the matching ledger
/// prune land in one `set_many` call. Lock order is always records, then ledger.
///
/// Stored entries that fail to decode are kept verbatim and written back after the
/// decoded records on every rewrite.
#[derive(Debug)]
pub struct RecordStore {
	db: Arc<dyn KeyValueStore>,
	ledger: Arc<UploadLedger>,
	records: Mutex<Vec<Record>>,
	undecodable: Vec<Value>,
	sync_running: AtomicBool,
}

impl RecordStore {
	pub fn open(ledger: Arc<UploadLedger>) -> Result<Self, PersistenceError> {
		let db = Arc::clone(ledger.db());

		let (records, undecodable) = match db.get(Key::Records)? {
			None => (Vec::new(), Vec::new()),
			Some(Value::Array(entries)) => decode_entries(entries),
			Some(other) => {
				warn!(
					found = %json_kind(&other),
					"Stored record list is not an array, resetting it;"
				);
				db.set(Key::Records, Value::Array(Vec::new()))?;
				(Vec::new(), Vec::new())
			}
		};

		let store = Self {
			db,
			ledger,
			records: Mutex::new(records),
			undecodable,
			sync_running: AtomicBool::new(false),
		};

		store.prune_orphaned_ledger_entries()?;

		debug!(
			records = store.lock().len(),
			undecodable = store.undecodable.len(),
			"Record store loaded;"
		);

		Ok(store)
	}

	#[must_use]
	pub fn ledger(&self) -> &Arc<UploadLedger> {
		&self.ledger
	}

	/// Inserts at the head. Nothing changes in memory unless the durable write succeeded.
	pub fn append(&self, record: Record) -> Result<(), Error> {
		record.validate()?;

		let mut records = self.lock();
		if records.iter().any(|existing| existing.id == record.id) {
			return Err(ValidationError::DuplicateId(record.id).into());
		}

		let id = record.id.clone();

		let mut next = Vec::with_capacity(records.len() + 1);
		next.push(record);
		next.extend(records.iter().cloned());

		let (key, value) = self.encode(&next)?;
		self.db.set(key, value)?;
		*records = next;

		debug!(record_id = %id, total = records.len(), "Record appended;");

		Ok(())
	}

	/// Newest-inserted first
	#[must_use]
	pub fn list(&self) -> Vec<Record> {
		self.lock().clone()
	}

	#[must_use]
	pub fn get(&self, id: &RecordId) -> Option<Record> {
		self.lock().iter().find(|record| &record.id == id).cloned()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	/// Removes the record and its ledger entry in a single durable write.
	/// Returns whether a record was removed.
	pub fn delete(&self, id: &RecordId) -> Result<bool, PersistenceError> {
		let mut records = self.lock();
		let Some(position) = records.iter().position(|record| &record.id == id) else {
			return Ok(false);
		};

		let mut uploaded = self.ledger.lock();

		let mut next_records = records.clone();
		next_records.remove(position);

		let mut entries = vec![self.encode(&next_records)?];

		let next_uploaded = if uploaded.contains(id) {
			let mut next = uploaded.clone();
			next.remove(id);
			entries.push(persistence::entry(Key::UploadedIds, &next)?);
			Some(next)
		} else {
			None
		};

		self.db.set_many(entries)?;

		*records = next_records;
		let pruned = next_uploaded.is_some();
		if let Some(next) = next_uploaded {
			*uploaded = next;
		}

		info!(record_id = %id, pruned, "Record deleted;");

		Ok(true)
	}

	/// Records not yet confirmed remote, newest-first, as one consistent snapshot
	#[must_use]
	pub fn pending(&self) -> Vec<Record> {
		let records = self.lock();
		let uploaded = self.ledger.lock();

		records
			.iter()
			.filter(|record| !uploaded.contains(&record.id))
			.cloned()
			.collect()
	}

	/// Both stores read under their locks, so no deletion can land in between
	#[must_use]
	pub fn snapshot_with_ledger(&self) -> (Vec<Record>, BTreeSet<RecordId>) {
		let records = self.lock();
		let uploaded = self.ledger.lock();

		(records.clone(), uploaded.clone())
	}

	/// Marks the id uploaded only while the record still exists, so a record deleted
	/// during a sync run can't leave a dangling ledger entry. Returns whether it was marked.
	pub fn mark_uploaded(&self, id: &RecordId) -> Result<bool, PersistenceError> {
		let records = self.lock();
		if !records.iter().any(|record| &record.id == id) {
			return Ok(false);
		}

		self.ledger.mark_uploaded(id)?;

		Ok(true)
	}

	fn prune_orphaned_ledger_entries(&self) -> Result<(), PersistenceError> {
		let records = self.lock();
		let mut uploaded = self.ledger.lock();

		let known = records
			.iter()
			.map(|record| record.id.as_str())
			.chain(
				self.undecodable
					.iter()
					.filter_map(|entry| entry.get("id").and_then(Value::as_str)),
			)
			.collect::<BTreeSet<_>>();

		let next = uploaded
			.iter()
			.filter(|id| known.contains(id.as_str()))
			.cloned()
			.collect::<BTreeSet<_>>();

		if next.len() != uploaded.len() {
			warn!(
				orphaned = uploaded.len() - next.len(),
				"Upload ledger references deleted records, pruning;"
			);
			self.db.set(Key::UploadedIds, serde_json::to_value(&next)?)?;
			*uploaded = next;
		}

		Ok(())
	}

	/// Single-flight flag shared by every sync engine running over this store
	pub(crate) const fn sync_running(&self) -> &AtomicBool {
		&self.sync_running
	}

	/// The durable form of `records`, followed by the entries we couldn't decode
	fn encode(&self, records: &[Record]) -> Result<(Key, Value), PersistenceError> {
		let mut entries = records
			.iter()
			.map(serde_json::to_value)
			.collect::<Result<Vec<_>, _>>()?;
		entries.extend(self.undecodable.iter().cloned());

		Ok((Key::Records, Value::Array(entries)))
	}

	fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
		self.records.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn decode_entries(entries: Vec<Value>) -> (Vec<Record>, Vec<Value>) {
	let mut records = Vec::with_capacity(entries.len());
	let mut undecodable = Vec::new();

	for (index, entry) in entries.into_iter().enumerate() {
		match Record::deserialize(&entry) {
			Ok(record) => records.push(record),
			Err(e) => {
				warn!(index, ?e, "Keeping undecodable stored record as is;");
				undecodable.push(entry);
			}
		}
	}

	(records, undecodable)
}

const fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{
		collector::CollectorIdentity,
		persistence::MemoryStore,
		record::{DefectType, RecordDraft, Severity},
	};

	use chrono::Utc;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	fn open(db: &Arc<dyn KeyValueStore>) -> RecordStore {
		RecordStore::open(Arc::new(UploadLedger::open(Arc::clone(db)).unwrap())).unwrap()
	}

	fn record(id: &str) -> Record {
		RecordDraft::new(Severity::Repairable, [DefectType::Scratch])
			.into_record(RecordId::from(id), Utc::now(), &CollectorIdentity::default())
			.unwrap()
	}

	#[test]
	fn non_array_value_is_reset() {
		let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
		db.set(Key::Records, json!({"broken": true})).unwrap();

		let store = open(&db);

		assert!(store.is_empty());
		assert_eq!(db.get(Key::Records).unwrap(), Some(json!([])));
	}

	#[test]
	fn undecodable_entries_survive_rewrites() {
		let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
		let broken = json!({"id": "broken", "defectType": "划痕", "createTime": "yesterday"});
		db.set(
			Key::Records,
			json!([
				{"id": "ok", "defectType": "划痕", "createTime": "2024-06-10T06:15:23.456Z"},
				broken.clone()
			]),
		)
		.unwrap();
		db.set(Key::UploadedIds, json!(["broken"])).unwrap();

		let store = open(&db);
		assert_eq!(
			store.list().into_iter().map(|r| r.id).collect::<Vec<_>>(),
			vec![RecordId::from("ok")]
		);
		// Still referenced by a stored entry, so not an orphan
		assert!(store.ledger().contains(&RecordId::from("broken")));

		store.append(record("new")).unwrap();
		assert!(store.delete(&RecordId::from("ok")).unwrap());

		let stored = db.get(Key::Records).unwrap().unwrap();
		let stored = stored.as_array().unwrap();
		assert_eq!(stored.len(), 2);
		assert_eq!(stored[0]["id"], json!("new"));
		assert_eq!(stored[1], broken);
	}

	#[test]
	fn orphaned_ledger_entries_are_pruned_on_open() {
		let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
		db.set(
			Key::Records,
			json!([{"id": "kept", "createTime": "2024-06-10T06:15:23.456Z"}]),
		)
		.unwrap();
		db.set(Key::UploadedIds, json!(["kept", "gone"])).unwrap();

		let store = open(&db);

		assert_eq!(
			store.ledger().snapshot().into_iter().collect::<Vec<_>>(),
			vec![RecordId::from("kept")]
		);
		assert_eq!(db.get(Key::UploadedIds).unwrap(), Some(json!(["kept"])));
	}

	#[test]
	fn duplicate_ids_are_rejected() {
		let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
		let store = open(&db);

		store.append(record("a")).unwrap();

		assert!(matches!(
			store.append(record("a")),
			Err(Error::Validation(ValidationError::DuplicateId(_)))
		));
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn mark_uploaded_skips_missing_records() {
		let db: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
		let store = open(&db);
		store.append(record("a")).unwrap();

		assert!(store.mark_uploaded(&RecordId::from("a")).unwrap());
		assert!(!store.mark_uploaded(&RecordId::from("missing")).unwrap());
		assert!(!store.ledger().contains(&RecordId::from("missing")));
	}
}
