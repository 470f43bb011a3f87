use crate::{
	collector::CollectorProfile,
	config::AppConfig,
	error::{Error, PersistenceError},
	ledger::UploadLedger,
	persistence::{self, FileStore, Key, KeyValueStore},
	query::{self, RecordFilter, SortOrder},
	record::{Record, RecordDraft, RecordId},
	statistics::Statistics,
	store::RecordStore,
	sync::{SyncEngine, UploadTarget},
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

/// Everything living in one data directory: the durable store, the record collection with
/// its upload ledger, and the collector profile stamped on new records.
#[derive(Debug)]
pub struct Library {
	config: AppConfig,
	db: Arc<dyn KeyValueStore>,
	store: Arc<RecordStore>,
	collector: CollectorProfile,
}

impl Library {
	/// Opens (or creates) the file-backed store under the configured data directory
	pub fn open(config: AppConfig) -> Result<Self, Error> {
		let db = Arc::new(FileStore::open(config.store_path())?);

		Self::with_store(config, db)
	}

	pub fn with_store(config: AppConfig, db: Arc<dyn KeyValueStore>) -> Result<Self, Error> {
		if Self::bootstrap(&*db, Utc::now())? {
			info!(data_dir = %config.data_dir.display(), "First launch, library initialized;");
		}

		let ledger = Arc::new(UploadLedger::open(Arc::clone(&db))?);
		let store = Arc::new(RecordStore::open(ledger)?);
		let collector = CollectorProfile::load_or_init(Arc::clone(&db))?;

		debug!(
			records = store.len(),
			uploaded = store.ledger().len(),
			"Library opened;"
		);

		Ok(Self {
			config,
			db,
			store,
			collector,
		})
	}

	/// First-launch initialization, in a single write: an empty record list (unless one is
	/// already there), the first-launch flag and the install time. Returns whether it ran.
	pub fn bootstrap(db: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<bool, PersistenceError> {
		if db.get(Key::FirstLaunch)?.is_some() {
			return Ok(false);
		}

		let mut entries = Vec::with_capacity(3);
		if db.get(Key::Records)?.is_none() {
			entries.push((Key::Records, Value::Array(Vec::new())));
		}
		entries.push((Key::FirstLaunch, Value::Bool(false)));
		entries.push(persistence::entry(Key::InstallTime, &now)?);

		db.set_many(entries)?;

		Ok(true)
	}

	#[must_use]
	pub const fn config(&self) -> &AppConfig {
		&self.config
	}

	#[must_use]
	pub fn store(&self) -> &Arc<RecordStore> {
		&self.store
	}

	#[must_use]
	pub const fn collector(&self) -> &CollectorProfile {
		&self.collector
	}

	pub fn install_time(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
		persistence::load(&*self.db, Key::InstallTime)
	}

	/// Stamps the draft with a fresh id, the current time and the collector identity, then
	/// appends it to the store
	pub fn capture(&self, draft: RecordDraft) -> Result<Record, Error> {
		let record = draft.into_record(RecordId::generate(), Utc::now(), &self.collector.identity())?;

		self.store.append(record.clone())?;

		info!(
			record_id = %record.id,
			severity = %record.severity,
			defects = record.defect_types.len(),
			"Record captured;"
		);

		Ok(record)
	}

	pub fn delete(&self, id: &RecordId) -> Result<bool, PersistenceError> {
		self.store.delete(id)
	}

	#[must_use]
	pub fn statistics(&self) -> Statistics {
		let (records, uploaded) = self.store.snapshot_with_ledger();

		Statistics::today(&records, &uploaded)
	}

	#[must_use]
	pub fn query(&self, filter: &RecordFilter, sort: SortOrder) -> Vec<Record> {
		let snapshot = self.store.list();

		query::query(&snapshot, filter, sort)
			.into_iter()
			.cloned()
			.collect()
	}

	/// A sync engine over this library's store, configured from [`AppConfig::sync`]
	#[must_use]
	pub fn sync_engine(&self, target: Arc<dyn UploadTarget>) -> SyncEngine {
		SyncEngine::new(
			Arc::clone(&self.store),
			target,
			self.config
				.sync
				.settings(self.collector.identity().name),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{
		persistence::MemoryStore,
		record::{DefectType, Severity},
		sync::{DirectoryTarget, SyncRun},
	};

	use pretty_assertions::assert_eq;
	use serde_json::json;
	use tempfile::tempdir;

	#[test]
	fn bootstrap_runs_once() {
		let db = MemoryStore::default();
		let now = Utc::now();

		assert!(Library::bootstrap(&db, now).unwrap());
		assert_eq!(db.get(Key::Records).unwrap(), Some(json!([])));
		assert_eq!(db.get(Key::FirstLaunch).unwrap(), Some(json!(false)));

		assert!(!Library::bootstrap(&db, Utc::now()).unwrap());
		assert_eq!(
			persistence::load::<DateTime<Utc>>(&db, Key::InstallTime).unwrap(),
			Some(now)
		);
	}

	#[test]
	fn bootstrap_keeps_existing_records() {
		let db = MemoryStore::default();
		db.set(
			Key::Records,
			json!([{"id": "old", "createTime": "2024-06-10T06:15:23.456Z"}]),
		)
		.unwrap();

		assert!(Library::bootstrap(&db, Utc::now()).unwrap());
		assert_eq!(
			db.get(Key::Records).unwrap(),
			Some(json!([{"id": "old", "createTime": "2024-06-10T06:15:23.456Z"}]))
		);
	}

	#[test]
	fn captured_records_survive_reopen() {
		let dir = tempdir().unwrap();
		let config = AppConfig::default_with_dir(dir.path().to_path_buf());

		let library = Library::open(config.clone()).unwrap();
		library.collector().set_name("张三").unwrap();

		let record = library
			.capture(RecordDraft::new(Severity::Discard, [DefectType::Deformation]))
			.unwrap();
		assert_eq!(record.collector, "张三");
		assert!(library.install_time().unwrap().is_some());
		drop(library);

		let reopened = Library::open(config).unwrap();
		assert_eq!(reopened.store().list(), vec![record]);
		assert_eq!(reopened.collector().identity().name, "张三");
	}

	#[tokio::test]
	async fn sync_engines_from_one_library_never_overlap() {
		let dir = tempdir().unwrap();
		let library = Library::with_store(
			AppConfig::default_with_dir(dir.path().to_path_buf()),
			Arc::new(MemoryStore::default()),
		)
		.unwrap();

		library
			.capture(RecordDraft::new(Severity::Repairable, [DefectType::Crack]))
			.unwrap();

		let remote = DirectoryTarget::new(dir.path().join("remote"));
		let target: Arc<dyn UploadTarget> = Arc::new(remote.clone());
		let first = library.sync_engine(Arc::clone(&target));
		let second = library.sync_engine(target);

		let (a, b) = tokio::join!(first.run(), second.run());
		let runs = [a.unwrap(), b.unwrap()];

		let uploaded = runs
			.iter()
			.map(|run| match run {
				SyncRun::Finished(report) => report.success_count,
				SyncRun::Rejected => 0,
			})
			.sum::<usize>();
		assert_eq!(uploaded, 1);
		assert!(library.store().pending().is_empty());

		let written =
			std::fs::read_to_string(remote.collection_path(&first.settings().collection)).unwrap();
		assert_eq!(written.lines().count(), 1);
	}

	#[test]
	fn invalid_drafts_are_not_stored() {
		let library = Library::with_store(
			AppConfig::default_with_dir(std::env::temp_dir()),
			Arc::new(MemoryStore::default()),
		)
		.unwrap();

		assert!(library
			.capture(RecordDraft::new(Severity::Normal, [DefectType::Crack]))
			.is_err());
		assert!(library.store().is_empty());
	}
}
