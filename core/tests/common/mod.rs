#![allow(dead_code)]

pub mod store;
pub mod target;

use kiln_core::{
	persistence::KeyValueStore, CollectorIdentity, DefectType, Record, RecordDraft, RecordId,
	RecordStore, Severity, UploadLedger,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub fn open_store(db: Arc<dyn KeyValueStore>) -> Arc<RecordStore> {
	let ledger = Arc::new(UploadLedger::open(db).unwrap());

	Arc::new(RecordStore::open(ledger).unwrap())
}

pub fn record(id: &str, severity: Severity, defects: &[DefectType]) -> Record {
	record_at(id, severity, defects, Utc::now())
}

pub fn record_at(
	id: &str,
	severity: Severity,
	defects: &[DefectType],
	at: DateTime<Utc>,
) -> Record {
	RecordDraft::new(severity, defects.iter().cloned())
		.into_record(
			RecordId::from(id),
			at,
			&CollectorIdentity {
				name: "inspector".to_string(),
				avatar: None,
			},
		)
		.unwrap()
}

pub fn ids(records: &[Record]) -> Vec<String> {
	records.iter().map(|record| record.id.to_string()).collect()
}
