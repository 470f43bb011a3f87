use crate::{
	config::ConfigError,
	persistence::Key,
	record::{RecordId, Severity},
};

use kiln_utils::error::FileIOError;

use std::path::Path;

use tracing_subscriber::util::TryInitError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Persistence(#[from] PersistenceError),
	#[error(transparent)]
	Validation(#[from] ValidationError),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to install tracing subscriber: {0}")]
	Logger(#[from] TryInitError),
}

/// Local durable read or write failed; nothing was committed
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to serialize value: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("stored value is corrupted <key='{key}'>: {source}")]
	Corrupted {
		key: Key,
		source: serde_json::Error,
	},
	#[error("store file is corrupted <path='{}'>: {source}", .path.display())]
	CorruptedFile {
		path: Box<Path>,
		source: serde_json::Error,
	},
	#[error("durable store unavailable: {0}")]
	Unavailable(String),
}

/// A record or collector input rejected before it reaches durable storage
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("normal records can't carry defect types")]
	NormalWithDefects,
	#[error("{0} records need at least one defect type")]
	MissingDefects(Severity),
	#[error("new records must be classified")]
	Unclassified,
	#[error("record already exists <id='{0}'>")]
	DuplicateId(RecordId),
	#[error("collector name can't be empty")]
	EmptyCollectorName,
	#[error("collector name exceeds {max} characters")]
	CollectorNameTooLong { max: usize },
}
