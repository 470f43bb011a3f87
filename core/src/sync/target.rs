use crate::record::{DefectType, MediaReference, Record, RecordId, Severity};

use kiln_utils::error::FileIOError;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transient failure talking to the remote; scoped to the record being uploaded
#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to encode document: {0}")]
	Encode(#[from] serde_json::Error),
	#[error("remote rejected the request: {0}")]
	Rejected(String),
	#[error("remote call timed out after {0:?}")]
	Timeout(Duration),
}

/// Where records end up: an object store for media and a document collection for metadata
#[async_trait]
pub trait UploadTarget: Send + Sync {
	/// Uploads local media under `path`, returning the remote reference to it
	async fn put_object(&self, path: &str, media: &MediaReference) -> Result<String, RemoteError>;

	async fn insert_document(
		&self,
		collection: &str,
		document: &MetadataDocument,
	) -> Result<(), RemoteError>;
}

/// Wire shape of a record's metadata on the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
	pub record_id: RecordId,
	pub severity: Severity,
	pub defect_types: Vec<DefectType>,
	/// Remote media reference, empty when the record has no photo
	pub image_path: String,
	pub create_time: DateTime<Utc>,
	pub upload_time: DateTime<Utc>,
	pub collector: String,
	pub collector_avatar: String,
}

impl MetadataDocument {
	#[must_use]
	pub fn new(
		record: &Record,
		remote_media: Option<&str>,
		upload_time: DateTime<Utc>,
		fallback_collector: &str,
	) -> Self {
		Self {
			record_id: record.id.clone(),
			severity: record.severity,
			defect_types: record.defect_types.iter().cloned().collect(),
			image_path: remote_media.unwrap_or_default().to_owned(),
			create_time: record.create_time,
			upload_time,
			collector: if record.collector.is_empty() {
				fallback_collector.to_owned()
			} else {
				record.collector.clone()
			},
			collector_avatar: record.collector_avatar.clone().unwrap_or_default(),
		}
	}
}
