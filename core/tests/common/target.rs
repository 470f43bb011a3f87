use kiln_core::{
	record::{MediaReference, RecordId},
	sync::{MetadataDocument, RemoteError, UploadTarget},
};

use std::{
	collections::HashSet,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Calls {
	objects: Vec<String>,
	documents: Vec<MetadataDocument>,
}

/// Remote double recording every call, with per-record failure injection
#[derive(Debug, Default)]
pub struct MockTarget {
	calls: Mutex<Calls>,
	fail_media: Mutex<HashSet<RecordId>>,
	fail_metadata: Mutex<HashSet<RecordId>>,
	metadata_delay: Mutex<Option<Duration>>,
	gate: Mutex<Option<Gate>>,
}

/// Parks the next metadata write until released
#[derive(Debug, Clone, Default)]
pub struct Gate {
	pub entered: Arc<Notify>,
	pub release: Arc<Notify>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTarget {
	pub fn fail_media_for(&self, id: &str) {
		lock(&self.fail_media).insert(RecordId::from(id));
	}

	pub fn fail_metadata_for(&self, id: &str) {
		lock(&self.fail_metadata).insert(RecordId::from(id));
	}

	pub fn heal(&self) {
		lock(&self.fail_media).clear();
		lock(&self.fail_metadata).clear();
	}

	pub fn delay_metadata(&self, delay: Duration) {
		*lock(&self.metadata_delay) = Some(delay);
	}

	pub fn gate_next_metadata(&self) -> Gate {
		let gate = Gate::default();
		*lock(&self.gate) = Some(gate.clone());
		gate
	}

	pub fn objects(&self) -> Vec<String> {
		lock(&self.calls).objects.clone()
	}

	pub fn documents(&self) -> Vec<MetadataDocument> {
		lock(&self.calls).documents.clone()
	}

	pub fn uploaded_ids(&self) -> Vec<String> {
		self.documents()
			.into_iter()
			.map(|document| document.record_id.to_string())
			.collect()
	}

	pub fn call_count(&self) -> usize {
		let calls = lock(&self.calls);
		calls.objects.len() + calls.documents.len()
	}
}

#[async_trait]
impl UploadTarget for MockTarget {
	async fn put_object(&self, path: &str, _media: &MediaReference) -> Result<String, RemoteError> {
		let failing = lock(&self.fail_media)
			.iter()
			.any(|id| path.contains(id.as_str()));
		if failing {
			return Err(RemoteError::Rejected(format!("media refused for {path}")));
		}

		lock(&self.calls).objects.push(path.to_string());

		Ok(format!("remote://{path}"))
	}

	async fn insert_document(
		&self,
		_collection: &str,
		document: &MetadataDocument,
	) -> Result<(), RemoteError> {
		let gate = lock(&self.gate).take();
		if let Some(gate) = gate {
			gate.entered.notify_one();
			gate.release.notified().await;
		}

		let delay = *lock(&self.metadata_delay);
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		if lock(&self.fail_metadata).contains(&document.record_id) {
			return Err(RemoteError::Rejected(format!(
				"document refused for {}",
				document.record_id
			)));
		}

		lock(&self.calls).documents.push(document.clone());

		Ok(())
	}
}
