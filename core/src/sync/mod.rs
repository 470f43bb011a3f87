//! Reconciles the local record store with a remote [`UploadTarget`].
//!
//! A run takes the pending set (records not in the upload ledger), uploads each record's
//! media and then its metadata document, and marks the record uploaded only once the
//! metadata write is confirmed. Failures are scoped to the record they happened on.
//! At most one run is active per [`RecordStore`] at a time, across every engine built over
//! it; a concurrent call is rejected as a no-op.

use crate::{
	error::PersistenceError,
	record::{Record, RecordId},
	store::RecordStore,
};

use std::{
	future::Future,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex, PoisonError,
	},
	time::Duration,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use tokio::{
	sync::{broadcast, watch},
	time::timeout,
};
use tracing::{debug, info, instrument, warn};

mod directory;
mod target;

pub use directory::DirectoryTarget;
pub use target::{MetadataDocument, RemoteError, UploadTarget};

pub const DEFAULT_OBJECT_PREFIX: &str = "ceramic-images";
pub const DEFAULT_COLLECTION: &str = "ceramic_records";
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

const FALLBACK_MEDIA_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncState {
	Idle,
	Running,
	Succeeded,
	PartiallyFailed,
	Failed,
}

impl SyncState {
	/// Terminal state of a run from its outcome counts
	#[must_use]
	pub const fn settle(success_count: usize, fail_count: usize) -> Self {
		match (success_count, fail_count) {
			(_, 0) => Self::Succeeded,
			(0, _) => Self::Failed,
			_ => Self::PartiallyFailed,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadStage {
	Media,
	Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
	pub record_id: RecordId,
	pub stage: UploadStage,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
	pub state: SyncState,
	pub success_count: usize,
	pub fail_count: usize,
	/// Records still missing from the ledger once the run finished, including any
	/// appended while it was in flight
	pub pending_remaining: usize,
	pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
	Finished(SyncReport),
	/// Another run was already in flight; nothing was done
	Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
	Started { pending: usize },
	RecordUploaded { record_id: RecordId },
	RecordFailed(RecordFailure),
	Finished(SyncReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
	pub object_prefix: String,
	pub collection: String,
	/// Upper bound for each individual remote call
	pub remote_timeout: Option<Duration>,
	/// Written as the document's collector when a record carries none
	pub fallback_collector: String,
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			object_prefix: DEFAULT_OBJECT_PREFIX.to_string(),
			collection: DEFAULT_COLLECTION.to_string(),
			remote_timeout: Some(DEFAULT_REMOTE_TIMEOUT),
			fallback_collector: String::new(),
		}
	}
}

pub struct SyncEngine {
	store: Arc<RecordStore>,
	target: Arc<dyn UploadTarget>,
	settings: SyncSettings,
	state_tx: watch::Sender<SyncState>,
	events_tx: broadcast::Sender<SyncEvent>,
	last_report: Mutex<Option<SyncReport>>,
}

impl std::fmt::Debug for SyncEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncEngine")
			.field("settings", &self.settings)
			.field("state", &*self.state_tx.borrow())
			.finish_non_exhaustive()
	}
}

/// Holds the single-flight flag for the duration of a run, resetting it even when the run
/// bails out with an error
struct RunGuard<'engine> {
	running: &'engine AtomicBool,
	state_tx: &'engine watch::Sender<SyncState>,
}

impl<'engine> RunGuard<'engine> {
	fn acquire(
		running: &'engine AtomicBool,
		state_tx: &'engine watch::Sender<SyncState>,
	) -> Option<Self> {
		running
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()?;

		state_tx.send_replace(SyncState::Running);

		Some(Self { running, state_tx })
	}

	fn settle(&self, state: SyncState) {
		self.state_tx.send_replace(state);
	}
}

impl Drop for RunGuard<'_> {
	fn drop(&mut self) {
		self.state_tx.send_replace(SyncState::Idle);
		self.running.store(false, Ordering::Release);
	}
}

impl SyncEngine {
	#[must_use]
	pub fn new(
		store: Arc<RecordStore>,
		target: Arc<dyn UploadTarget>,
		settings: SyncSettings,
	) -> Self {
		let (state_tx, _) = watch::channel(SyncState::Idle);
		let (events_tx, _) = broadcast::channel(64);

		Self {
			store,
			target,
			settings,
			state_tx,
			events_tx,
			last_report: Mutex::new(None),
		}
	}

	#[must_use]
	pub const fn settings(&self) -> &SyncSettings {
		&self.settings
	}

	#[must_use]
	pub fn state(&self) -> SyncState {
		*self.state_tx.borrow()
	}

	#[must_use]
	pub fn watch_state(&self) -> watch::Receiver<SyncState> {
		self.state_tx.subscribe()
	}

	/// Progress events are received on the returned [`broadcast::Receiver<SyncEvent>`]
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
		self.events_tx.subscribe()
	}

	#[must_use]
	pub fn last_report(&self) -> Option<SyncReport> {
		self.last_report
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// Uploads every pending record once.
	///
	/// Remote failures never surface here, they are reported per record in the
	/// [`SyncReport`]. Only a failure to persist the ledger aborts the run.
	#[instrument(skip(self), err)]
	pub async fn run(&self) -> Result<SyncRun, PersistenceError> {
		let Some(guard) = RunGuard::acquire(self.store.sync_running(), &self.state_tx) else {
			info!("Sync already running, ignoring request;");
			return Ok(SyncRun::Rejected);
		};

		let pending = self.store.pending();
		self.emit(SyncEvent::Started {
			pending: pending.len(),
		});

		if pending.is_empty() {
			debug!("Nothing pending to sync;");
		} else {
			info!(pending = pending.len(), "Starting sync run;");
		}

		let mut success_count = 0;
		let mut failures = Vec::new();

		for record in &pending {
			match self.upload(record).await {
				Ok(()) => {
					if let Err(e) = self.mark_uploaded(&record.id) {
						guard.settle(SyncState::Failed);
						return Err(e);
					}

					success_count += 1;
					self.emit(SyncEvent::RecordUploaded {
						record_id: record.id.clone(),
					});
				}
				Err((stage, e)) => {
					warn!(record_id = %record.id, %stage, ?e, "Failed to upload record;");

					let failure = RecordFailure {
						record_id: record.id.clone(),
						stage,
						message: e.to_string(),
					};

					self.emit(SyncEvent::RecordFailed(failure.clone()));
					failures.push(failure);
				}
			}
		}

		let fail_count = failures.len();
		let state = SyncState::settle(success_count, fail_count);
		guard.settle(state);

		let report = SyncReport {
			state,
			success_count,
			fail_count,
			pending_remaining: self.store.pending().len(),
			failures,
		};

		info!(
			%state,
			success_count,
			fail_count,
			pending_remaining = report.pending_remaining,
			"Sync run finished;"
		);

		*self
			.last_report
			.lock()
			.unwrap_or_else(PoisonError::into_inner) = Some(report.clone());

		self.emit(SyncEvent::Finished(report.clone()));

		Ok(SyncRun::Finished(report))
	}

	async fn upload(&self, record: &Record) -> Result<(), (UploadStage, RemoteError)> {
		let remote_media = match &record.media_reference {
			Some(media) => {
				let path = object_path(&self.settings.object_prefix, record);

				Some(
					self.bounded(self.target.put_object(&path, media))
						.await
						.map_err(|e| (UploadStage::Media, e))?,
				)
			}
			None => None,
		};

		let document = MetadataDocument::new(
			record,
			remote_media.as_deref(),
			Utc::now(),
			&self.settings.fallback_collector,
		);

		self.bounded(
			self.target
				.insert_document(&self.settings.collection, &document),
		)
		.await
		.map_err(|e| (UploadStage::Metadata, e))
	}

	fn mark_uploaded(&self, id: &RecordId) -> Result<(), PersistenceError> {
		if !self.store.mark_uploaded(id)? {
			debug!(record_id = %id, "Record deleted while uploading, not marking it;");
		}

		Ok(())
	}

	async fn bounded<T>(
		&self,
		call: impl Future<Output = Result<T, RemoteError>> + Send,
	) -> Result<T, RemoteError> {
		match self.settings.remote_timeout {
			Some(limit) => timeout(limit, call)
				.await
				.unwrap_or_else(|_| Err(RemoteError::Timeout(limit))),
			None => call.await,
		}
	}

	fn emit(&self, event: SyncEvent) {
		// No subscribers is the common case
		self.events_tx.send(event).ok();
	}
}

/// `<prefix>/<id>.<ext>`, falling back to `jpg` when the media has no extension
#[must_use]
pub fn object_path(prefix: &str, record: &Record) -> String {
	let extension = record
		.media_reference
		.as_ref()
		.and_then(|media| media.extension())
		.unwrap_or(FALLBACK_MEDIA_EXTENSION);

	let prefix = prefix.trim_matches('/');
	if prefix.is_empty() {
		format!("{}.{extension}", record.id)
	} else {
		format!("{prefix}/{}.{extension}", record.id)
	}
}
