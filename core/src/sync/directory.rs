use crate::record::MediaReference;

use super::target::{MetadataDocument, RemoteError, UploadTarget};

use kiln_utils::error::FileIOError;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::trace;

const OBJECTS_DIR: &str = "objects";
const COLLECTIONS_DIR: &str = "collections";

/// [`UploadTarget`] backed by a local directory, e.g. a mounted share that another machine
/// collects from. Objects are copied under `objects/`, documents are appended as JSON lines
/// to `collections/<name>.jsonl`.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
	root: PathBuf,
}

impl DirectoryTarget {
	#[must_use]
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	#[must_use]
	pub fn collection_path(&self, collection: &str) -> PathBuf {
		self.root
			.join(COLLECTIONS_DIR)
			.join(format!("{collection}.jsonl"))
	}

	async fn ensure_parent(path: &Path) -> Result<(), RemoteError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| FileIOError::from((parent, e, "Failed to create target directory")))?;
		}

		Ok(())
	}
}

/// Keys must stay inside the target root
fn checked_relative(key: &str) -> Result<&Path, RemoteError> {
	let path = Path::new(key);

	if key.is_empty()
		|| !path
			.components()
			.all(|component| matches!(component, Component::Normal(_)))
	{
		return Err(RemoteError::Rejected(format!("invalid key '{key}'")));
	}

	Ok(path)
}

#[async_trait]
impl UploadTarget for DirectoryTarget {
	async fn put_object(&self, path: &str, media: &MediaReference) -> Result<String, RemoteError> {
		let destination = self.root.join(OBJECTS_DIR).join(checked_relative(path)?);

		Self::ensure_parent(&destination).await?;

		let bytes = fs::copy(media.as_path(), &destination)
			.await
			.map_err(|e| FileIOError::from((media.as_path(), e, "Failed to copy media")))?;

		trace!(%path, bytes, "Object stored;");

		Ok(format!("{OBJECTS_DIR}/{path}"))
	}

	async fn insert_document(
		&self,
		collection: &str,
		document: &MetadataDocument,
	) -> Result<(), RemoteError> {
		checked_relative(collection)?;
		if collection.contains('/') {
			return Err(RemoteError::Rejected(format!(
				"invalid collection '{collection}'"
			)));
		}

		let path = self.collection_path(collection);
		Self::ensure_parent(&path).await?;

		let mut line = serde_json::to_vec(document)?;
		line.push(b'\n');

		let mut file = fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&path)
			.await
			.map_err(|e| FileIOError::from((&path, e, "Failed to open collection file")))?;

		file.write_all(&line)
			.await
			.map_err(|e| FileIOError::from((&path, e, "Failed to append document")))?;

		file.sync_all()
			.await
			.map_err(|e| FileIOError::from((&path, e, "Failed to sync collection file")))?;

		trace!(%collection, record_id = %document.record_id, "Document appended;");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{
		collector::CollectorIdentity,
		record::{DefectType, RecordDraft, RecordId, Severity},
	};

	use chrono::Utc;
	use pretty_assertions::assert_eq;
	use tempfile::tempdir;

	#[tokio::test]
	async fn objects_and_documents_land_in_the_directory() {
		let source = tempdir().unwrap();
		let remote = tempdir().unwrap();

		let media_path = source.path().join("photo.png");
		std::fs::write(&media_path, b"png bytes").unwrap();
		let media = MediaReference::new(media_path.to_string_lossy());

		let target = DirectoryTarget::new(remote.path());

		let reference = target
			.put_object("ceramic-images/r1.png", &media)
			.await
			.unwrap();
		assert_eq!(reference, "objects/ceramic-images/r1.png");
		assert_eq!(
			std::fs::read(remote.path().join("objects/ceramic-images/r1.png")).unwrap(),
			b"png bytes"
		);

		let record = RecordDraft::new(Severity::Discard, [DefectType::Crack])
			.into_record(RecordId::from("r1"), Utc::now(), &CollectorIdentity::default())
			.unwrap();
		let document = MetadataDocument::new(&record, Some(&reference), Utc::now(), "fallback");

		target
			.insert_document("ceramic_records", &document)
			.await
			.unwrap();
		target
			.insert_document("ceramic_records", &document)
			.await
			.unwrap();

		let contents =
			std::fs::read_to_string(target.collection_path("ceramic_records")).unwrap();
		let lines = contents.lines().collect::<Vec<_>>();
		assert_eq!(lines.len(), 2);
		assert_eq!(
			serde_json::from_str::<MetadataDocument>(lines[0]).unwrap(),
			document
		);
	}

	#[tokio::test]
	async fn escaping_keys_are_rejected() {
		let remote = tempdir().unwrap();
		let target = DirectoryTarget::new(remote.path());
		let media = MediaReference::new("/does/not/matter.jpg");

		for key in ["../outside.jpg", "/abs.jpg", ""] {
			assert!(matches!(
				target.put_object(key, &media).await,
				Err(RemoteError::Rejected(_))
			));
		}
	}

	#[tokio::test]
	async fn missing_media_is_an_io_failure() {
		let remote = tempdir().unwrap();
		let target = DirectoryTarget::new(remote.path());

		let res = target
			.put_object("ceramic-images/x.jpg", &MediaReference::new("/nope/x.jpg"))
			.await;

		assert!(matches!(res, Err(RemoteError::FileIO(_))));
	}
}
