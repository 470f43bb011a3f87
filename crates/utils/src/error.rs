use std::{fmt::Display, io, path::Path};

use thiserror::Error;

/// File I/O error that includes the path that caused the error
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
	pub maybe_context: Option<&'static str>,
}

impl Display for FileIOError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"file I/O error{}: {}; path: '{}'",
			self.maybe_context
				.map(|ctx| format!(" ({ctx})"))
				.unwrap_or_default(),
			self.source,
			self.path.display()
		)
	}
}

impl FileIOError {
	/// Whether the underlying I/O error means the file simply isn't there
	#[must_use]
	pub fn is_not_found(&self) -> bool {
		self.source.kind() == io::ErrorKind::NotFound
	}
}

impl<P: AsRef<Path>> From<(P, io::Error)> for FileIOError {
	fn from((path, source): (P, io::Error)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}
}

impl<P: AsRef<Path>> From<(P, io::Error, &'static str)> for FileIOError {
	fn from((path, source, context): (P, io::Error, &'static str)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(context),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_carries_context_and_path() {
		let err = FileIOError::from((
			"/tmp/kiln/store.json",
			io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
			"Failed to replace store file",
		));

		assert_eq!(
			err.to_string(),
			"file I/O error (Failed to replace store file): denied; path: '/tmp/kiln/store.json'"
		);
		assert!(!err.is_not_found());
	}

	#[test]
	fn not_found_is_detected() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("missing.json");

		let err = FileIOError::from((
			&missing,
			std::fs::read(&missing).unwrap_err(),
		));

		assert!(err.is_not_found());
		assert!(err.to_string().starts_with("file I/O error: "));
	}
}
