//! Application configuration management

use kiln_utils::error::FileIOError;

use std::path::PathBuf;

pub mod app_config;
pub mod migration;

pub use app_config::{AppConfig, SyncConfig};
pub use migration::Migrate;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error("could not determine a data directory for this platform")]
	NoDataDir,
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to (de)serialize config: {0}")]
	Serde(#[from] serde_json::Error),
	#[error("unknown config version: {0}")]
	UnknownVersion(u32),
}

/// Platform-specific data directory resolution
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
	#[cfg(any(target_os = "macos", target_os = "windows"))]
	let base = dirs::data_dir();

	#[cfg(not(any(target_os = "macos", target_os = "windows")))]
	let base = dirs::data_local_dir();

	Ok(base.ok_or(ConfigError::NoDataDir)?.join("kiln"))
}
