//! Application configuration

use super::{default_data_dir, ConfigError, Migrate};
use crate::sync::{SyncSettings, DEFAULT_COLLECTION, DEFAULT_OBJECT_PREFIX, DEFAULT_REMOTE_TIMEOUT};

use kiln_utils::error::FileIOError;

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "kiln.json";
const STORE_FILE_NAME: &str = "store.json";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Logging level, any `EnvFilter` directive
	pub log_level: String,

	#[serde(default)]
	pub sync: SyncConfig,
}

/// Where and how records are uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
	pub object_prefix: String,

	pub collection: String,

	/// Per remote call; `None` or 0 disables the limit
	pub remote_timeout_secs: Option<u64>,

	/// Directory the CLI syncs into (relative to data_dir unless absolute)
	pub remote_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			object_prefix: DEFAULT_OBJECT_PREFIX.to_string(),
			collection: DEFAULT_COLLECTION.to_string(),
			remote_timeout_secs: Some(DEFAULT_REMOTE_TIMEOUT.as_secs()),
			remote_dir: None,
		}
	}
}

impl SyncConfig {
	#[must_use]
	pub fn settings(&self, fallback_collector: impl Into<String>) -> SyncSettings {
		SyncSettings {
			object_prefix: self.object_prefix.clone(),
			collection: self.collection.clone(),
			remote_timeout: self
				.remote_timeout_secs
				.filter(|secs| *secs > 0)
				.map(Duration::from_secs),
			fallback_collector: fallback_collector.into(),
		}
	}
}

impl AppConfig {
	/// Load configuration from the default location
	pub fn load() -> Result<Self, ConfigError> {
		Self::load_from(default_data_dir()?)
	}

	/// Load configuration from a specific data directory, creating a default one if absent
	pub fn load_from(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let data_dir = data_dir.as_ref();
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		match fs::read(&config_path) {
			Ok(bytes) => {
				info!(path = %config_path.display(), "Loading config;");
				let mut config = serde_json::from_slice::<Self>(&bytes)?;

				// The directory we were opened from wins over whatever the file says
				config.data_dir = data_dir.to_path_buf();

				if config.needs_migration() {
					info!(
						from = config.version,
						to = Self::target_version(),
						"Migrating config;"
					);
					config.migrate()?;
					config.save()?;
				} else if config.version > Self::target_version() {
					return Err(ConfigError::UnknownVersion(config.version));
				}

				Ok(config)
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				warn!(path = %config_path.display(), "No config found, creating default;");
				let config = Self::default_with_dir(data_dir.to_path_buf());
				config.save()?;
				Ok(config)
			}
			Err(e) => Err(FileIOError::from((&config_path, e, "Failed to read config")).into()),
		}
	}

	/// Create default configuration with specific data directory
	#[must_use]
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			sync: SyncConfig::default(),
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<(), ConfigError> {
		fs::create_dir_all(&self.data_dir)
			.map_err(|e| FileIOError::from((&self.data_dir, e, "Failed to create data directory")))?;

		let config_path = self.config_path();
		fs::write(&config_path, serde_json::to_vec_pretty(self)?)
			.map_err(|e| FileIOError::from((&config_path, e, "Failed to write config")))?;

		info!(path = %config_path.display(), "Saved config;");

		Ok(())
	}

	#[must_use]
	pub fn config_path(&self) -> PathBuf {
		self.data_dir.join(CONFIG_FILE_NAME)
	}

	/// The single durable document holding records, the upload ledger and the collector
	#[must_use]
	pub fn store_path(&self) -> PathBuf {
		self.data_dir.join(STORE_FILE_NAME)
	}

	/// Get the path for logs directory
	#[must_use]
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	#[must_use]
	pub fn remote_dir(&self) -> PathBuf {
		self.sync
			.remote_dir
			.as_ref()
			.map_or_else(|| self.data_dir.join("remote"), |dir| self.data_dir.join(dir))
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		2
	}

	fn migrate(&mut self) -> Result<(), ConfigError> {
		match self.version {
			0 => {
				self.version = 1;
				self.migrate()
			}
			1 => {
				// v1 had no sync section, serde already filled in the defaults
				self.sync = SyncConfig::default();
				self.version = 2;
				Ok(())
			}
			2 => Ok(()),
			v => Err(ConfigError::UnknownVersion(v)),
		}
	}
}
