use super::ConfigError;

/// Versioned on-disk configuration that can be brought up to the current schema
pub trait Migrate {
	fn current_version(&self) -> u32;

	fn target_version() -> u32;

	/// Applies every step from the current version up to [`Migrate::target_version`]
	fn migrate(&mut self) -> Result<(), ConfigError>;

	fn needs_migration(&self) -> bool {
		self.current_version() < Self::target_version()
	}
}
