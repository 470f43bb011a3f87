use crate::{config::AppConfig, error::Error};

use kiln_utils::error::FileIOError;

use std::fs;

use tracing_appender::{
	non_blocking::WorkerGuard,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
	filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Installs the global subscriber: console output on stderr filtered by `RUST_LOG` (or the
/// configured level) and a daily rolling file under `<data_dir>/logs` at debug.
///
/// Keep the returned guard alive for as long as logs should be flushed to the file.
pub fn init_logger(config: &AppConfig) -> Result<WorkerGuard, Error> {
	let logs_dir = config.logs_dir();
	fs::create_dir_all(&logs_dir)
		.map_err(|e| FileIOError::from((&logs_dir, e, "Failed to create logs directory")))?;

	let (non_blocking, guard) =
		tracing_appender::non_blocking(RollingFileAppender::new(Rotation::DAILY, logs_dir, "kiln.log"));

	let console_filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.log_level))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::registry()
		.with(
			fmt::layer()
				.with_writer(std::io::stderr)
				.with_filter(console_filter),
		)
		.with(
			fmt::layer()
				.with_writer(non_blocking)
				.with_ansi(false)
				.with_filter(LevelFilter::DEBUG),
		)
		.try_init()?;

	Ok(guard)
}
