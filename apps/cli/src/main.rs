use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_core::{logging::init_logger, AppConfig, Library};

use std::path::PathBuf;

use tracing::debug;

mod context;
mod domains;
mod util;

use crate::{
	context::{Context, OutputFormat},
	domains::{collector::CollectorCmd, record::RecordCmd, sync::SyncArgs},
};

#[derive(Parser, Debug)]
#[command(name = "kiln", about = "Offline-first ceramic defect records")]
struct Cli {
	/// Path to the kiln data directory
	#[arg(long, global = true)]
	data_dir: Option<PathBuf>,

	/// Output format
	#[arg(long, value_enum, default_value = "human", global = true)]
	format: OutputFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	#[command(flatten)]
	Record(RecordCmd),
	/// Record counts and defect breakdown
	Stats,
	/// Upload every record not yet confirmed remote
	Sync(SyncArgs),
	/// Collector identity
	#[command(subcommand)]
	Collector(CollectorCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let data_dir = match cli.data_dir {
		Some(dir) => dir,
		None => kiln_core::config::default_data_dir()?,
	};

	let config = AppConfig::load_from(&data_dir)?;
	let _guard = init_logger(&config)?;

	debug!(data_dir = %data_dir.display(), "Opening library;");

	let ctx = Context::new(Library::open(config)?, cli.format);

	match cli.command {
		Commands::Record(cmd) => domains::record::run(&ctx, cmd)?,
		Commands::Stats => domains::stats::run(&ctx)?,
		Commands::Sync(args) => domains::sync::run(&ctx, args).await?,
		Commands::Collector(cmd) => domains::collector::run(&ctx, cmd)?,
	}

	Ok(())
}
