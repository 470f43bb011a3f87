use anyhow::Result;
use clap::Args;
use kiln_core::sync::{DirectoryTarget, SyncEvent, SyncReport, SyncRun};
use serde_json::{json, Value};

use std::{path::PathBuf, sync::Arc};

use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::{
	context::{Context, OutputFormat},
	print_output,
};

#[derive(Args, Debug)]
pub struct SyncArgs {
	/// Directory to upload into, overrides the configured one
	#[arg(long)]
	pub remote_dir: Option<PathBuf>,
}

pub async fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
	let remote_dir = args
		.remote_dir
		.unwrap_or_else(|| ctx.library.config().remote_dir());
	debug!(remote_dir = %remote_dir.display(), "Syncing into directory;");

	let engine = ctx
		.library
		.sync_engine(Arc::new(DirectoryTarget::new(remote_dir)));

	let progress = matches!(ctx.format, OutputFormat::Human).then(|| {
		let mut events = engine.subscribe();
		tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(SyncEvent::Started { pending }) if pending > 0 => {
						println!("Uploading {pending} record(s)...");
					}
					Ok(SyncEvent::RecordUploaded { record_id }) => println!("  ok     {record_id}"),
					Ok(SyncEvent::RecordFailed(failure)) => println!(
						"  failed {} ({}): {}",
						failure.record_id, failure.stage, failure.message
					),
					Ok(SyncEvent::Finished(_)) | Err(RecvError::Closed) => break,
					Ok(SyncEvent::Started { .. }) | Err(RecvError::Lagged(_)) => {}
				}
			}
		})
	});

	let run = engine.run().await;

	// The engine owns the sender, dropping it closes the progress stream
	drop(engine);
	if let Some(progress) = progress {
		progress.await?;
	}

	match run? {
		SyncRun::Rejected => {
			print_output!(ctx, &rejected_output(), |_: &Value| {
				println!("A sync is already running");
			});
		}
		SyncRun::Finished(report) => {
			print_output!(ctx, &report, |r: &SyncReport| {
				println!(
					"Sync {}: {} uploaded, {} failed, {} still pending",
					r.state, r.success_count, r.fail_count, r.pending_remaining
				);
			});
		}
	}

	Ok(())
}

/// JSON emitted when another run already holds the store
fn rejected_output() -> Value {
	json!({ "state": "rejected", "rejected": true })
}
