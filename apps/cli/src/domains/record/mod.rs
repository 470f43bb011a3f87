mod args;

use anyhow::{bail, Result};
use clap::Subcommand;
use kiln_core::{query::describe_age, Record};

use chrono::Utc;

use crate::{context::Context, print_output};

use self::args::{CollectArgs, ListArgs, RecordIdArgs};

#[derive(Subcommand, Debug)]
pub enum RecordCmd {
	/// Capture a new defect record
	Collect(CollectArgs),
	/// List records, newest first by default
	List(ListArgs),
	/// Show a single record
	Show(RecordIdArgs),
	/// Delete a record and forget its upload state
	Delete(RecordIdArgs),
}

pub fn run(ctx: &Context, cmd: RecordCmd) -> Result<()> {
	match cmd {
		RecordCmd::Collect(args) => {
			let record = ctx.library.capture(args.into_draft()?)?;

			print_output!(ctx, &record, |r: &Record| {
				println!("Captured record {} ({})", r.id, r.severity);
			});
		}
		RecordCmd::List(args) => {
			let records = ctx.library.query(&args.filter(), args.sort.into());

			print_output!(ctx, &records, |records: &Vec<Record>| {
				if records.is_empty() {
					println!("No records found");
				}

				let now = Utc::now();
				for record in records {
					let uploaded = ctx.library.store().ledger().contains(&record.id);
					println!(
						"- {} {:<12} {:<30} {:>12} {}",
						record.id,
						record.severity,
						labels(record),
						describe_age(record.create_time, now),
						if uploaded { "uploaded" } else { "local" },
					);
				}
			});
		}
		RecordCmd::Show(args) => {
			let Some(record) = ctx.library.store().get(&args.record_id()) else {
				bail!("Record '{}' not found", args.id);
			};

			print_output!(ctx, &record, |r: &Record| {
				println!("id:         {}", r.id);
				println!("severity:   {}", r.severity);
				println!("defects:    {}", labels(r));
				println!("captured:   {}", r.create_time.to_rfc3339());
				println!("collector:  {}", r.collector);
				if let Some(media) = &r.media_reference {
					println!("media:      {}", media.as_str());
				}
				if let Some(location) = &r.location {
					println!("location:   {}, {}", location.latitude, location.longitude);
				}
				println!(
					"uploaded:   {}",
					ctx.library.store().ledger().contains(&r.id)
				);
			});
		}
		RecordCmd::Delete(args) => {
			let deleted = ctx.library.delete(&args.record_id())?;
			if !deleted {
				bail!("Record '{}' not found", args.id);
			}

			print_output!(ctx, &serde_json::json!({ "deleted": args.id }), |_| {
				println!("Deleted record {}", args.id);
			});
		}
	}

	Ok(())
}

fn labels(record: &Record) -> String {
	if record.defect_types.is_empty() {
		return "-".to_string();
	}

	record
		.defect_types
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}
