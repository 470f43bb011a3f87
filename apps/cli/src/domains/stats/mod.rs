use anyhow::Result;
use kiln_core::{statistics::Category, Statistics};

use crate::{context::Context, print_output};

pub fn run(ctx: &Context) -> Result<()> {
	let stats = ctx.library.statistics();

	print_output!(ctx, &stats, |s: &Statistics| {
		println!("Total:    {}", s.total_count);
		println!("Today:    {}", s.today_count);
		println!("Local:    {}", s.local_count);
		println!("Uploaded: {}", s.cloud_count);
		println!();
		for entry in &s.categories {
			let name = match &entry.category {
				Category::Normal => "normal".to_string(),
				Category::Defect(defect) => defect.to_string(),
			};
			println!("{name:<16} {:>5} {:>4}%", entry.count, entry.percentage);
		}
		println!();
		for entry in &s.severities {
			println!(
				"{:<16} {:>5} {:>4}%",
				entry.severity.to_string(),
				entry.count,
				entry.percentage
			);
		}
	});

	Ok(())
}
