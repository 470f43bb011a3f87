use anyhow::Result;
use clap::Subcommand;
use kiln_core::CollectorIdentity;

use crate::{context::Context, print_output};

#[derive(Subcommand, Debug)]
pub enum CollectorCmd {
	/// Show the identity attached to new records
	Show,
	/// Set the collector name (at most 10 characters)
	Name { name: String },
	/// Set the avatar reference, omit to clear it
	Avatar { reference: Option<String> },
}

pub fn run(ctx: &Context, cmd: CollectorCmd) -> Result<()> {
	let profile = ctx.library.collector();

	match cmd {
		CollectorCmd::Show => {}
		CollectorCmd::Name { name } => profile.set_name(&name)?,
		CollectorCmd::Avatar { reference } => profile.set_avatar(reference)?,
	}

	print_output!(ctx, &profile.identity(), |identity: &CollectorIdentity| {
		println!("Collector: {}", identity.name);
		println!(
			"Avatar:    {}",
			identity.avatar.as_deref().unwrap_or("-")
		);
	});

	Ok(())
}
