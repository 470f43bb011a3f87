use kiln_core::Library;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
	Human,
	Json,
}

pub struct Context {
	pub library: Library,
	pub format: OutputFormat,
}

impl Context {
	pub const fn new(library: Library, format: OutputFormat) -> Self {
		Self { library, format }
	}
}
