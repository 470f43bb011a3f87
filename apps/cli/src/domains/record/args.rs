use clap::{Args, ValueEnum};
use kiln_core::{
	query::{RecordFilter, SortOrder},
	DefectType, GeoPoint, RecordDraft, RecordId, Severity,
};

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
	Normal,
	Repairable,
	Discard,
}

impl From<SeverityArg> for Severity {
	fn from(arg: SeverityArg) -> Self {
		match arg {
			SeverityArg::Normal => Self::Normal,
			SeverityArg::Repairable => Self::Repairable,
			SeverityArg::Discard => Self::Discard,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
	Newest,
	Oldest,
	Severity,
}

impl From<SortArg> for SortOrder {
	fn from(arg: SortArg) -> Self {
		match arg {
			SortArg::Newest => Self::TimeDesc,
			SortArg::Oldest => Self::TimeAsc,
			SortArg::Severity => Self::Severity,
		}
	}
}

fn parse_defect(label: &str) -> Result<DefectType, String> {
	DefectType::parse(label).ok_or_else(|| format!("'{label}' is not a defect type"))
}

#[derive(Args, Debug)]
pub struct CollectArgs {
	/// Classification of the inspected item
	#[arg(long, value_enum)]
	pub severity: SeverityArg,

	/// Defect type, repeat for several (crack, bubble, deformation, scratch, stain, missing_glaze)
	#[arg(long = "defect", value_parser = parse_defect)]
	pub defects: Vec<DefectType>,

	/// Photo of the item, stored by reference
	#[arg(long)]
	pub media: Option<PathBuf>,

	#[arg(long, requires = "longitude", allow_hyphen_values = true)]
	pub latitude: Option<f64>,

	#[arg(long, requires = "latitude", allow_hyphen_values = true)]
	pub longitude: Option<f64>,
}

impl CollectArgs {
	pub fn into_draft(self) -> anyhow::Result<RecordDraft> {
		let mut draft = RecordDraft::new(self.severity.into(), self.defects);

		if let Some(media) = self.media {
			let media = std::fs::canonicalize(&media).map_err(|e| {
				anyhow::anyhow!("media file '{}' is not readable: {e}", media.display())
			})?;
			draft = draft.with_media(kiln_core::MediaReference::new(media.to_string_lossy()));
		}

		if let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) {
			draft = draft.with_location(GeoPoint {
				latitude,
				longitude,
			});
		}

		Ok(draft)
	}
}

#[derive(Args, Debug)]
pub struct ListArgs {
	/// Only records carrying this defect type
	#[arg(long, value_parser = parse_defect, conflicts_with_all = ["severity", "search"])]
	pub defect: Option<DefectType>,

	#[arg(long, value_enum, conflicts_with = "search")]
	pub severity: Option<SeverityArg>,

	/// Substring match over defect labels
	#[arg(long)]
	pub search: Option<String>,

	#[arg(long, value_enum, default_value = "newest")]
	pub sort: SortArg,
}

impl ListArgs {
	pub fn filter(&self) -> RecordFilter {
		if let Some(defect) = &self.defect {
			RecordFilter::Defect(defect.clone())
		} else if let Some(severity) = self.severity {
			RecordFilter::Severity(severity.into())
		} else if let Some(search) = &self.search {
			RecordFilter::Text(search.clone())
		} else {
			RecordFilter::All
		}
	}
}

#[derive(Args, Debug)]
pub struct RecordIdArgs {
	pub id: String,
}

impl RecordIdArgs {
	pub fn record_id(&self) -> RecordId {
		RecordId::from(self.id.as_str())
	}
}
