// Older clients stored `defectType` as either a single label or a list, used `imagePath`
// with an empty string for "no photo", and sometimes left fields out entirely.
// Everything is normalized here so the rest of the crate only sees one shape.

use super::{DefectType, MediaReference, Severity};

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Labels {
	One(String),
	Many(Vec<String>),
}

pub(super) fn defect_types<'de, D>(deserializer: D) -> Result<BTreeSet<DefectType>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Labels>::deserialize(deserializer)?
		.map(|labels| match labels {
			Labels::One(label) => vec![label],
			Labels::Many(labels) => labels,
		})
		.unwrap_or_default()
		.iter()
		.filter_map(|label| DefectType::parse(label))
		.collect())
}

/// A null severity reads the same as a missing one
pub(super) fn severity<'de, D>(deserializer: D) -> Result<Severity, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?
		.map(Severity::from)
		.unwrap_or_default())
}

pub(super) fn media_reference<'de, D>(deserializer: D) -> Result<Option<MediaReference>, D::Error>
where
	D: Deserializer<'de>,
{
	optional_text(deserializer).map(|reference| reference.map(MediaReference))
}

pub(super) fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.filter(|text| !text.trim().is_empty()))
}

pub(super) fn collector<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
