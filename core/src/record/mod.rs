//! Defect observation records and their admission rules.

use crate::{collector::CollectorIdentity, error::ValidationError};

use std::{collections::BTreeSet, fmt, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};
use uuid::Uuid;

mod legacy;

/// Opaque record identifier, ordered by creation for newly captured records
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
	#[must_use]
	pub fn generate() -> Self {
		Self(Uuid::now_v7().to_string())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for RecordId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for RecordId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, EnumIter,
)]
#[serde(from = "String", into = "&'static str")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
	Normal,
	Repairable,
	Discard,
	/// Legacy records captured before severity existed
	#[default]
	Unclassified,
}

impl Severity {
	/// Accepts canonical names and the legacy labels; anything else is unclassified
	#[must_use]
	pub fn from_label(label: &str) -> Self {
		match label.trim().to_lowercase().as_str() {
			"normal" | "正常" => Self::Normal,
			"repairable" | "可补瓷" => Self::Repairable,
			"discard" | "需丢弃" => Self::Discard,
			_ => Self::Unclassified,
		}
	}

	#[must_use]
	pub fn as_str(self) -> &'static str {
		self.into()
	}

	#[must_use]
	pub const fn legacy_label(self) -> &'static str {
		match self {
			Self::Normal => "正常",
			Self::Repairable => "可补瓷",
			Self::Discard => "需丢弃",
			Self::Unclassified => "未分类",
		}
	}

	/// Display rank, higher is worse
	#[must_use]
	pub const fn rank(self) -> u8 {
		match self {
			Self::Discard => 3,
			Self::Repairable => 2,
			Self::Normal => 1,
			Self::Unclassified => 0,
		}
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<String> for Severity {
	fn from(label: String) -> Self {
		Self::from_label(&label)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DefectType {
	Crack,
	Bubble,
	Deformation,
	Scratch,
	Stain,
	MissingGlaze,
	/// Label written by an older client that we don't know about
	Other(String),
}

#[derive(thiserror::Error, Debug)]
#[error("not a defect label: '{0}'")]
pub struct NotADefect(String);

impl DefectType {
	pub const KNOWN: [Self; 6] = [
		Self::Crack,
		Self::Bubble,
		Self::Deformation,
		Self::Scratch,
		Self::Stain,
		Self::MissingGlaze,
	];

	/// `None` for blank labels and for "normal", which older clients stored as a defect type
	#[must_use]
	pub fn parse(label: &str) -> Option<Self> {
		let trimmed = label.trim();

		let defect = match trimmed.to_lowercase().as_str() {
			"" | "normal" | "正常" => return None,
			"crack" | "裂纹" => Self::Crack,
			"bubble" | "气泡" => Self::Bubble,
			"deformation" | "变形" => Self::Deformation,
			"scratch" | "划痕" => Self::Scratch,
			"stain" | "污渍" => Self::Stain,
			"missing_glaze" | "缺釉" => Self::MissingGlaze,
			_ => Self::Other(trimmed.to_owned()),
		};

		Some(defect)
	}

	#[must_use]
	pub fn label(&self) -> &str {
		match self {
			Self::Crack => "crack",
			Self::Bubble => "bubble",
			Self::Deformation => "deformation",
			Self::Scratch => "scratch",
			Self::Stain => "stain",
			Self::MissingGlaze => "missing_glaze",
			Self::Other(label) => label,
		}
	}

	#[must_use]
	pub const fn legacy_label(&self) -> Option<&'static str> {
		match self {
			Self::Crack => Some("裂纹"),
			Self::Bubble => Some("气泡"),
			Self::Deformation => Some("变形"),
			Self::Scratch => Some("划痕"),
			Self::Stain => Some("污渍"),
			Self::MissingGlaze => Some("缺釉"),
			Self::Other(_) => None,
		}
	}
}

impl fmt::Display for DefectType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl TryFrom<String> for DefectType {
	type Error = NotADefect;

	fn try_from(label: String) -> Result<Self, Self::Error> {
		Self::parse(&label).ok_or(NotADefect(label))
	}
}

impl From<DefectType> for String {
	fn from(defect: DefectType) -> Self {
		match defect {
			DefectType::Other(label) => label,
			known => known.label().to_owned(),
		}
	}
}

/// Handle to media stored on the device; the file itself is owned elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
	#[must_use]
	pub fn new(reference: impl Into<String>) -> Self {
		Self(reference.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	#[must_use]
	pub fn as_path(&self) -> &Path {
		Path::new(&self.0)
	}

	#[must_use]
	pub fn extension(&self) -> Option<&str> {
		self.as_path()
			.extension()
			.and_then(|ext| ext.to_str())
			.filter(|ext| !ext.is_empty())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub latitude: f64,
	pub longitude: f64,
}

/// One inspected item's defect observation. Immutable once admitted to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
	pub id: RecordId,
	#[serde(
		default,
		alias = "imagePath",
		deserialize_with = "legacy::media_reference",
		skip_serializing_if = "Option::is_none"
	)]
	pub media_reference: Option<MediaReference>,
	#[serde(default, deserialize_with = "legacy::severity")]
	pub severity: Severity,
	#[serde(default, alias = "defectType", deserialize_with = "legacy::defect_types")]
	pub defect_types: BTreeSet<DefectType>,
	pub create_time: DateTime<Utc>,
	#[serde(default, deserialize_with = "legacy::collector")]
	pub collector: String,
	#[serde(
		default,
		deserialize_with = "legacy::optional_text",
		skip_serializing_if = "Option::is_none"
	)]
	pub collector_avatar: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location: Option<GeoPoint>,
}

impl Record {
	/// Admission rules for new records; legacy records are never re-checked
	pub fn validate(&self) -> Result<(), ValidationError> {
		validate_classification(self.severity, &self.defect_types)
	}

	#[must_use]
	pub fn has_defect(&self, defect: &DefectType) -> bool {
		self.defect_types.contains(defect)
	}
}

fn validate_classification(
	severity: Severity,
	defect_types: &BTreeSet<DefectType>,
) -> Result<(), ValidationError> {
	match severity {
		Severity::Unclassified => Err(ValidationError::Unclassified),
		Severity::Normal if !defect_types.is_empty() => Err(ValidationError::NormalWithDefects),
		Severity::Repairable | Severity::Discard if defect_types.is_empty() => {
			Err(ValidationError::MissingDefects(severity))
		}
		_ => Ok(()),
	}
}

/// What the capture workflow hands over before the record gets an id and timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
	pub media_reference: Option<MediaReference>,
	pub severity: Severity,
	pub defect_types: BTreeSet<DefectType>,
	pub location: Option<GeoPoint>,
}

impl RecordDraft {
	#[must_use]
	pub fn new(severity: Severity, defect_types: impl IntoIterator<Item = DefectType>) -> Self {
		Self {
			severity,
			defect_types: defect_types.into_iter().collect(),
			..Default::default()
		}
	}

	#[must_use]
	pub fn with_media(mut self, media: MediaReference) -> Self {
		self.media_reference = Some(media);
		self
	}

	#[must_use]
	pub const fn with_location(mut self, location: GeoPoint) -> Self {
		self.location = Some(location);
		self
	}

	pub fn validate(&self) -> Result<(), ValidationError> {
		validate_classification(self.severity, &self.defect_types)
	}

	pub fn into_record(
		self,
		id: RecordId,
		create_time: DateTime<Utc>,
		collector: &CollectorIdentity,
	) -> Result<Record, ValidationError> {
		self.validate()?;

		Ok(Record {
			id,
			media_reference: self.media_reference,
			severity: self.severity,
			defect_types: self.defect_types,
			create_time,
			collector: collector.name.clone(),
			collector_avatar: collector.avatar.clone(),
			location: self.location,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;
	use serde_json::json;

	fn identity() -> CollectorIdentity {
		CollectorIdentity {
			name: "inspector".to_string(),
			avatar: None,
		}
	}

	#[test]
	fn normal_draft_rejects_defects() {
		let draft = RecordDraft::new(Severity::Normal, [DefectType::Crack]);

		assert_eq!(draft.validate(), Err(ValidationError::NormalWithDefects));
	}

	#[test]
	fn defective_draft_needs_labels() {
		for severity in [Severity::Repairable, Severity::Discard] {
			assert_eq!(
				RecordDraft::new(severity, []).validate(),
				Err(ValidationError::MissingDefects(severity))
			);
		}

		assert_eq!(
			RecordDraft::new(Severity::Unclassified, []).validate(),
			Err(ValidationError::Unclassified)
		);
	}

	#[test]
	fn draft_becomes_record_with_collector() {
		let now = Utc::now();
		let record = RecordDraft::new(Severity::Discard, [DefectType::Stain, DefectType::Crack])
			.with_media(MediaReference::new("/data/ceramic_1.jpg"))
			.into_record(RecordId::from("r1"), now, &identity())
			.unwrap();

		assert_eq!(record.collector, "inspector");
		assert_eq!(record.create_time, now);
		assert_eq!(
			record.defect_types.iter().collect::<Vec<_>>(),
			vec![&DefectType::Crack, &DefectType::Stain]
		);
		assert_eq!(
			record.media_reference.as_ref().and_then(MediaReference::extension),
			Some("jpg")
		);
	}

	#[test]
	fn canonical_record_survives_serialization() {
		let record = RecordDraft::new(Severity::Repairable, [DefectType::MissingGlaze])
			.with_location(GeoPoint {
				latitude: 29.27,
				longitude: 117.17,
			})
			.into_record(RecordId::generate(), Utc::now(), &identity())
			.unwrap();

		let value = serde_json::to_value(&record).unwrap();
		assert_eq!(value["severity"], json!("repairable"));
		assert_eq!(value["defectTypes"], json!(["missing_glaze"]));

		let back: Record = serde_json::from_value(value).unwrap();
		assert_eq!(back, record);
	}

	#[test]
	fn severity_labels() {
		assert_eq!(Severity::from_label("可补瓷"), Severity::Repairable);
		assert_eq!(Severity::from_label(" Discard "), Severity::Discard);
		assert_eq!(Severity::from_label("whatever"), Severity::Unclassified);
		assert!(Severity::Discard.rank() > Severity::Repairable.rank());
		assert!(Severity::Normal.rank() > Severity::Unclassified.rank());
	}
}
