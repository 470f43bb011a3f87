//! Display-side filtering and ordering over a record snapshot. Nothing here touches storage.

use crate::record::{DefectType, Record, Severity};

use std::cmp::Reverse;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordFilter {
	#[default]
	All,
	Defect(DefectType),
	Severity(Severity),
	/// Case-insensitive substring over defect labels, canonical and legacy alike
	Text(String),
}

impl RecordFilter {
	#[must_use]
	pub fn matches(&self, record: &Record) -> bool {
		match self {
			Self::All => true,
			Self::Defect(defect) => record.has_defect(defect),
			Self::Severity(severity) => record.severity == *severity,
			Self::Text(text) => {
				let needle = text.trim().to_lowercase();
				needle.is_empty()
					|| record.defect_types.iter().any(|defect| {
						defect.label().to_lowercase().contains(&needle)
							|| defect
								.legacy_label()
								.is_some_and(|label| label.contains(&needle))
					})
			}
		}
	}
}

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
	/// Newest first by capture time
	#[default]
	TimeDesc,
	TimeAsc,
	/// Worst first: discard, repairable, normal, unclassified
	Severity,
}

/// Filters then sorts. Sorts are stable, so ties keep the snapshot's order.
#[must_use]
pub fn query<'snapshot>(
	snapshot: &'snapshot [Record],
	filter: &RecordFilter,
	sort: SortOrder,
) -> Vec<&'snapshot Record> {
	let mut matched = snapshot
		.iter()
		.filter(|record| filter.matches(record))
		.collect::<Vec<_>>();

	match sort {
		SortOrder::TimeDesc => matched.sort_by_key(|record| Reverse(record.create_time)),
		SortOrder::TimeAsc => matched.sort_by_key(|record| record.create_time),
		SortOrder::Severity => matched.sort_by_key(|record| Reverse(record.severity.rank())),
	}

	matched
}

/// Short relative age for list views; older than a day falls back to the local date
#[must_use]
pub fn describe_age(create_time: DateTime<Utc>, now: DateTime<Utc>) -> String {
	describe_age_in(create_time, now, &Local)
}

#[must_use]
pub fn describe_age_in<Tz: TimeZone>(
	create_time: DateTime<Utc>,
	now: DateTime<Utc>,
	tz: &Tz,
) -> String
where
	Tz::Offset: std::fmt::Display,
{
	let elapsed = now - create_time;

	if elapsed.num_seconds() < 60 {
		"just now".to_string()
	} else if elapsed.num_minutes() < 60 {
		format!("{} min ago", elapsed.num_minutes())
	} else if elapsed.num_hours() < 24 {
		format!("{} h ago", elapsed.num_hours())
	} else {
		create_time
			.with_timezone(tz)
			.format("%m-%d %H:%M")
			.to_string()
	}
}
