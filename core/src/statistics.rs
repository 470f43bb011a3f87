use crate::record::{DefectType, Record, RecordId, Severity};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;
use strum::IntoEnumIterator;

/// A statistics bucket: records classified normal, or records carrying a given defect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum Category {
	Normal,
	Defect(DefectType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
	pub category: Category,
	pub count: usize,
	pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCount {
	pub severity: Severity,
	pub count: usize,
	pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
	pub total_count: usize,
	pub today_count: usize,
	/// Records not yet confirmed remote
	pub local_count: usize,
	pub cloud_count: usize,
	/// Normal first, then every known defect (zeros included), then unknown legacy labels
	pub categories: Vec<CategoryCount>,
	pub severities: Vec<SeverityCount>,
}

impl Statistics {
	/// Counts against the local calendar day
	#[must_use]
	pub fn compute(records: &[Record], uploaded: &BTreeSet<RecordId>, today: NaiveDate) -> Self {
		Self::compute_in(records, uploaded, today, &Local)
	}

	#[must_use]
	pub fn today(records: &[Record], uploaded: &BTreeSet<RecordId>) -> Self {
		Self::compute(records, uploaded, Local::now().date_naive())
	}

	/// `today` is interpreted in `tz`, which is also where each record's day is taken from
	#[must_use]
	pub fn compute_in<Tz: TimeZone>(
		records: &[Record],
		uploaded: &BTreeSet<RecordId>,
		today: NaiveDate,
		tz: &Tz,
	) -> Self {
		let total_count = records.len();

		let today_count = records
			.iter()
			.filter(|record| record.create_time.with_timezone(tz).date_naive() == today)
			.count();

		let local_count = records
			.iter()
			.filter(|record| !uploaded.contains(&record.id))
			.count();

		let mut categories = Vec::with_capacity(DefectType::KNOWN.len() + 1);

		categories.push(CategoryCount::new(
			Category::Normal,
			records
				.iter()
				.filter(|record| record.severity == Severity::Normal)
				.count(),
			total_count,
		));

		categories.extend(DefectType::KNOWN.into_iter().map(|defect| {
			let count = records
				.iter()
				.filter(|record| record.has_defect(&defect))
				.count();

			CategoryCount::new(Category::Defect(defect), count, total_count)
		}));

		let mut others = BTreeMap::<DefectType, usize>::new();
		for defect in records.iter().flat_map(|record| &record.defect_types) {
			if matches!(defect, DefectType::Other(_)) {
				*others.entry(defect.clone()).or_default() += 1;
			}
		}
		categories.extend(
			others
				.into_iter()
				.map(|(defect, count)| CategoryCount::new(Category::Defect(defect), count, total_count)),
		);

		let severities = Severity::iter()
			.map(|severity| {
				let count = records
					.iter()
					.filter(|record| record.severity == severity)
					.count();

				SeverityCount {
					severity,
					count,
					percentage: percentage(count, total_count),
				}
			})
			.collect();

		Self {
			total_count,
			today_count,
			local_count,
			cloud_count: uploaded.len(),
			categories,
			severities,
		}
	}

	#[must_use]
	pub fn category(&self, category: &Category) -> Option<&CategoryCount> {
		self.categories
			.iter()
			.find(|entry| &entry.category == category)
	}

	#[must_use]
	pub fn severity(&self, severity: Severity) -> Option<&SeverityCount> {
		self.severities
			.iter()
			.find(|entry| entry.severity == severity)
	}
}

impl CategoryCount {
	fn new(category: Category, count: usize, total: usize) -> Self {
		Self {
			category,
			count,
			percentage: percentage(count, total),
		}
	}
}

/// `round(count / total * 100)`, half away from zero, 0 when there is nothing to count
#[must_use]
#[allow(
	clippy::cast_precision_loss,
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss
)]
pub fn percentage(count: usize, total: usize) -> u32 {
	if total == 0 {
		return 0;
	}

	// count <= total, so the result is within 0..=100
	(count as f64 / total as f64 * 100.0).round() as u32
}
