#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Offline-first store for ceramic defect records and the engine that reconciles it with
//! a remote.

pub mod collector;
pub mod config;
pub mod error;
pub mod ledger;
pub mod library;
pub mod logging;
pub mod persistence;
pub mod query;
pub mod record;
pub mod statistics;
pub mod store;
pub mod sync;

pub use collector::{CollectorIdentity, CollectorProfile};
pub use config::AppConfig;
pub use error::{Error, PersistenceError, ValidationError};
pub use ledger::UploadLedger;
pub use library::Library;
pub use record::{DefectType, GeoPoint, MediaReference, Record, RecordDraft, RecordId, Severity};
pub use statistics::Statistics;
pub use store::RecordStore;
pub use sync::{SyncEngine, SyncReport, SyncRun, SyncState};
