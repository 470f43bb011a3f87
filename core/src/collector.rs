use crate::{
	error::{Error, PersistenceError, ValidationError},
	persistence::{self, Key, KeyValueStore},
};

use kiln_utils::tail_chars;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MAX_NAME_CHARS: usize = 10;

/// Who is collecting; attached verbatim to every record, never verified here
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorIdentity {
	pub name: String,
	pub avatar: Option<String>,
}

#[derive(Debug)]
pub struct CollectorProfile {
	db: Arc<dyn KeyValueStore>,
	identity: Mutex<CollectorIdentity>,
}

impl CollectorProfile {
	/// Loads the stored identity, persisting a generated name the first time
	pub fn load_or_init(db: Arc<dyn KeyValueStore>) -> Result<Self, PersistenceError> {
		let name = match persistence::load::<String>(&*db, Key::CollectorName)?
			.filter(|name| !name.trim().is_empty())
		{
			Some(name) => name,
			None => {
				let name = default_name(Utc::now());
				db.set(Key::CollectorName, serde_json::to_value(&name)?)?;
				info!(%name, "No collector name set, using a generated one;");
				name
			}
		};

		let avatar = persistence::load::<Option<String>>(&*db, Key::CollectorAvatar)?.flatten();

		Ok(Self {
			db,
			identity: Mutex::new(CollectorIdentity { name, avatar }),
		})
	}

	#[must_use]
	pub fn identity(&self) -> CollectorIdentity {
		self.lock().clone()
	}

	pub fn set_name(&self, name: &str) -> Result<(), Error> {
		let name = name.trim();
		if name.is_empty() {
			return Err(ValidationError::EmptyCollectorName.into());
		}
		if name.chars().count() > MAX_NAME_CHARS {
			return Err(ValidationError::CollectorNameTooLong {
				max: MAX_NAME_CHARS,
			}
			.into());
		}

		let mut identity = self.lock();
		self.db
			.set(Key::CollectorName, serde_json::Value::from(name))?;
		identity.name = name.to_owned();

		Ok(())
	}

	pub fn set_avatar(&self, avatar: Option<String>) -> Result<(), PersistenceError> {
		let avatar = avatar.filter(|avatar| !avatar.trim().is_empty());

		let mut identity = self.lock();
		self.db
			.set(Key::CollectorAvatar, serde_json::to_value(&avatar)?)?;
		identity.avatar = avatar;

		Ok(())
	}

	fn lock(&self) -> MutexGuard<'_, CollectorIdentity> {
		self.identity.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// `Collector` followed by the last six digits of the epoch milliseconds
#[must_use]
pub fn default_name(now: DateTime<Utc>) -> String {
	let millis = now.timestamp_millis().to_string();

	format!("Collector{}", tail_chars(&millis, 6))
}
