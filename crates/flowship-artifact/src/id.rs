use chrono::{DateTime, Utc};
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Second-resolution UTC timestamp used as a prefix for tags, keys and ids.
pub fn timestamp_prefix(at: DateTime<Utc>) -> String {
  at.format(TIMESTAMP_FORMAT).to_string()
}

/// [`timestamp_prefix`] for the current second.
pub fn current_timestamp() -> String {
  timestamp_prefix(Utc::now())
}

/// A fresh identifier of the form `<UTC %Y%m%d%H%M%S>-<uuid v4>`.
///
/// Sorts by creation second; the uuid keeps ids from the same second apart.
pub fn unique_id() -> String {
  unique_id_at(Utc::now())
}

pub fn unique_id_at(at: DateTime<Utc>) -> String {
  format!("{}-{}", timestamp_prefix(at), Uuid::new_v4())
}
