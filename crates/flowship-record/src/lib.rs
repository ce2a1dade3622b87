//! Flowship Record
//!
//! A [`DeploymentRecord`] is what a publication leaves behind: which workload
//! was published, through which backend, and where the artifact can be
//! found. Records are immutable. Publishing again creates a new record with a
//! new id.
//!
//! The [`RecordStore`] trait persists records:
//! - [`FsRecordStore`] writes one JSON file per record id,
//! - [`InMemoryRecordStore`] keeps them in process.

mod error;
mod fs;
mod memory;
mod record;

pub use error::RecordError;
pub use fs::FsRecordStore;
pub use memory::InMemoryRecordStore;
pub use record::DeploymentRecord;

use async_trait::async_trait;

/// Storage for deployment records. Records can be added and read, never
/// changed.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Persist a new record. Fails if a record with the same id exists.
  async fn create(&self, record: &DeploymentRecord) -> Result<(), RecordError>;

  /// Get a record by id.
  async fn get(&self, id: &str) -> Result<DeploymentRecord, RecordError>;

  /// All records, oldest first.
  async fn list(&self) -> Result<Vec<DeploymentRecord>, RecordError>;

  /// Records for one workload, oldest first.
  async fn list_for_workload(&self, workload: &str) -> Result<Vec<DeploymentRecord>, RecordError> {
    let mut records = self.list().await?;
    records.retain(|record| record.workload == workload);
    Ok(records)
  }
}

/// Ids become file names, so keep them to `[A-Za-z0-9_-]`.
pub(crate) fn validate_id(id: &str) -> Result<(), RecordError> {
  let valid = !id.is_empty()
    && id
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
  if valid {
    Ok(())
  } else {
    Err(RecordError::InvalidId { id: id.to_string() })
  }
}
