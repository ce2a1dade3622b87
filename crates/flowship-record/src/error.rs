use thiserror::Error;

/// Errors that can occur when storing or reading deployment records.
#[derive(Debug, Error)]
pub enum RecordError {
  #[error("deployment record not found: {id}")]
  NotFound { id: String },

  /// Records are never overwritten.
  #[error("deployment record already exists: {id}")]
  AlreadyExists { id: String },

  #[error("invalid deployment record id: '{id}'")]
  InvalidId { id: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid deployment record: {0}")]
  Serialization(#[from] serde_json::Error),
}
