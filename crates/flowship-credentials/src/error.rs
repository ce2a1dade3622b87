use thiserror::Error;

/// Errors that can occur when saving or loading credential sets.
#[derive(Debug, Error)]
pub enum CredentialError {
  /// No credential set is saved under this name.
  #[error("credential set not found: {name}")]
  NotFound { name: String },

  /// A credential set exists and overwriting was not requested.
  #[error("credential set already exists: {name}")]
  AlreadyExists { name: String },

  /// The name cannot be used as a storage key.
  #[error("invalid credential set name: '{name}'")]
  InvalidName { name: String },

  /// IO error when reading/writing credential files.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The stored blob could not be (de)serialized.
  #[error("invalid credential blob: {0}")]
  Serialization(#[from] serde_json::Error),
}
