use thiserror::Error;

use crate::backend::BackendKind;

/// Errors raised while loading or validating a publication configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A field required by the selected backend is empty.
  #[error("{backend} backend requires a non-empty `{field}`")]
  MissingField {
    backend: BackendKind,
    field: &'static str,
  },

  /// A field is present but has an unusable value.
  #[error("invalid `{field}`: {message}")]
  InvalidField { field: &'static str, message: String },

  /// The workload definition is unusable.
  #[error("invalid workload: {message}")]
  InvalidWorkload { message: String },

  /// Failed to parse a publication file.
  #[error("invalid publication definition: {0}")]
  Parse(#[from] serde_json::Error),
}
