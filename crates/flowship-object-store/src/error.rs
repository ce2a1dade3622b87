use flowship_credentials::CredentialError;
use flowship_events::Interrupt;
use flowship_signer::SignError;
use thiserror::Error;

/// Errors returned by an [`ObjectClient`](crate::ObjectClient).
#[derive(Debug, Error)]
pub enum ClientError {
  /// The service rejected the request with an S3 error document.
  #[error("{code} ({status}): {message}")]
  Service {
    status: u16,
    code: String,
    message: String,
  },

  #[error("no such object: {bucket}/{key}")]
  NotFound { bucket: String, key: String },

  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("signing failed: {0}")]
  Sign(#[from] SignError),

  #[error("object store error: {0}")]
  Store(#[from] object_store::Error),
}

impl ClientError {
  /// The S3 error code, when the service sent one.
  pub fn code(&self) -> Option<&str> {
    match self {
      Self::Service { code, .. } => Some(code),
      Self::NotFound { .. } => Some("NoSuchKey"),
      _ => None,
    }
  }
}

/// Errors that can occur while publishing to or reading from object storage.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
  #[error("failed to create bucket {bucket}: {source}")]
  Bucket {
    bucket: String,
    #[source]
    source: ClientError,
  },

  #[error("failed to upload {bucket}/{key}: {source}")]
  Upload {
    bucket: String,
    key: String,
    #[source]
    source: ClientError,
  },

  #[error("failed to download {bucket}/{key}: {source}")]
  Download {
    bucket: String,
    key: String,
    #[source]
    source: ClientError,
  },

  #[error(transparent)]
  Interrupted(#[from] Interrupt),

  #[error("failed to save object store credentials: {0}")]
  Credentials(#[from] CredentialError),
}
