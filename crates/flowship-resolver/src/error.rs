use std::path::PathBuf;

use flowship_config::BackendKind;
use flowship_credentials::CredentialError;
use flowship_object_store::ObjectStoreError;
use flowship_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while resolving a deployment record.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A local record points at a directory that is gone.
  #[error("artifact directory not found: {}", .path.display())]
  MissingDirectory { path: PathBuf },

  /// The record's location does not belong to its backend.
  #[error("record {id}: {backend} backend cannot resolve location '{location}'")]
  LocationMismatch {
    id: String,
    backend: BackendKind,
    location: String,
  },

  /// The credential set named by the record could not be loaded.
  #[error("credential set '{name}': {source}")]
  Credentials {
    name: String,
    #[source]
    source: CredentialError,
  },

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  ObjectStore(#[from] ObjectStoreError),

  /// The fetched blob could not be unpacked.
  #[error("failed to unpack into {}: {source}", .path.display())]
  Unpack {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
