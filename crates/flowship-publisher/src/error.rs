use std::path::PathBuf;

use flowship_artifact::PackagingError;
use flowship_config::{BackendKind, ConfigError};
use flowship_credentials::CredentialError;
use flowship_events::Interrupt;
use flowship_object_store::ObjectStoreError;
use flowship_record::RecordError;
use flowship_registry::RegistryError;
use thiserror::Error;

/// Why a publication failed.
///
/// Every variant names the backend kind and the operation that failed.
#[derive(Debug, Error)]
pub enum PublishError {
  #[error("[{backend}] {operation}: invalid configuration: {source}")]
  Configuration {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: ConfigError,
  },

  #[error("[{backend}] {operation}: packaging failed: {source}")]
  Packaging {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: PackagingError,
  },

  #[error("[{backend}] {operation}: {source}")]
  Build {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: RegistryError,
  },

  #[error("[{backend}] {operation}: {source}")]
  Push {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: RegistryError,
  },

  #[error("[{backend}] {operation}: {source}")]
  Bucket {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: ObjectStoreError,
  },

  #[error("[{backend}] {operation}: {source}")]
  Upload {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: ObjectStoreError,
  },

  /// Fetching a published artifact back failed.
  #[error("[{backend}] {operation}: {message}")]
  Download {
    backend: BackendKind,
    operation: &'static str,
    message: String,
  },

  /// Copying into or out of a local artifact directory failed.
  #[error("[{backend}] {operation}: {}: {source}", .path.display())]
  Storage {
    backend: BackendKind,
    operation: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("[{backend}] {operation} exceeded the publication deadline")]
  Timeout {
    backend: BackendKind,
    operation: &'static str,
  },

  #[error("[{backend}] {operation} was cancelled")]
  Cancelled {
    backend: BackendKind,
    operation: &'static str,
  },

  #[error("[{backend}] {operation}: credential registry: {source}")]
  Credentials {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: CredentialError,
  },

  #[error("[{backend}] {operation}: record store: {source}")]
  Record {
    backend: BackendKind,
    operation: &'static str,
    #[source]
    source: RecordError,
  },
}

impl PublishError {
  pub fn backend(&self) -> BackendKind {
    match self {
      Self::Configuration { backend, .. }
      | Self::Packaging { backend, .. }
      | Self::Build { backend, .. }
      | Self::Push { backend, .. }
      | Self::Bucket { backend, .. }
      | Self::Upload { backend, .. }
      | Self::Download { backend, .. }
      | Self::Storage { backend, .. }
      | Self::Timeout { backend, .. }
      | Self::Cancelled { backend, .. }
      | Self::Credentials { backend, .. }
      | Self::Record { backend, .. } => *backend,
    }
  }

  pub fn operation(&self) -> &'static str {
    match self {
      Self::Configuration { operation, .. }
      | Self::Packaging { operation, .. }
      | Self::Build { operation, .. }
      | Self::Push { operation, .. }
      | Self::Bucket { operation, .. }
      | Self::Upload { operation, .. }
      | Self::Download { operation, .. }
      | Self::Storage { operation, .. }
      | Self::Timeout { operation, .. }
      | Self::Cancelled { operation, .. }
      | Self::Credentials { operation, .. }
      | Self::Record { operation, .. } => operation,
    }
  }

  pub fn interrupted(backend: BackendKind, interrupt: Interrupt) -> Self {
    match interrupt {
      Interrupt::Timeout { operation } => Self::Timeout { backend, operation },
      Interrupt::Cancelled { operation } => Self::Cancelled { backend, operation },
    }
  }

  /// Classify a registry failure.
  pub fn from_registry(error: RegistryError) -> Self {
    let backend = BackendKind::Registry;
    match error {
      RegistryError::Build { .. } => Self::Build {
        backend,
        operation: "build",
        source: error,
      },
      RegistryError::Push { .. } => Self::Push {
        backend,
        operation: "push",
        source: error,
      },
      RegistryError::Pull { .. } | RegistryError::InvalidReference { .. } => Self::Download {
        backend,
        operation: "pull",
        message: error.to_string(),
      },
      RegistryError::Interrupted(interrupt) => Self::interrupted(backend, interrupt),
      RegistryError::Credentials(source) => Self::Credentials {
        backend,
        operation: "save_credentials",
        source,
      },
    }
  }

  /// Classify an object storage failure.
  pub fn from_object_store(error: ObjectStoreError) -> Self {
    let backend = BackendKind::ObjectStore;
    match error {
      ObjectStoreError::Bucket { .. } => Self::Bucket {
        backend,
        operation: "make_bucket",
        source: error,
      },
      ObjectStoreError::Upload { .. } => Self::Upload {
        backend,
        operation: "put_object",
        source: error,
      },
      ObjectStoreError::Download { .. } => Self::Download {
        backend,
        operation: "get_object",
        message: error.to_string(),
      },
      ObjectStoreError::Interrupted(interrupt) => Self::interrupted(backend, interrupt),
      ObjectStoreError::Credentials(source) => Self::Credentials {
        backend,
        operation: "save_credentials",
        source,
      },
    }
  }
}
