//! Flowship Credentials
//!
//! A named key-value store for backend credential sets. Settings captured
//! while configuring a publication are saved under a well-known name
//! (`docker-storage`, `s3-storage`, ...) and loaded again by publishers and
//! resolvers.
//!
//! Writes are atomic with respect to concurrent readers: a reader observes
//! either the previous credential set or the new one, never a mix.

mod error;
mod fs;
mod memory;

pub use error::CredentialError;
pub use fs::FsCredentialRegistry;
pub use memory::InMemoryCredentialRegistry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An opaque credential set.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialBlob {
  /// What the blob describes (e.g. `registry`, `object_store`).
  pub kind: String,
  pub data: serde_json::Value,
}

impl CredentialBlob {
  /// Serialize typed settings into a blob.
  pub fn encode<T: Serialize>(kind: impl Into<String>, value: &T) -> Result<Self, CredentialError> {
    Ok(Self {
      kind: kind.into(),
      data: serde_json::to_value(value)?,
    })
  }

  /// Deserialize the blob back into typed settings.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CredentialError> {
    Ok(serde_json::from_value(self.data.clone())?)
  }
}

impl fmt::Debug for CredentialBlob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CredentialBlob")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

/// Registry of named credential sets.
#[async_trait]
pub trait CredentialRegistry: Send + Sync {
  /// Save a credential set under `name`.
  ///
  /// With `overwrite` the previous set is replaced as a whole; without it an
  /// existing set makes the call fail with [`CredentialError::AlreadyExists`].
  async fn save(
    &self,
    name: &str,
    blob: CredentialBlob,
    overwrite: bool,
  ) -> Result<(), CredentialError>;

  /// Load the credential set saved under `name`.
  async fn load(&self, name: &str) -> Result<Arc<CredentialBlob>, CredentialError>;

  /// Names of all saved credential sets, sorted.
  async fn list(&self) -> Result<Vec<String>, CredentialError>;
}

/// Names become file names, so keep them to `[A-Za-z0-9._-]`.
pub(crate) fn validate_name(name: &str) -> Result<(), CredentialError> {
  let valid = !name.is_empty()
    && !name.starts_with('.')
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
  if valid {
    Ok(())
  } else {
    Err(CredentialError::InvalidName {
      name: name.to_string(),
    })
  }
}
