use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use flowship_artifact::unique_id;
use flowship_config::RegistryConfig;
use serde::Serialize;

use crate::error::RegistryError;

/// A fully qualified image reference, `registry/repository:tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
  registry: String,
  repository: String,
  tag: String,
}

impl ImageReference {
  pub fn new(
    registry: impl Into<String>,
    repository: impl Into<String>,
    tag: impl Into<String>,
  ) -> Self {
    Self {
      registry: registry.into(),
      repository: repository.into(),
      tag: tag.into(),
    }
  }

  /// A reference in the configured repository with a fresh `<ts>-<uuid>` tag.
  pub fn generate(config: &RegistryConfig) -> Self {
    Self::new(&config.registry_url, config.repository(), unique_id())
  }

  /// Parse `registry/repository:tag`.
  ///
  /// The first path segment is always taken as the registry host, which is
  /// how published references are written.
  pub fn parse(reference: &str) -> Result<Self, RegistryError> {
    let invalid = || RegistryError::InvalidReference {
      reference: reference.to_string(),
    };

    let (registry, rest) = reference.split_once('/').ok_or_else(invalid)?;
    let (repository, tag) = rest.rsplit_once(':').ok_or_else(invalid)?;
    if registry.is_empty() || repository.is_empty() || tag.is_empty() || tag.contains('/') {
      return Err(invalid());
    }

    Ok(Self::new(registry, repository, tag))
  }

  pub fn registry(&self) -> &str {
    &self.registry
  }

  pub fn repository(&self) -> &str {
    &self.repository
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  /// The reference without its tag, as the engine's push endpoint wants it.
  pub fn name(&self) -> String {
    format!("{}/{}", self.registry, self.repository)
  }
}

impl fmt::Display for ImageReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
  }
}

/// Registry login passed to the engine on push and pull.
#[derive(Clone, Serialize)]
pub struct RegistryAuth {
  username: String,
  password: String,
  serveraddress: String,
}

impl RegistryAuth {
  pub fn from_config(config: &RegistryConfig) -> Self {
    Self {
      username: config.username.clone(),
      password: config.secret.expose().to_string(),
      serveraddress: config.server_address(),
    }
  }

  pub fn username(&self) -> &str {
    &self.username
  }

  pub fn server_address(&self) -> &str {
    &self.serveraddress
  }

  /// Value of the `X-Registry-Auth` header: base64url-encoded JSON.
  pub fn header_value(&self) -> Result<String, serde_json::Error> {
    Ok(URL_SAFE.encode(serde_json::to_vec(self)?))
  }
}

impl fmt::Debug for RegistryAuth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistryAuth")
      .field("username", &self.username)
      .field("serveraddress", &self.serveraddress)
      .finish_non_exhaustive()
  }
}
