use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secret::Secret;

/// The distribution backend a workload is published through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
  /// Copy the bundle into a directory shared with the workers.
  Local(LocalConfig),
  /// Bake the bundle into a container image and push it to a registry.
  Registry(RegistryConfig),
  /// Upload the bundle as a blob to S3-compatible object storage.
  ObjectStore(ObjectStoreConfig),
}

/// Discriminant of [`BackendConfig`], carried by records and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
  Local,
  Registry,
  ObjectStore,
}

impl BackendKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Local => "local",
      Self::Registry => "registry",
      Self::ObjectStore => "object_store",
    }
  }

  /// Name of the credential set a backend's settings are saved under.
  pub fn storage_block(&self) -> &'static str {
    match self {
      Self::Local => "local-storage",
      Self::Registry => "docker-storage",
      Self::ObjectStore => "s3-storage",
    }
  }
}

impl fmt::Display for BackendKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
  /// Directory the staged bundles are copied into (e.g. `/flows`).
  pub base_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
  /// Registry host, optionally with a port (e.g. `registry.example.com:5000`).
  pub registry_url: String,
  pub username: String,
  pub secret: Secret,
  /// Base image, relative to the registry (e.g. `weather/base:latest`).
  pub image_base_tag: String,
  /// Repository the flow images are pushed to. Derived from the base image
  /// namespace when absent (`weather/base:latest` -> `weather/flow`).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_repository: Option<String>,
  #[serde(default = "default_scheme")]
  pub scheme: String,
}

fn default_scheme() -> String {
  "https".to_string()
}

impl RegistryConfig {
  /// Fully qualified base image reference.
  pub fn base_image(&self) -> String {
    format!("{}/{}", self.registry_url, self.image_base_tag)
  }

  /// Repository path (without registry host) that flow images are pushed to.
  pub fn repository(&self) -> String {
    if let Some(repo) = &self.image_repository {
      return repo.clone();
    }
    let without_tag = strip_tag(&self.image_base_tag);
    match without_tag.rfind('/') {
      Some(idx) => format!("{}/flow", &without_tag[..idx]),
      None => "flow".to_string(),
    }
  }

  /// Registry address including scheme, as expected by registry auth.
  pub fn server_address(&self) -> String {
    format!("{}://{}", self.scheme, self.registry_url)
  }
}

/// Strip a trailing `:tag` from an image reference, leaving `host:port`
/// prefixes intact.
fn strip_tag(reference: &str) -> &str {
  match (reference.rfind(':'), reference.rfind('/')) {
    (Some(colon), Some(slash)) if colon > slash => &reference[..colon],
    (Some(colon), None) => &reference[..colon],
    _ => reference,
  }
}

/// How the object store is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectTransport {
  /// Plain HTTP requests authenticated with a manually computed signature.
  #[default]
  Signed,
  /// An in-process object-store client.
  Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
  /// Storage host, optionally with a port (e.g. `minio:9000`).
  pub endpoint: String,
  pub access_key: String,
  pub secret_key: Secret,
  #[serde(default)]
  pub use_tls: bool,
  pub bucket: String,
  #[serde(default)]
  pub transport: ObjectTransport,
}

impl ObjectStoreConfig {
  pub fn scheme(&self) -> &'static str {
    if self.use_tls { "https" } else { "http" }
  }

  /// Base URL of the storage endpoint, e.g. `http://minio:9000`.
  pub fn base_url(&self) -> String {
    format!("{}://{}", self.scheme(), self.endpoint)
  }
}

impl BackendConfig {
  pub fn kind(&self) -> BackendKind {
    match self {
      Self::Local(_) => BackendKind::Local,
      Self::Registry(_) => BackendKind::Registry,
      Self::ObjectStore(_) => BackendKind::ObjectStore,
    }
  }

  /// Check that every field the active variant needs is present.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let kind = self.kind();
    let require = |value: &str, field: &'static str| {
      if value.trim().is_empty() {
        Err(ConfigError::MissingField {
          backend: kind,
          field,
        })
      } else {
        Ok(())
      }
    };
    let require_secret = |secret: &Secret, field: &'static str| {
      if secret.is_empty() {
        Err(ConfigError::MissingField {
          backend: kind,
          field,
        })
      } else {
        Ok(())
      }
    };

    match self {
      Self::Local(config) => {
        require(&config.base_path.to_string_lossy(), "base_path")?;
      }
      Self::Registry(config) => {
        require(&config.registry_url, "registry_url")?;
        require(&config.username, "username")?;
        require_secret(&config.secret, "secret")?;
        require(&config.image_base_tag, "image_base_tag")?;
        if config.registry_url.contains("://") {
          return Err(ConfigError::InvalidField {
            field: "registry_url",
            message: "expected a host without scheme; use `scheme` instead".to_string(),
          });
        }
        if let Some(repo) = &config.image_repository {
          require(repo, "image_repository")?;
        }
      }
      Self::ObjectStore(config) => {
        require(&config.endpoint, "endpoint")?;
        require(&config.access_key, "access_key")?;
        require_secret(&config.secret_key, "secret_key")?;
        require(&config.bucket, "bucket")?;
        if config.endpoint.contains("://") {
          return Err(ConfigError::InvalidField {
            field: "endpoint",
            message: "expected a host without scheme; use `use_tls` instead".to_string(),
          });
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn registry() -> RegistryConfig {
    RegistryConfig {
      registry_url: "registry.example.com".to_string(),
      username: "ci".to_string(),
      secret: Secret::new("pw"),
      image_base_tag: "weather/base:latest".to_string(),
      image_repository: None,
      scheme: default_scheme(),
    }
  }

  #[test]
  fn test_repository_derived_from_base_namespace() {
    assert_eq!(registry().repository(), "weather/flow");
    assert_eq!(
      registry().base_image(),
      "registry.example.com/weather/base:latest"
    );
  }

  #[test]
  fn test_repository_without_namespace() {
    let mut config = registry();
    config.image_base_tag = "base:latest".to_string();
    assert_eq!(config.repository(), "flow");
  }

  #[test]
  fn test_explicit_repository_wins() {
    let mut config = registry();
    config.image_repository = Some("team/custom".to_string());
    assert_eq!(config.repository(), "team/custom");
  }

  #[test]
  fn test_strip_tag_keeps_port() {
    assert_eq!(strip_tag("host:5000/weather/base"), "host:5000/weather/base");
    assert_eq!(strip_tag("host:5000/weather/base:1.0"), "host:5000/weather/base");
    assert_eq!(strip_tag("base:latest"), "base");
  }

  #[test]
  fn test_validate_reports_missing_field() {
    let mut config = registry();
    config.secret = Secret::new("");
    let err = BackendConfig::Registry(config).validate().unwrap_err();
    assert!(matches!(
      err,
      ConfigError::MissingField {
        backend: BackendKind::Registry,
        field: "secret"
      }
    ));
  }

  #[test]
  fn test_validate_rejects_blank_secret_key() {
    let config = BackendConfig::ObjectStore(ObjectStoreConfig {
      endpoint: "minio:9000".to_string(),
      access_key: "key".to_string(),
      secret_key: Secret::new("   "),
      use_tls: false,
      bucket: "flows".to_string(),
      transport: ObjectTransport::Signed,
    });
    assert!(matches!(
      config.validate(),
      Err(ConfigError::MissingField {
        backend: BackendKind::ObjectStore,
        field: "secret_key"
      })
    ));
  }

  #[test]
  fn test_validate_rejects_scheme_in_endpoint() {
    let config = BackendConfig::ObjectStore(ObjectStoreConfig {
      endpoint: "http://minio:9000".to_string(),
      access_key: "key".to_string(),
      secret_key: Secret::new("secret"),
      use_tls: false,
      bucket: "flows".to_string(),
      transport: ObjectTransport::Signed,
    });
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidField {
        field: "endpoint",
        ..
      })
    ));
  }

  #[test]
  fn test_deserialize_tagged_variant() {
    let json = r#"{
      "kind": "object_store",
      "endpoint": "minio:9000",
      "access_key": "key",
      "secret_key": "secret",
      "bucket": "flows"
    }"#;
    let config: BackendConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.kind(), BackendKind::ObjectStore);
    let BackendConfig::ObjectStore(store) = &config else {
      panic!("expected object store config");
    };
    assert_eq!(store.transport, ObjectTransport::Signed);
    assert_eq!(store.base_url(), "http://minio:9000");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_local_requires_base_path() {
    let config = BackendConfig::Local(LocalConfig {
      base_path: PathBuf::new(),
    });
    assert!(matches!(
      config.validate(),
      Err(ConfigError::MissingField {
        field: "base_path",
        ..
      })
    ));
  }
}
