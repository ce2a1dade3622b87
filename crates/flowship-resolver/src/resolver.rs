use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use flowship_artifact::{Artifact, unpack_archive};
use flowship_config::{BackendKind, ObjectStoreConfig, RegistryConfig};
use flowship_credentials::{CredentialError, CredentialRegistry};
use flowship_events::PublishContext;
use flowship_object_store::{NativeClient, ObjectStorePublisher};
use flowship_record::DeploymentRecord;
use flowship_registry::{ContainerTransport, DockerTransport, ImageReference, RegistryPublisher};
use tracing::{debug, info, instrument};

use crate::error::ResolveError;

/// A workload ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedWorkload {
  /// The bundle lives in this directory.
  Directory { path: PathBuf },
  /// The image is present in the local container engine.
  Image { reference: ImageReference },
}

/// Resolver turns a deployment record back into a runnable workload.
#[async_trait]
pub trait Resolver: Send + Sync {
  /// Resolve `record`.
  ///
  /// Object store artifacts are unpacked into `dest`; the other backends
  /// leave it untouched.
  async fn resolve(
    &self,
    record: &DeploymentRecord,
    dest: &Path,
    ctx: &PublishContext,
  ) -> Result<ResolvedWorkload, ResolveError>;
}

/// Standard resolver that fetches artifacts with the same clients the
/// publishers used, authenticated by the credential set named in the record.
pub struct StandardResolver {
  credentials: Arc<dyn CredentialRegistry>,
  registry: RegistryPublisher,
  object_store: ObjectStorePublisher,
}

impl StandardResolver {
  /// Create a resolver pulling images through the local Docker daemon.
  pub fn new(credentials: Arc<dyn CredentialRegistry>) -> Self {
    Self::with_transport(credentials, Arc::new(DockerTransport::default()))
  }

  pub fn with_transport(
    credentials: Arc<dyn CredentialRegistry>,
    transport: Arc<dyn ContainerTransport>,
  ) -> Self {
    Self {
      registry: RegistryPublisher::new(transport, credentials.clone()),
      object_store: ObjectStorePublisher::new(credentials.clone()),
      credentials,
    }
  }

  /// In-process store used for records published with `native` transport.
  pub fn with_native(mut self, native: Arc<NativeClient>) -> Self {
    self.object_store = self.object_store.with_native(native);
    self
  }

  async fn load_settings<T: DeserializeOwned>(&self, name: &str) -> Result<T, ResolveError> {
    let credentials = |source: CredentialError| ResolveError::Credentials {
      name: name.to_string(),
      source,
    };
    let blob = self.credentials.load(name).await.map_err(credentials)?;
    blob.decode().map_err(credentials)
  }

  fn mismatch(record: &DeploymentRecord) -> ResolveError {
    ResolveError::LocationMismatch {
      id: record.id.clone(),
      backend: record.backend,
      location: record.location.to_string(),
    }
  }
}

#[async_trait]
impl Resolver for StandardResolver {
  #[instrument(
    name = "resolve",
    skip_all,
    fields(id = %record.id, backend = %record.backend)
  )]
  async fn resolve(
    &self,
    record: &DeploymentRecord,
    dest: &Path,
    ctx: &PublishContext,
  ) -> Result<ResolvedWorkload, ResolveError> {
    let resolved = match (record.backend, &record.location) {
      (BackendKind::Local, Artifact::Directory { path }) => {
        let is_dir = tokio::fs::metadata(path)
          .await
          .map(|m| m.is_dir())
          .unwrap_or(false);
        if !is_dir {
          return Err(ResolveError::MissingDirectory { path: path.clone() });
        }
        ResolvedWorkload::Directory { path: path.clone() }
      }
      (BackendKind::Registry, Artifact::Image { reference }) => {
        let config: RegistryConfig = self.load_settings(&record.storage_block).await?;
        let image = ImageReference::parse(reference)?;
        self.registry.pull(&image, &config, ctx).await?;
        ResolvedWorkload::Image { reference: image }
      }
      (BackendKind::ObjectStore, Artifact::Object { bucket, key }) => {
        let config: ObjectStoreConfig = self.load_settings(&record.storage_block).await?;
        let blob = self.object_store.retrieve(&config, bucket, key, ctx).await?;
        debug!(bucket = %bucket, key = %key, size = blob.len(), "blob fetched");
        unpack_archive(blob, dest)
          .await
          .map_err(|source| ResolveError::Unpack {
            path: dest.to_path_buf(),
            source,
          })?;
        ResolvedWorkload::Directory {
          path: dest.to_path_buf(),
        }
      }
      _ => return Err(Self::mismatch(record)),
    };

    info!(workload = %record.workload, "record resolved");
    Ok(resolved)
  }
}
