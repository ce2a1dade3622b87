use std::sync::Arc;

use bytes::Bytes;
use flowship_artifact::current_timestamp;
use flowship_config::{BackendKind, ObjectStoreConfig, ObjectTransport};
use flowship_credentials::{CredentialBlob, CredentialRegistry};
use flowship_events::{PublicationEvent, PublishContext};
use tracing::{info, instrument, warn};

use crate::client::{BUCKET_ALREADY_OWNED, ObjectClient};
use crate::error::ObjectStoreError;
use crate::native::NativeClient;
use crate::signed::SignedHttpClient;

/// Content type of uploaded bundle archives.
const BLOB_CONTENT_TYPE: &str = "application/x-tar";

/// Where an uploaded blob lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
  pub bucket: String,
  pub key: String,
}

/// Uploads workload blobs to S3-compatible storage.
#[derive(Clone)]
pub struct ObjectStorePublisher {
  credentials: Arc<dyn CredentialRegistry>,
  native: Arc<NativeClient>,
  http: reqwest::Client,
}

impl ObjectStorePublisher {
  pub fn new(credentials: Arc<dyn CredentialRegistry>) -> Self {
    Self {
      credentials,
      native: Arc::new(NativeClient::new()),
      http: reqwest::Client::new(),
    }
  }

  /// Use a shared in-process store for `native` transport configurations.
  pub fn with_native(mut self, native: Arc<NativeClient>) -> Self {
    self.native = native;
    self
  }

  /// The client for a configuration's transport.
  pub fn client(&self, config: &ObjectStoreConfig) -> Arc<dyn ObjectClient> {
    match config.transport {
      ObjectTransport::Native => self.native.clone() as Arc<dyn ObjectClient>,
      ObjectTransport::Signed => Arc::new(SignedHttpClient::with_http(config, self.http.clone())),
    }
  }

  /// Ensure the bucket, upload the blob as `<workload>-<uuid>.tar` and save
  /// the `s3-storage` credential set.
  #[instrument(name = "object_store_publish", skip_all, fields(bucket = %config.bucket, workload = %workload))]
  pub async fn publish(
    &self,
    blob: Bytes,
    workload: &str,
    config: &ObjectStoreConfig,
    ctx: &PublishContext,
  ) -> Result<ObjectLocation, ObjectStoreError> {
    self.ensure_bucket(config, &config.bucket, ctx).await?;

    let name = format!("{}-{}.tar", workload, uuid::Uuid::new_v4());
    let location = self
      .upload(config, &config.bucket, &name, blob, BLOB_CONTENT_TYPE, ctx)
      .await?;

    let storage_block = BackendKind::ObjectStore.storage_block();
    let credentials = CredentialBlob::encode(BackendKind::ObjectStore.as_str(), config)?;
    self
      .credentials
      .save(storage_block, credentials, true)
      .await?;
    ctx.emit(PublicationEvent::CredentialsSaved {
      name: storage_block.to_string(),
    });

    Ok(location)
  }

  /// Create `bucket` unless the caller already owns it.
  ///
  /// Returns whether the bucket was newly created.
  pub async fn ensure_bucket(
    &self,
    config: &ObjectStoreConfig,
    bucket: &str,
    ctx: &PublishContext,
  ) -> Result<bool, ObjectStoreError> {
    let client = self.client(config);
    let created = match ctx.guard("make_bucket", client.make_bucket(bucket)).await? {
      Ok(()) => true,
      Err(e) if e.code() == Some(BUCKET_ALREADY_OWNED) => false,
      Err(e) => {
        warn!(bucket = %bucket, error = %e, "bucket creation failed");
        return Err(ObjectStoreError::Bucket {
          bucket: bucket.to_string(),
          source: e,
        });
      }
    };

    info!(bucket = %bucket, created, "bucket ready");
    ctx.emit(PublicationEvent::BucketReady {
      bucket: bucket.to_string(),
      created,
    });
    Ok(created)
  }

  /// Upload `body` under `<UTC %Y%m%d%H%M%S>/<name>`.
  pub async fn upload(
    &self,
    config: &ObjectStoreConfig,
    bucket: &str,
    name: &str,
    body: Bytes,
    content_type: &str,
    ctx: &PublishContext,
  ) -> Result<ObjectLocation, ObjectStoreError> {
    let key = format!("{}/{}", current_timestamp(), name);
    let size = body.len();
    let client = self.client(config);

    ctx
      .guard(
        "put_object",
        client.put_object(bucket, &key, body, content_type),
      )
      .await?
      .map_err(|source| ObjectStoreError::Upload {
        bucket: bucket.to_string(),
        key: key.clone(),
        source,
      })?;

    info!(bucket = %bucket, key = %key, size, "object uploaded");
    ctx.emit(PublicationEvent::Uploaded {
      bucket: bucket.to_string(),
      key: key.clone(),
      size,
    });

    Ok(ObjectLocation {
      bucket: bucket.to_string(),
      key,
    })
  }

  /// Fetch a previously uploaded object.
  pub async fn retrieve(
    &self,
    config: &ObjectStoreConfig,
    bucket: &str,
    key: &str,
    ctx: &PublishContext,
  ) -> Result<Bytes, ObjectStoreError> {
    let client = self.client(config);
    ctx
      .guard("get_object", client.get_object(bucket, key))
      .await?
      .map_err(|source| ObjectStoreError::Download {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source,
      })
  }
}
