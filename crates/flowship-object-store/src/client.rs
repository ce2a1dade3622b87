use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ClientError;

/// S3 error code for creating a bucket the caller already owns.
pub const BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";

/// Minimal bucket/object operations needed to publish and fetch blobs.
#[async_trait]
pub trait ObjectClient: Send + Sync {
  /// Create `bucket`. Fails with code [`BUCKET_ALREADY_OWNED`] if it exists.
  async fn make_bucket(&self, bucket: &str) -> Result<(), ClientError>;

  async fn put_object(
    &self,
    bucket: &str,
    key: &str,
    body: Bytes,
    content_type: &str,
  ) -> Result<(), ClientError>;

  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError>;
}
