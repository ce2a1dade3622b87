use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use tracing::debug;

use crate::client::{BUCKET_ALREADY_OWNED, ObjectClient};
use crate::error::ClientError;

/// In-process object storage, one `object_store` memory store per bucket.
///
/// Used for development and tests; share one instance between publisher and
/// resolver so both see the same buckets.
#[derive(Debug, Default)]
pub struct NativeClient {
  buckets: RwLock<HashMap<String, Arc<InMemory>>>,
}

impl NativeClient {
  pub fn new() -> Self {
    Self::default()
  }

  fn bucket(&self, bucket: &str) -> Result<Arc<InMemory>, ClientError> {
    let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
    buckets
      .get(bucket)
      .cloned()
      .ok_or_else(|| ClientError::Service {
        status: 404,
        code: "NoSuchBucket".to_string(),
        message: format!("the bucket {} does not exist", bucket),
      })
  }
}

#[async_trait]
impl ObjectClient for NativeClient {
  async fn make_bucket(&self, bucket: &str) -> Result<(), ClientError> {
    let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
    if buckets.contains_key(bucket) {
      return Err(ClientError::Service {
        status: 409,
        code: BUCKET_ALREADY_OWNED.to_string(),
        message: format!("bucket {} already exists and is owned by you", bucket),
      });
    }
    buckets.insert(bucket.to_string(), Arc::new(InMemory::new()));
    debug!(bucket = %bucket, "bucket created");
    Ok(())
  }

  async fn put_object(
    &self,
    bucket: &str,
    key: &str,
    body: Bytes,
    _content_type: &str,
  ) -> Result<(), ClientError> {
    let store = self.bucket(bucket)?;
    store.put(&ObjectPath::from(key), body.into()).await?;
    Ok(())
  }

  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
    let store = self.bucket(bucket)?;
    let result = match store.get(&ObjectPath::from(key)).await {
      Ok(result) => result,
      Err(object_store::Error::NotFound { .. }) => {
        return Err(ClientError::NotFound {
          bucket: bucket.to_string(),
          key: key.to_string(),
        });
      }
      Err(e) => return Err(e.into()),
    };
    Ok(result.bytes().await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_make_bucket_twice_reports_already_owned() {
    let client = NativeClient::new();
    client.make_bucket("flows").await.unwrap();
    let err = client.make_bucket("flows").await.unwrap_err();
    assert_eq!(err.code(), Some(BUCKET_ALREADY_OWNED));
  }

  #[tokio::test]
  async fn test_put_get() {
    let client = NativeClient::new();
    client.make_bucket("flows").await.unwrap();
    client
      .put_object(
        "flows",
        "20240501090807/weather.tar",
        Bytes::from_static(b"blob"),
        "application/x-tar",
      )
      .await
      .unwrap();

    let body = client
      .get_object("flows", "20240501090807/weather.tar")
      .await
      .unwrap();
    assert_eq!(body, Bytes::from_static(b"blob"));
  }

  #[tokio::test]
  async fn test_missing_bucket_and_key() {
    let client = NativeClient::new();
    let err = client
      .put_object("nope", "k", Bytes::new(), "application/x-tar")
      .await
      .unwrap_err();
    assert_eq!(err.code(), Some("NoSuchBucket"));

    client.make_bucket("flows").await.unwrap();
    let err = client.get_object("flows", "missing").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));
  }
}
