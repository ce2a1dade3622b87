use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use flowship_config::{ObjectStoreConfig, Secret};
use flowship_signer::{Clock, RequestSigner, SystemClock};
use reqwest::{Client, Method, Response};
use tracing::debug;

use crate::client::ObjectClient;
use crate::error::ClientError;

/// Object storage over plain HTTP with hand-signed requests.
///
/// Every call signs a new request right before sending it, so a signature
/// is never reused across methods or retries.
pub struct SignedHttpClient {
  http: Client,
  base_url: String,
  host: String,
  access_key: String,
  secret_key: Secret,
  clock: Arc<dyn Clock>,
}

impl SignedHttpClient {
  pub fn new(config: &ObjectStoreConfig) -> Self {
    Self::with_http(config, Client::new())
  }

  /// Reuse an existing HTTP client (and its connection pool).
  pub fn with_http(config: &ObjectStoreConfig, http: Client) -> Self {
    Self {
      http,
      base_url: config.base_url(),
      host: config.endpoint.clone(),
      access_key: config.access_key.clone(),
      secret_key: config.secret_key.clone(),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  fn signer(&self, content_type: &str) -> RequestSigner {
    RequestSigner::new(&self.access_key, self.secret_key.expose())
      .with_clock(self.clock.clone())
      .with_content_type(content_type)
  }

  async fn send(
    &self,
    method: Method,
    resource_path: &str,
    content_type: &str,
    body: Option<Bytes>,
  ) -> Result<Response, ClientError> {
    let signer = self.signer(content_type);
    let signed = signer.sign_request(method.as_str(), &self.host, resource_path)?;
    signer.ensure_fresh(&signed)?;

    let url = format!("{}{}", self.base_url, resource_path);
    let mut request = self.http.request(method.clone(), &url);
    for (name, value) in signed.headers() {
      request = request.header(*name, value);
    }
    if let Some(body) = body {
      request = request.body(body);
    }

    debug!(method = %method, url = %url, "signed request");

    let response = request.send().await?;
    if response.status().is_success() {
      return Ok(response);
    }

    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    Err(service_error(status, &text))
  }
}

impl fmt::Debug for SignedHttpClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SignedHttpClient")
      .field("base_url", &self.base_url)
      .field("access_key", &self.access_key)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl ObjectClient for SignedHttpClient {
  async fn make_bucket(&self, bucket: &str) -> Result<(), ClientError> {
    let resource = format!("/{}", bucket);
    self
      .send(
        Method::PUT,
        &resource,
        flowship_signer::DEFAULT_CONTENT_TYPE,
        None,
      )
      .await?;
    Ok(())
  }

  async fn put_object(
    &self,
    bucket: &str,
    key: &str,
    body: Bytes,
    content_type: &str,
  ) -> Result<(), ClientError> {
    let resource = format!("/{}/{}", bucket, key);
    self
      .send(Method::PUT, &resource, content_type, Some(body))
      .await?;
    Ok(())
  }

  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
    let resource = format!("/{}/{}", bucket, key);
    let result = self
      .send(
        Method::GET,
        &resource,
        flowship_signer::DEFAULT_CONTENT_TYPE,
        None,
      )
      .await;

    let response = match result {
      Err(ClientError::Service { code, .. }) if code == "NoSuchKey" => {
        return Err(ClientError::NotFound {
          bucket: bucket.to_string(),
          key: key.to_string(),
        });
      }
      other => other?,
    };
    Ok(response.bytes().await?)
  }
}

/// Build a service error from an S3 XML error document.
fn service_error(status: u16, body: &str) -> ClientError {
  let code = xml_element(body, "Code")
    .map(str::to_string)
    .unwrap_or_else(|| format!("Http{}", status));
  let message = xml_element(body, "Message")
    .map(str::to_string)
    .unwrap_or_else(|| body.trim().to_string());
  ClientError::Service {
    status,
    code,
    message,
  }
}

fn xml_element<'a>(body: &'a str, name: &str) -> Option<&'a str> {
  let open = format!("<{}>", name);
  let close = format!("</{}>", name);
  let start = body.find(&open)? + open.len();
  let end = body[start..].find(&close)? + start;
  Some(body[start..end].trim())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{DateTime, FixedOffset, TimeDelta};
  use flowship_config::ObjectTransport;
  use std::sync::Mutex;

  /// A clock that jumps forward on every reading.
  struct SteppingClock {
    now: Mutex<DateTime<FixedOffset>>,
    step: TimeDelta,
  }

  impl Clock for SteppingClock {
    fn now(&self) -> DateTime<FixedOffset> {
      let mut now = self.now.lock().unwrap();
      let current = *now;
      *now = current + self.step;
      current
    }
  }

  fn config() -> ObjectStoreConfig {
    ObjectStoreConfig {
      endpoint: "127.0.0.1:1".to_string(),
      access_key: "minio".to_string(),
      secret_key: Secret::new("minio-secret"),
      use_tls: false,
      bucket: "flows".to_string(),
      transport: ObjectTransport::Signed,
    }
  }

  #[test]
  fn test_service_error_parses_s3_document() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>BucketAlreadyOwnedByYou</Code><Message>Your previous request to create the named bucket succeeded and you already own it.</Message><BucketName>flows</BucketName></Error>"#;
    let err = service_error(409, body);
    assert_eq!(err.code(), Some("BucketAlreadyOwnedByYou"));
    assert!(err.to_string().contains("you already own it"));
  }

  #[test]
  fn test_service_error_without_document() {
    let err = service_error(502, "Bad Gateway");
    assert_eq!(err.code(), Some("Http502"));
  }

  #[tokio::test]
  async fn test_stale_signature_is_never_sent() {
    let clock = Arc::new(SteppingClock {
      now: Mutex::new(DateTime::parse_from_rfc3339("2024-05-01T09:00:00+02:00").unwrap()),
      step: TimeDelta::minutes(20),
    });
    let client = SignedHttpClient::new(&config()).with_clock(clock);

    let err = client.make_bucket("flows").await.unwrap_err();
    assert!(matches!(
      err,
      ClientError::Sign(flowship_signer::SignError::Expired { .. })
    ));
  }
}
