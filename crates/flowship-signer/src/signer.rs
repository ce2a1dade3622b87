use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, TimeDelta};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use crate::clock::{Clock, SystemClock};

type HmacSha1 = Hmac<Sha1>;

/// Content type signed into every request unless overridden.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// RFC 1123 with a numeric offset, e.g. `Sat, 03 Mar 2018 10:11:16 -0700`.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// S3 rejects requests whose `Date` is more than 15 minutes off.
fn default_skew_tolerance() -> TimeDelta {
  TimeDelta::minutes(15)
}

/// Errors raised while signing or checking a request.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
  /// The secret could not be used as an HMAC key.
  #[error("invalid signing key")]
  InvalidKey,

  /// The request was not sent within the clock-skew tolerance.
  #[error("signature for {method} {resource_path} expired at {expires_at}")]
  Expired {
    method: String,
    resource_path: String,
    expires_at: DateTime<FixedOffset>,
  },

  /// The authorization header is not of the form `AWS <key>:<signature>`.
  #[error("malformed authorization header")]
  MalformedAuthorization,

  /// The request was signed for a different access key.
  #[error("unknown access key '{0}'")]
  UnknownAccessKey(String),

  /// The signature does not cover this method and resource.
  #[error("signature does not match {method} {resource_path}")]
  SignatureMismatch {
    method: String,
    resource_path: String,
  },
}

/// Format a timestamp the way it appears in the `Date` header.
pub fn format_date(timestamp: &DateTime<FixedOffset>) -> String {
  timestamp.format(DATE_FORMAT).to_string()
}

/// Build the string that gets signed.
pub fn canonical_string(method: &str, content_type: &str, date: &str, resource_path: &str) -> String {
  format!("{}\n\n{}\n{}\n{}", method, content_type, date, resource_path)
}

/// Compute the base64 HMAC-SHA1 signature of a request.
pub fn sign(
  method: &str,
  resource_path: &str,
  content_type: &str,
  secret: &str,
  timestamp: &DateTime<FixedOffset>,
) -> Result<String, SignError> {
  let canonical = canonical_string(method, content_type, &format_date(timestamp), resource_path);
  let mac = keyed_mac(secret, &canonical)?;
  Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn keyed_mac(secret: &str, canonical: &str) -> Result<HmacSha1, SignError> {
  let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignError::InvalidKey)?;
  mac.update(canonical.as_bytes());
  Ok(mac)
}

/// A request signed at one instant.
///
/// The timestamp and signature are produced together and cannot be changed
/// afterwards. Sign a new request for every call.
#[derive(Debug, Clone)]
pub struct SignedRequest {
  method: String,
  resource_path: String,
  content_type: String,
  timestamp: DateTime<FixedOffset>,
  signature: String,
  expires_at: DateTime<FixedOffset>,
  headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn resource_path(&self) -> &str {
    &self.resource_path
  }

  pub fn content_type(&self) -> &str {
    &self.content_type
  }

  pub fn timestamp(&self) -> DateTime<FixedOffset> {
    self.timestamp
  }

  pub fn signature(&self) -> &str {
    &self.signature
  }

  pub fn expires_at(&self) -> DateTime<FixedOffset> {
    self.expires_at
  }

  /// `Host`, `Date`, `Content-Type` and `Authorization`, in that order.
  pub fn headers(&self) -> &[(&'static str, String)] {
    &self.headers
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Fail hard once the skew tolerance has passed. Expired requests are never
  /// re-signed behind the caller's back.
  pub fn ensure_fresh_at(&self, now: DateTime<FixedOffset>) -> Result<(), SignError> {
    if now > self.expires_at {
      return Err(SignError::Expired {
        method: self.method.clone(),
        resource_path: self.resource_path.clone(),
        expires_at: self.expires_at,
      });
    }
    Ok(())
  }
}

/// Signs requests for one access key.
pub struct RequestSigner {
  access_key: String,
  secret_key: SecretString,
  content_type: String,
  skew_tolerance: TimeDelta,
  clock: Arc<dyn Clock>,
}

impl RequestSigner {
  pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
    Self {
      access_key: access_key.into(),
      secret_key: SecretString::from(secret_key.into()),
      content_type: DEFAULT_CONTENT_TYPE.to_string(),
      skew_tolerance: default_skew_tolerance(),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = content_type.into();
    self
  }

  pub fn with_skew_tolerance(mut self, tolerance: TimeDelta) -> Self {
    self.skew_tolerance = tolerance;
    self
  }

  pub fn access_key(&self) -> &str {
    &self.access_key
  }

  pub fn content_type(&self) -> &str {
    &self.content_type
  }

  /// Sign a request for `resource_path` (`/bucket/key`) against `host`,
  /// capturing the timestamp from the clock now.
  pub fn sign_request(
    &self,
    method: &str,
    host: &str,
    resource_path: &str,
  ) -> Result<SignedRequest, SignError> {
    let timestamp = self.clock.now();
    let signature = sign(
      method,
      resource_path,
      &self.content_type,
      self.secret_key.expose_secret(),
      &timestamp,
    )?;

    let headers = vec![
      ("Host", host.to_string()),
      ("Date", format_date(&timestamp)),
      ("Content-Type", self.content_type.clone()),
      (
        "Authorization",
        format!("AWS {}:{}", self.access_key, signature),
      ),
    ];

    Ok(SignedRequest {
      method: method.to_string(),
      resource_path: resource_path.to_string(),
      content_type: self.content_type.clone(),
      timestamp,
      signature,
      expires_at: timestamp + self.skew_tolerance,
      headers,
    })
  }

  /// Check a previously signed request against the current time.
  pub fn ensure_fresh(&self, request: &SignedRequest) -> Result<(), SignError> {
    request.ensure_fresh_at(self.clock.now())
  }

  /// Verify an incoming `Authorization` header, as a storage endpoint would.
  pub fn verify(
    &self,
    method: &str,
    resource_path: &str,
    content_type: &str,
    date: &str,
    authorization: &str,
  ) -> Result<(), SignError> {
    let (key, signature) = authorization
      .strip_prefix("AWS ")
      .and_then(|rest| rest.split_once(':'))
      .ok_or(SignError::MalformedAuthorization)?;

    if key != self.access_key {
      return Err(SignError::UnknownAccessKey(key.to_string()));
    }

    let expected = STANDARD
      .decode(signature)
      .map_err(|_| SignError::MalformedAuthorization)?;

    let canonical = canonical_string(method, content_type, date, resource_path);
    keyed_mac(self.secret_key.expose_secret(), &canonical)?
      .verify_slice(&expected)
      .map_err(|_| SignError::SignatureMismatch {
        method: method.to_string(),
        resource_path: resource_path.to_string(),
      })
  }
}

impl fmt::Debug for RequestSigner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RequestSigner")
      .field("access_key", &self.access_key)
      .field("content_type", &self.content_type)
      .field("skew_tolerance", &self.skew_tolerance)
      .finish_non_exhaustive()
  }
}
