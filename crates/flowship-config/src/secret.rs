use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A credential value that never shows up in `Debug` output.
///
/// Serialization exposes the value, which is only done when a backend's
/// settings are written to the credential registry.
pub struct Secret(SecretString);

impl Secret {
  pub fn new(value: impl Into<String>) -> Self {
    Self(SecretString::from(value.into()))
  }

  /// Access the underlying value.
  pub fn expose(&self) -> &str {
    self.0.expose_secret()
  }

  pub fn is_empty(&self) -> bool {
    self.expose().trim().is_empty()
  }
}

impl Clone for Secret {
  fn clone(&self) -> Self {
    Self::new(self.expose().to_owned())
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Secret(***)")
  }
}

impl PartialEq for Secret {
  fn eq(&self, other: &Self) -> bool {
    self.expose() == other.expose()
  }
}

impl From<&str> for Secret {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl Serialize for Secret {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.expose())
  }
}

impl<'de> Deserialize<'de> for Secret {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    String::deserialize(deserializer).map(Self::new)
  }
}
