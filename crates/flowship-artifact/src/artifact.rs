use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The backend-specific packaged form of a workload.
///
/// Produced exactly once per publication attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
  /// A directory holding a copy of the bundle.
  Directory { path: PathBuf },
  /// A pushed container image, `registry/repo:tag`.
  Image { reference: String },
  /// A blob in object storage.
  Object { bucket: String, key: String },
}

impl fmt::Display for Artifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Directory { path } => write!(f, "{}", path.display()),
      Self::Image { reference } => f.write_str(reference),
      Self::Object { bucket, key } => write!(f, "{}/{}", bucket, key),
    }
  }
}
