use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;
use crate::error::ConfigError;
use crate::workload::Workload;

/// A publication file: one workload and the backend to publish it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationDef {
  pub workload: Workload,
  pub backend: BackendConfig,
}

impl PublicationDef {
  /// Parse a publication definition from JSON.
  ///
  /// Only the shape is checked here; field validation happens when the
  /// coordinator enters its configuring state.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }
}
