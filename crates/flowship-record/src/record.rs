use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use flowship_artifact::{Artifact, unique_id_at};
use flowship_config::{BackendKind, ParameterValue, Workload};
use serde::{Deserialize, Serialize};

/// The stable, discoverable reference to one published workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
  /// `<UTC %Y%m%d%H%M%S>-<uuid>`, unique per publication.
  pub id: String,
  pub workload: String,
  pub backend: BackendKind,
  /// Artifact reference: a directory path, an image reference or
  /// `bucket/key`.
  pub artifact: String,
  /// Structured form of `artifact`.
  pub location: Artifact,
  #[serde(default)]
  pub parameters: BTreeMap<String, ParameterValue>,
  /// Credential set a worker needs to fetch the artifact.
  pub storage_block: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub labels: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub work_queue: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl DeploymentRecord {
  /// A fresh record id for a publication starting now.
  pub fn new_id() -> String {
    unique_id_at(Utc::now())
  }

  /// Describe `workload` published as `artifact` through `backend`.
  pub fn new(id: impl Into<String>, workload: &Workload, backend: BackendKind, artifact: Artifact) -> Self {
    Self {
      id: id.into(),
      workload: workload.name.clone(),
      backend,
      artifact: artifact.to_string(),
      location: artifact,
      parameters: workload.parameters.clone(),
      storage_block: backend.storage_block().to_string(),
      labels: workload.labels.clone(),
      work_queue: workload.work_queue.clone(),
      created_at: Utc::now(),
    }
  }
}
