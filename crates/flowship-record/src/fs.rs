use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::RecordError;
use crate::record::DeploymentRecord;
use crate::{RecordStore, validate_id};

/// Filesystem-based record store.
///
/// ```text
/// {root}/
/// ├── 20240501090807-6f1c...json
/// └── 20240501091512-a03e...json
/// ```
///
/// A record file appears complete or not at all: it is written to a
/// temporary file and then linked into place, which also refuses to replace
/// an existing record.
pub struct FsRecordStore {
  root: PathBuf,
}

impl FsRecordStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_for(&self, id: &str) -> PathBuf {
    self.root.join(format!("{}.json", id))
  }

  async fn read_record(&self, path: &Path) -> Result<DeploymentRecord, RecordError> {
    let content = fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
  }

  async fn write_temp(&self, record: &DeploymentRecord) -> Result<PathBuf, RecordError> {
    let content = serde_json::to_vec_pretty(record)?;
    let tmp = self
      .root
      .join(format!(".{}.{}.tmp", record.id, uuid::Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, content).await {
      let _ = fs::remove_file(&tmp).await;
      return Err(e.into());
    }
    Ok(tmp)
  }
}

#[async_trait]
impl RecordStore for FsRecordStore {
  async fn create(&self, record: &DeploymentRecord) -> Result<(), RecordError> {
    validate_id(&record.id)?;
    fs::create_dir_all(&self.root).await?;

    let tmp = self.write_temp(record).await?;
    let target = self.path_for(&record.id);
    let linked = fs::hard_link(&tmp, &target).await;
    let _ = fs::remove_file(&tmp).await;

    match linked {
      Ok(()) => {
        debug!(id = %record.id, path = %target.display(), "deployment record written");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(RecordError::AlreadyExists {
        id: record.id.clone(),
      }),
      Err(e) => Err(e.into()),
    }
  }

  async fn get(&self, id: &str) -> Result<DeploymentRecord, RecordError> {
    validate_id(id)?;
    match self.read_record(&self.path_for(id)).await {
      Err(RecordError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(RecordError::NotFound { id: id.to_string() })
      }
      other => other,
    }
  }

  async fn list(&self) -> Result<Vec<DeploymentRecord>, RecordError> {
    let mut records = Vec::new();

    if !self.root.exists() {
      return Ok(records);
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let is_record = path.extension().is_some_and(|ext| ext == "json")
        && !entry.file_name().to_string_lossy().starts_with('.');
      if is_record {
        records.push(self.read_record(&path).await?);
      }
    }

    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowship_artifact::Artifact;
  use flowship_config::{BackendKind, Workload};

  fn record(workload: &str) -> DeploymentRecord {
    DeploymentRecord::new(
      DeploymentRecord::new_id(),
      &Workload::new(workload, "/src"),
      BackendKind::Registry,
      Artifact::Image {
        reference: "registry.example.com/weather/flow:1".to_string(),
      },
    )
  }

  #[tokio::test]
  async fn test_create_get_list() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path().join("records"));
    assert!(store.list().await.unwrap().is_empty());

    let first = record("paris-weather");
    let second = record("oslo-weather");
    store.create(&first).await.unwrap();
    store.create(&second).await.unwrap();

    assert_eq!(store.get(&first.id).await.unwrap(), first);
    assert_eq!(store.list().await.unwrap().len(), 2);
    assert_eq!(
      store.list_for_workload("oslo-weather").await.unwrap(),
      vec![second]
    );
  }

  #[tokio::test]
  async fn test_duplicate_id_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path());

    let original = record("paris-weather");
    store.create(&original).await.unwrap();

    let mut duplicate = record("oslo-weather");
    duplicate.id = original.id.clone();
    assert!(matches!(
      store.create(&duplicate).await,
      Err(RecordError::AlreadyExists { .. })
    ));
    assert_eq!(store.get(&original.id).await.unwrap().workload, "paris-weather");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
  }

  #[tokio::test]
  async fn test_failed_temp_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path().join("missing"));

    assert!(matches!(
      store.write_temp(&record("paris-weather")).await,
      Err(RecordError::Io(_))
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn test_missing_and_invalid_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRecordStore::new(dir.path());

    assert!(matches!(
      store.get("20240501090807-missing").await,
      Err(RecordError::NotFound { .. })
    ));
    assert!(matches!(
      store.get("../../etc/passwd").await,
      Err(RecordError::InvalidId { .. })
    ));
  }
}
