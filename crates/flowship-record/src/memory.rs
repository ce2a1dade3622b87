use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::RecordError;
use crate::record::DeploymentRecord;
use crate::{RecordStore, validate_id};

/// In-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
  records: RwLock<HashMap<String, DeploymentRecord>>,
}

impl InMemoryRecordStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
  async fn create(&self, record: &DeploymentRecord) -> Result<(), RecordError> {
    validate_id(&record.id)?;
    let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
    if records.contains_key(&record.id) {
      return Err(RecordError::AlreadyExists {
        id: record.id.clone(),
      });
    }
    records.insert(record.id.clone(), record.clone());
    Ok(())
  }

  async fn get(&self, id: &str) -> Result<DeploymentRecord, RecordError> {
    let records = self.records.read().unwrap_or_else(|e| e.into_inner());
    records
      .get(id)
      .cloned()
      .ok_or_else(|| RecordError::NotFound { id: id.to_string() })
  }

  async fn list(&self) -> Result<Vec<DeploymentRecord>, RecordError> {
    let records = self.records.read().unwrap_or_else(|e| e.into_inner());
    let mut list: Vec<_> = records.values().cloned().collect();
    list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(list)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use flowship_artifact::Artifact;
  use flowship_config::{BackendKind, Workload};

  #[tokio::test]
  async fn test_records_are_write_once() {
    let store = InMemoryRecordStore::new();
    let record = DeploymentRecord::new(
      DeploymentRecord::new_id(),
      &Workload::new("paris-weather", "/src"),
      BackendKind::Local,
      Artifact::Directory {
        path: "/flows/paris-weather/1".into(),
      },
    );

    store.create(&record).await.unwrap();
    assert!(matches!(
      store.create(&record).await,
      Err(RecordError::AlreadyExists { .. })
    ));
    assert_eq!(store.list().await.unwrap(), vec![record]);
  }
}
