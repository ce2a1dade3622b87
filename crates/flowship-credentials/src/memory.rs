use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::CredentialError;
use crate::{CredentialBlob, CredentialRegistry, validate_name};

/// In-memory credential registry.
///
/// Each set is held behind an `Arc`; saving swaps the pointer, so readers
/// keep whichever complete set they loaded.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRegistry {
  data: RwLock<HashMap<String, Arc<CredentialBlob>>>,
}

impl InMemoryCredentialRegistry {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CredentialRegistry for InMemoryCredentialRegistry {
  async fn save(
    &self,
    name: &str,
    blob: CredentialBlob,
    overwrite: bool,
  ) -> Result<(), CredentialError> {
    validate_name(name)?;
    let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
    if !overwrite && data.contains_key(name) {
      return Err(CredentialError::AlreadyExists {
        name: name.to_string(),
      });
    }
    data.insert(name.to_string(), Arc::new(blob));
    Ok(())
  }

  async fn load(&self, name: &str) -> Result<Arc<CredentialBlob>, CredentialError> {
    let data = self.data.read().unwrap_or_else(|e| e.into_inner());
    data
      .get(name)
      .cloned()
      .ok_or_else(|| CredentialError::NotFound {
        name: name.to_string(),
      })
  }

  async fn list(&self) -> Result<Vec<String>, CredentialError> {
    let data = self.data.read().unwrap_or_else(|e| e.into_inner());
    let mut names: Vec<String> = data.keys().cloned().collect();
    names.sort();
    Ok(names)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn blob(user: &str) -> CredentialBlob {
    CredentialBlob {
      kind: "registry".to_string(),
      data: serde_json::json!({"username": user, "password": format!("{}-pw", user)}),
    }
  }

  #[tokio::test]
  async fn test_save_load_overwrite() {
    let registry = InMemoryCredentialRegistry::new();

    assert!(matches!(
      registry.load("docker-storage").await,
      Err(CredentialError::NotFound { .. })
    ));

    registry.save("docker-storage", blob("alice"), true).await.unwrap();
    assert_eq!(registry.load("docker-storage").await.unwrap().data["username"], "alice");

    registry.save("docker-storage", blob("bob"), true).await.unwrap();
    assert_eq!(registry.load("docker-storage").await.unwrap().data["username"], "bob");
    assert_eq!(registry.list().await.unwrap(), vec!["docker-storage"]);
  }

  #[tokio::test]
  async fn test_save_without_overwrite_rejects_existing() {
    let registry = InMemoryCredentialRegistry::new();
    registry.save("s3-storage", blob("alice"), false).await.unwrap();

    let err = registry.save("s3-storage", blob("bob"), false).await.unwrap_err();
    assert!(matches!(err, CredentialError::AlreadyExists { .. }));
    assert_eq!(registry.load("s3-storage").await.unwrap().data["username"], "alice");
  }

  #[tokio::test]
  async fn test_concurrent_readers_see_whole_sets() {
    let registry = Arc::new(InMemoryCredentialRegistry::new());
    registry.save("docker-storage", blob("alice"), true).await.unwrap();

    let writer = {
      let registry = registry.clone();
      tokio::spawn(async move {
        for i in 0..200 {
          let user = if i % 2 == 0 { "bob" } else { "alice" };
          registry.save("docker-storage", blob(user), true).await.unwrap();
        }
      })
    };

    let readers: Vec<_> = (0..4)
      .map(|_| {
        let registry = registry.clone();
        tokio::spawn(async move {
          for _ in 0..200 {
            let loaded = registry.load("docker-storage").await.unwrap();
            let user = loaded.data["username"].as_str().unwrap().to_string();
            assert_eq!(loaded.data["password"], format!("{}-pw", user));
          }
        })
      })
      .collect();

    writer.await.unwrap();
    for reader in readers {
      reader.await.unwrap();
    }
  }
}
