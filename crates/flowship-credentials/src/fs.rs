use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::CredentialError;
use crate::{CredentialBlob, CredentialRegistry, validate_name};

/// Filesystem-based credential registry.
///
/// Credential sets are stored as one JSON file per name:
/// ```text
/// {root}/
/// ├── docker-storage.json
/// └── s3-storage.json
/// ```
///
/// Every save writes a temporary file first and then moves it into place, so
/// a concurrent reader never sees a half-written file.
pub struct FsCredentialRegistry {
  root: PathBuf,
}

impl FsCredentialRegistry {
  /// Create a new filesystem registry at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the registry.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_for(&self, name: &str) -> PathBuf {
    self.root.join(format!("{}.json", name))
  }

  async fn write_temp(&self, name: &str, blob: &CredentialBlob) -> Result<PathBuf, CredentialError> {
    let content = serde_json::to_vec_pretty(blob)?;
    let tmp = self
      .root
      .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));
    if let Err(e) = write_private(&tmp, &content).await {
      let _ = fs::remove_file(&tmp).await;
      return Err(e.into());
    }
    Ok(tmp)
  }
}

/// Create `path` readable by the owner only and write `content` to it.
async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
  let mut options = fs::OpenOptions::new();
  options.write(true).create_new(true);
  #[cfg(unix)]
  options.mode(0o600);

  let mut file = options.open(path).await?;
  file.write_all(content).await?;
  file.sync_all().await
}

#[async_trait]
impl CredentialRegistry for FsCredentialRegistry {
  async fn save(
    &self,
    name: &str,
    blob: CredentialBlob,
    overwrite: bool,
  ) -> Result<(), CredentialError> {
    validate_name(name)?;
    fs::create_dir_all(&self.root).await?;

    let target = self.path_for(name);
    let tmp = self.write_temp(name, &blob).await?;

    let result = if overwrite {
      fs::rename(&tmp, &target).await.map_err(CredentialError::from)
    } else {
      // A hard link fails if the target exists, which makes the
      // existence check and the write a single step.
      let linked = fs::hard_link(&tmp, &target).await;
      let _ = fs::remove_file(&tmp).await;
      linked.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
          CredentialError::AlreadyExists {
            name: name.to_string(),
          }
        } else {
          CredentialError::Io(e)
        }
      })
    };

    if result.is_err() {
      let _ = fs::remove_file(&tmp).await;
    } else {
      debug!(name = %name, path = %target.display(), "credential set saved");
    }

    result
  }

  async fn load(&self, name: &str) -> Result<Arc<CredentialBlob>, CredentialError> {
    validate_name(name)?;
    let content = fs::read(self.path_for(name)).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        CredentialError::NotFound {
          name: name.to_string(),
        }
      } else {
        CredentialError::Io(e)
      }
    })?;
    Ok(Arc::new(serde_json::from_slice(&content)?))
  }

  async fn list(&self) -> Result<Vec<String>, CredentialError> {
    let mut names = Vec::new();

    if !self.root.exists() {
      return Ok(names);
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let file_name = entry.file_name();
      let Some(file_name) = file_name.to_str() else {
        continue;
      };
      if let Some(name) = file_name.strip_suffix(".json")
        && !name.starts_with('.')
      {
        names.push(name.to_string());
      }
    }

    names.sort();
    Ok(names)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn blob(user: &str) -> CredentialBlob {
    CredentialBlob {
      kind: "object_store".to_string(),
      data: serde_json::json!({"access_key": user, "secret_key": format!("{}-secret", user)}),
    }
  }

  #[tokio::test]
  async fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path().join("credentials"));

    registry.save("s3-storage", blob("minio"), true).await.unwrap();
    let loaded = registry.load("s3-storage").await.unwrap();
    assert_eq!(loaded.data["access_key"], "minio");
    assert_eq!(registry.list().await.unwrap(), vec!["s3-storage"]);
  }

  #[tokio::test]
  async fn test_overwrite_replaces_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path());

    registry.save("s3-storage", blob("first"), true).await.unwrap();
    registry.save("s3-storage", blob("second"), true).await.unwrap();

    let loaded = registry.load("s3-storage").await.unwrap();
    assert_eq!(loaded.data["access_key"], "second");

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
  }

  #[tokio::test]
  async fn test_no_overwrite_keeps_existing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path());

    registry.save("docker-storage", blob("first"), false).await.unwrap();
    let err = registry
      .save("docker-storage", blob("second"), false)
      .await
      .unwrap_err();

    assert!(matches!(err, CredentialError::AlreadyExists { .. }));
    assert_eq!(
      registry.load("docker-storage").await.unwrap().data["access_key"],
      "first"
    );
  }

  #[tokio::test]
  async fn test_missing_and_invalid_names() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path());

    assert!(matches!(
      registry.load("nothing").await,
      Err(CredentialError::NotFound { .. })
    ));
    assert!(matches!(
      registry.save("../escape", blob("x"), true).await,
      Err(CredentialError::InvalidName { .. })
    ));
    assert!(registry.list().await.unwrap().is_empty());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path());
    registry.save("s3-storage", blob("minio"), true).await.unwrap();

    let mode = std::fs::metadata(dir.path().join("s3-storage.json"))
      .unwrap()
      .permissions()
      .mode();
    assert_eq!(mode & 0o777, 0o600);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_temp_file_is_private_from_creation() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path());

    let tmp = registry.write_temp("s3-storage", &blob("minio")).await.unwrap();
    let mode = std::fs::metadata(&tmp).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
  }

  #[tokio::test]
  async fn test_failed_temp_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsCredentialRegistry::new(dir.path().join("missing"));

    assert!(registry.write_temp("s3-storage", &blob("minio")).await.is_err());
    assert!(!dir.path().join("missing").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }
}
