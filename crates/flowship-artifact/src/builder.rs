use std::path::{Path, PathBuf};

use bytes::Bytes;
use flowship_config::Workload;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};

use crate::archive::archive_directory;
use crate::error::PackagingError;
use crate::fs::copy_dir_recursive;

/// Where the bundle lives inside flow images.
pub const APP_DIR: &str = "/usr/app";

/// Directory name of the bundle inside the staging area and build context.
const BUNDLE_DIR: &str = "flow";

/// Synthesize the build descriptor for a flow image.
pub fn dockerfile(base_image: &str) -> String {
  format!(
    "FROM {}\nRUN mkdir -p {}\nCOPY ./{} {}\n",
    base_image, APP_DIR, BUNDLE_DIR, APP_DIR
  )
}

/// A workload bundle copied into its own temporary staging directory.
///
/// The staging directory is removed when this value is dropped.
///
/// ```text
/// {staging}/
/// ├── Dockerfile   (registry backends only)
/// └── flow/        (copy of the workload bundle)
/// ```
#[derive(Debug)]
pub struct StagedWorkload {
  dir: TempDir,
  workload: String,
  file_count: usize,
}

impl StagedWorkload {
  /// Root of the staging area.
  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  /// The copied bundle.
  pub fn bundle_dir(&self) -> PathBuf {
    self.dir.path().join(BUNDLE_DIR)
  }

  pub fn workload(&self) -> &str {
    &self.workload
  }

  pub fn file_count(&self) -> usize {
    self.file_count
  }
}

/// A container build context ready to hand to the build service.
#[derive(Debug, Clone)]
pub struct BuildContext {
  /// Tar archive rooted at the staging directory.
  pub archive: Bytes,
  /// The synthesized build descriptor included in the archive.
  pub dockerfile: String,
}

/// Turns workload bundles into backend-specific artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactBuilder {
  staging_root: Option<PathBuf>,
}

impl ArtifactBuilder {
  /// Create a builder that stages under the system temp directory.
  pub fn new() -> Self {
    Self::default()
  }

  /// Stage under `root` instead of the system temp directory.
  pub fn with_staging_root(root: impl Into<PathBuf>) -> Self {
    Self {
      staging_root: Some(root.into()),
    }
  }

  /// Copy the workload bundle into a fresh staging directory.
  pub async fn package(&self, workload: &Workload) -> Result<StagedWorkload, PackagingError> {
    let metadata = fs::metadata(&workload.path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        PackagingError::NotFound {
          path: workload.path.clone(),
        }
      } else {
        PackagingError::Unreadable {
          path: workload.path.clone(),
          source: e,
        }
      }
    })?;

    if !metadata.is_dir() {
      return Err(PackagingError::NotADirectory {
        path: workload.path.clone(),
      });
    }

    let dir = self.staging_dir()?;
    let bundle = dir.path().join(BUNDLE_DIR);
    let file_count = copy_dir_recursive(&workload.path, &bundle)
      .await
      .map_err(|e| PackagingError::Unreadable {
        path: workload.path.clone(),
        source: e,
      })?;

    info!(
      workload = %workload.name,
      staging = %dir.path().display(),
      files = file_count,
      "workload staged"
    );

    Ok(StagedWorkload {
      dir,
      workload: workload.name.clone(),
      file_count,
    })
  }

  /// Write the build descriptor next to the staged bundle and pack the
  /// staging directory as a build context.
  pub async fn build_context(
    &self,
    staged: &StagedWorkload,
    base_image: &str,
  ) -> Result<BuildContext, PackagingError> {
    let dockerfile = dockerfile(base_image);
    fs::write(staged.root().join("Dockerfile"), &dockerfile)
      .await
      .map_err(PackagingError::Staging)?;

    let archive = archive_directory(staged.root())
      .await
      .map_err(PackagingError::Archive)?;

    debug!(
      workload = %staged.workload(),
      base_image = %base_image,
      size = archive.len(),
      "build context assembled"
    );

    Ok(BuildContext {
      archive,
      dockerfile,
    })
  }

  /// Pack the staged bundle (without the staging wrapper) as a blob.
  pub async fn blob(&self, staged: &StagedWorkload) -> Result<Bytes, PackagingError> {
    archive_directory(&staged.bundle_dir())
      .await
      .map_err(PackagingError::Archive)
  }

  fn staging_dir(&self) -> Result<TempDir, PackagingError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("flowship-staging-");
    let dir = match &self.staging_root {
      Some(root) => {
        std::fs::create_dir_all(root).map_err(PackagingError::Staging)?;
        builder.tempdir_in(root)
      }
      None => builder.tempdir(),
    };
    dir.map_err(PackagingError::Staging)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bundle() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("weather.py"), "def flow(): pass\n").unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/cities.json"), r#"{"Paris":[2.35,48.85]}"#).unwrap();
    dir
  }

  #[test]
  fn test_dockerfile_layout() {
    assert_eq!(
      dockerfile("registry.example.com/weather/base:latest"),
      "FROM registry.example.com/weather/base:latest\nRUN mkdir -p /usr/app\nCOPY ./flow /usr/app\n"
    );
  }

  #[tokio::test]
  async fn test_package_copies_into_fresh_staging_dir() {
    let source = bundle();
    let workload = Workload::new("paris-weather", source.path());
    let builder = ArtifactBuilder::new();

    let first = builder.package(&workload).await.unwrap();
    let second = builder.package(&workload).await.unwrap();

    assert_ne!(first.root(), second.root());
    assert_eq!(first.file_count(), 2);
    assert!(first.bundle_dir().join("data/cities.json").exists());
  }

  #[tokio::test]
  async fn test_staging_removed_on_drop() {
    let source = bundle();
    let workload = Workload::new("paris-weather", source.path());
    let staged = ArtifactBuilder::new().package(&workload).await.unwrap();
    let root = staged.root().to_path_buf();

    drop(staged);
    assert!(!root.exists());
  }

  #[tokio::test]
  async fn test_package_missing_path() {
    let workload = Workload::new("ghost", "/definitely/not/here");
    let err = ArtifactBuilder::new().package(&workload).await.unwrap_err();
    assert!(matches!(err, PackagingError::NotFound { .. }));
  }

  #[tokio::test]
  async fn test_package_file_instead_of_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("flow.py");
    std::fs::write(&file, "x").unwrap();

    let err = ArtifactBuilder::new()
      .package(&Workload::new("file", &file))
      .await
      .unwrap_err();
    assert!(matches!(err, PackagingError::NotADirectory { .. }));
  }

  #[tokio::test]
  async fn test_build_context_contains_dockerfile_and_bundle() {
    let source = bundle();
    let root = tempfile::tempdir().unwrap();
    let builder = ArtifactBuilder::with_staging_root(root.path());
    let staged = builder
      .package(&Workload::new("paris-weather", source.path()))
      .await
      .unwrap();
    assert!(staged.root().starts_with(root.path()));

    let context = builder.build_context(&staged, "weather/base:latest").await.unwrap();
    assert!(context.dockerfile.starts_with("FROM weather/base:latest\n"));

    let mut archive = tar::Archive::new(std::io::Cursor::new(context.archive.to_vec()));
    let names: Vec<String> = archive
      .entries()
      .unwrap()
      .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
      .collect();
    assert!(names.iter().any(|n| n == "Dockerfile"));
    assert!(names.iter().any(|n| n == "flow/weather.py"));
  }

  #[tokio::test]
  async fn test_blob_is_rooted_at_bundle() {
    let source = bundle();
    let builder = ArtifactBuilder::new();
    let staged = builder
      .package(&Workload::new("paris-weather", source.path()))
      .await
      .unwrap();

    let blob = builder.blob(&staged).await.unwrap();
    let dest = tempfile::tempdir().unwrap();
    crate::archive::unpack_archive(blob, dest.path()).await.unwrap();
    assert!(dest.path().join("weather.py").exists());
    assert!(!dest.path().join("flow").exists());
  }
}
