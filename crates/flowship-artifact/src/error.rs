use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while packaging a workload.
#[derive(Debug, Error)]
pub enum PackagingError {
  /// The workload path does not exist.
  #[error("workload path not found: {}", path.display())]
  NotFound { path: PathBuf },

  /// The workload path exists but is not a directory.
  #[error("workload path is not a directory: {}", path.display())]
  NotADirectory { path: PathBuf },

  /// The workload bundle could not be read.
  #[error("workload path unreadable: {}", path.display())]
  Unreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The temporary staging directory could not be prepared.
  #[error("failed to prepare staging directory")]
  Staging(#[source] std::io::Error),

  /// The build context or blob archive could not be assembled.
  #[error("failed to assemble archive")]
  Archive(#[source] std::io::Error),
}
