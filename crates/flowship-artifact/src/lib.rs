//! Flowship Artifact
//!
//! This crate turns a workload bundle into the backend-specific artifact that
//! gets published:
//!
//! - a staged copy of the bundle directory (every backend starts here),
//! - a container build context: `Dockerfile` + `flow/` packed as a tar archive,
//! - an in-memory tar blob of the bundle for object storage.
//!
//! Staging happens in a fresh temporary directory that is removed when the
//! [`StagedWorkload`] is dropped, so a failed or cancelled publication never
//! leaves a partial artifact behind.

mod archive;
mod artifact;
mod builder;
mod error;
mod fs;
mod id;

pub use archive::{archive_directory, unpack_archive};
pub use artifact::Artifact;
pub use builder::{APP_DIR, ArtifactBuilder, BuildContext, StagedWorkload, dockerfile};
pub use error::PackagingError;
pub use fs::copy_dir_recursive;
pub use id::{current_timestamp, timestamp_prefix, unique_id, unique_id_at};
