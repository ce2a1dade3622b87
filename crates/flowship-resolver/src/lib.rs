//! Flowship Resolver
//!
//! Turns a [`DeploymentRecord`](flowship_record::DeploymentRecord) back into
//! something a worker can run. The retrieval path mirrors the backend that
//! produced the record:
//!
//! - local: the published directory is used in place,
//! - registry: the image is pulled into the local container engine,
//! - object store: the blob is fetched (with its own signed GET when going
//!   through the signed client) and unpacked into a destination directory.

mod error;
mod resolver;

pub use error::ResolveError;
pub use resolver::{ResolvedWorkload, Resolver, StandardResolver};
