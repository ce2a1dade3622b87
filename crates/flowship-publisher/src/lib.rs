//! Flowship Publisher
//!
//! The [`PublicationCoordinator`] takes a workload and a backend
//! configuration and drives one publication through its states:
//!
//! ```text
//! Configuring -> Packaging -> Publishing -> Registered
//! ```
//!
//! Any failure moves the publication to `Failed` and returns a
//! [`PublishError`]; no deployment record is produced. There are no internal
//! retries.

mod coordinator;
mod error;

pub use coordinator::{CoordinatorBuilder, PublicationCoordinator};
pub use error::PublishError;
