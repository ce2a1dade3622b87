//! Flowship Config
//!
//! This crate contains the serializable configuration types for flowship.
//! A publication is described by a [`Workload`] (what to ship) and a
//! [`BackendConfig`] (where to ship it). Exactly one backend variant is active
//! per publication.
//!
//! Configuration can be loaded from:
//! - JSON publication files (via CLI with `flowship publish publication.json`)
//! - Saved credential sets (as JSON blobs)
//!
//! ```json
//! {
//!   "workload": { "name": "paris-weather", "path": "./bundle" },
//!   "backend": { "kind": "local", "base_path": "/flows" }
//! }
//! ```

mod backend;
mod error;
mod publication;
mod secret;
mod workload;

pub use backend::{
  BackendConfig, BackendKind, LocalConfig, ObjectStoreConfig, ObjectTransport, RegistryConfig,
};
pub use error::ConfigError;
pub use publication::PublicationDef;
pub use secret::Secret;
pub use workload::{ParameterValue, Workload};
