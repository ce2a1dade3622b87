//! Flowship Object Store
//!
//! Publishes workload blobs to S3-compatible object storage. Two clients
//! implement [`ObjectClient`]:
//!
//! - [`SignedHttpClient`] sends plain HTTP requests carrying a freshly signed
//!   `Authorization` header per call,
//! - [`NativeClient`] keeps buckets in process on top of `object_store`.
//!
//! [`ObjectStorePublisher`] picks the client from the backend configuration,
//! makes sure the bucket exists, uploads under a timestamped key and saves
//! the settings as the `s3-storage` credential set.

mod client;
mod error;
mod native;
mod publisher;
mod signed;

pub use client::{BUCKET_ALREADY_OWNED, ObjectClient};
pub use error::{ClientError, ObjectStoreError};
pub use native::NativeClient;
pub use publisher::{ObjectLocation, ObjectStorePublisher};
pub use signed::SignedHttpClient;
