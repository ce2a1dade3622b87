//! Flowship Registry
//!
//! Publishes a build context as a container image:
//!
//! 1. build the context into `<registry>/<repository>:<ts>-<uuid>`,
//! 2. push the image with the registry credentials,
//! 3. save the registry settings as the `docker-storage` credential set.
//!
//! The container engine is reached through a [`ContainerTransport`]. The
//! [`DockerTransport`] implementation speaks the Docker Engine HTTP API over
//! the local Unix socket.

mod docker;
mod error;
mod image;
mod publisher;
mod transport;

pub use docker::{DEFAULT_DOCKER_SOCKET, DockerTransport};
pub use error::{RegistryError, TransportError};
pub use image::{ImageReference, RegistryAuth};
pub use publisher::RegistryPublisher;
pub use transport::{ContainerTransport, MessageStream, TransportMessage};
