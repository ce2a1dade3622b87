use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::image::{ImageReference, RegistryAuth};

/// One message from a build, push or pull stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
  /// A line of build output.
  Log(String),
  /// A push/pull status update, optionally for one layer.
  Progress {
    id: Option<String>,
    status: String,
    progress: Option<String>,
  },
  /// The engine reported a failure; the stream ends after this.
  Failed(String),
}

pub type MessageStream = BoxStream<'static, Result<TransportMessage, TransportError>>;

/// Access to a container engine that can build, push and pull images.
///
/// Each call returns once the engine has accepted the request; the returned
/// stream yields the engine's output until the operation finishes.
#[async_trait]
pub trait ContainerTransport: Send + Sync {
  /// Build the tar `context` and tag the result as `image`.
  async fn build(&self, context: Bytes, image: &ImageReference)
  -> Result<MessageStream, TransportError>;

  /// Push `image` to its registry.
  async fn push(
    &self,
    image: &ImageReference,
    auth: &RegistryAuth,
  ) -> Result<MessageStream, TransportError>;

  /// Pull `image` from its registry.
  async fn pull(
    &self,
    image: &ImageReference,
    auth: &RegistryAuth,
  ) -> Result<MessageStream, TransportError>;
}
