use std::collections::VecDeque;
use std::sync::Arc;

use flowship_artifact::BuildContext;
use flowship_config::{BackendKind, RegistryConfig};
use flowship_credentials::{CredentialBlob, CredentialRegistry};
use flowship_events::{PublicationEvent, PublishContext};
use futures::StreamExt;
use tracing::{error, info, instrument};

use crate::error::RegistryError;
use crate::image::{ImageReference, RegistryAuth};
use crate::transport::{ContainerTransport, MessageStream, TransportMessage};

/// How many lines of engine output an error keeps.
const LOG_TAIL: usize = 20;

/// Builds workload images and pushes them to a registry.
#[derive(Clone)]
pub struct RegistryPublisher {
  transport: Arc<dyn ContainerTransport>,
  credentials: Arc<dyn CredentialRegistry>,
}

impl RegistryPublisher {
  pub fn new(
    transport: Arc<dyn ContainerTransport>,
    credentials: Arc<dyn CredentialRegistry>,
  ) -> Self {
    Self {
      transport,
      credentials,
    }
  }

  /// Build, push and register the image for a build context.
  ///
  /// Returns the pushed image reference. The registry settings are saved as
  /// the `docker-storage` credential set only after a successful push.
  #[instrument(name = "registry_publish", skip_all, fields(registry = %config.registry_url))]
  pub async fn publish(
    &self,
    context: &BuildContext,
    config: &RegistryConfig,
    ctx: &PublishContext,
  ) -> Result<ImageReference, RegistryError> {
    let image = ImageReference::generate(config);

    self.build(context, &image, ctx).await?;
    self.push(&image, config, ctx).await?;
    self.save_credentials(config, ctx).await?;

    info!(image = %image, "image published");
    Ok(image)
  }

  /// Build the context and tag it as `image`.
  pub async fn build(
    &self,
    context: &BuildContext,
    image: &ImageReference,
    ctx: &PublishContext,
  ) -> Result<(), RegistryError> {
    info!(image = %image, size = context.archive.len(), "building image");

    let failed = |message: String, log_tail: Vec<String>| RegistryError::Build {
      image: image.to_string(),
      message,
      log_tail,
    };

    let stream = ctx
      .guard("build", self.transport.build(context.archive.clone(), image))
      .await?
      .map_err(|e| failed(e.to_string(), Vec::new()))?;

    drain(stream, ctx, "build")
      .await?
      .map_err(|(message, tail)| {
        error!(image = %image, error = %message, "image build failed");
        failed(message, tail)
      })
  }

  /// Push an already built image.
  ///
  /// Safe to call again after a failed push; the build is not repeated.
  pub async fn push(
    &self,
    image: &ImageReference,
    config: &RegistryConfig,
    ctx: &PublishContext,
  ) -> Result<(), RegistryError> {
    info!(image = %image, "pushing image");

    let failed = |message: String, log_tail: Vec<String>| RegistryError::Push {
      image: image.to_string(),
      message,
      log_tail,
    };

    let auth = RegistryAuth::from_config(config);
    let stream = ctx
      .guard("push", self.transport.push(image, &auth))
      .await?
      .map_err(|e| failed(e.to_string(), Vec::new()))?;

    drain(stream, ctx, "push")
      .await?
      .map_err(|(message, tail)| {
        error!(image = %image, error = %message, "image push failed");
        failed(message, tail)
      })
  }

  /// Pull `image` into the local engine.
  pub async fn pull(
    &self,
    image: &ImageReference,
    config: &RegistryConfig,
    ctx: &PublishContext,
  ) -> Result<(), RegistryError> {
    info!(image = %image, "pulling image");

    let failed = |message: String| RegistryError::Pull {
      image: image.to_string(),
      message,
    };

    let auth = RegistryAuth::from_config(config);
    let stream = ctx
      .guard("pull", self.transport.pull(image, &auth))
      .await?
      .map_err(|e| failed(e.to_string()))?;

    drain(stream, ctx, "pull")
      .await?
      .map_err(|(message, _)| failed(message))
  }

  async fn save_credentials(
    &self,
    config: &RegistryConfig,
    ctx: &PublishContext,
  ) -> Result<(), RegistryError> {
    let name = BackendKind::Registry.storage_block();
    let blob = CredentialBlob::encode(BackendKind::Registry.as_str(), config)?;
    self.credentials.save(name, blob, true).await?;
    ctx.emit(PublicationEvent::CredentialsSaved {
      name: name.to_string(),
    });
    Ok(())
  }
}

/// Consume an engine stream, forwarding output to the observer.
///
/// The outer error is an interrupt; the inner one is an engine failure with
/// the tail of the output seen so far.
async fn drain(
  mut stream: MessageStream,
  ctx: &PublishContext,
  operation: &'static str,
) -> Result<Result<(), (String, Vec<String>)>, RegistryError> {
  let mut tail: VecDeque<String> = VecDeque::with_capacity(LOG_TAIL);
  let mut remember = |line: String| {
    if tail.len() == LOG_TAIL {
      tail.pop_front();
    }
    tail.push_back(line);
  };

  let outcome = ctx
    .guard(operation, async {
      while let Some(message) = stream.next().await {
        match message {
          Ok(TransportMessage::Log(line)) => {
            remember(line.clone());
            ctx.emit(PublicationEvent::BuildLog { line });
          }
          Ok(TransportMessage::Progress {
            id,
            status,
            progress,
          }) => {
            let line = match &id {
              Some(id) => format!("{}: {}", id, status),
              None => status.clone(),
            };
            remember(line);
            ctx.emit(PublicationEvent::PushProgress { status, progress });
          }
          Ok(TransportMessage::Failed(message)) => return Err(message),
          Err(e) => return Err(e.to_string()),
        }
      }
      Ok(())
    })
    .await?;

  Ok(outcome.map_err(|message| (message, tail.into_iter().collect())))
}
