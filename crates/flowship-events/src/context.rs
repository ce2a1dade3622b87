use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::event::PublicationEvent;
use crate::observer::{NoopObserver, PublicationObserver};

/// Why a guarded operation stopped before completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Interrupt {
  #[error("{operation} exceeded the publication deadline")]
  Timeout { operation: &'static str },

  #[error("{operation} was cancelled")]
  Cancelled { operation: &'static str },
}

impl Interrupt {
  pub fn operation(&self) -> &'static str {
    match self {
      Self::Timeout { operation } | Self::Cancelled { operation } => operation,
    }
  }
}

/// Per-publication context handed to every publisher call.
///
/// Bundles the event observer with the caller's deadline and cancellation
/// token. Cloning is cheap and clones share the same token.
#[derive(Clone)]
pub struct PublishContext {
  observer: Arc<dyn PublicationObserver>,
  deadline: Option<Instant>,
  cancel: CancellationToken,
}

impl PublishContext {
  pub fn new() -> Self {
    Self {
      observer: Arc::new(NoopObserver),
      deadline: None,
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_observer(mut self, observer: Arc<dyn PublicationObserver>) -> Self {
    self.observer = observer;
    self
  }

  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  /// Set the deadline to `timeout` from now.
  pub fn with_timeout(self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn emit(&self, event: PublicationEvent) {
    self.observer.notify(event);
  }

  /// Fail fast if the publication was cancelled or its deadline has passed.
  pub fn check(&self, operation: &'static str) -> Result<(), Interrupt> {
    if self.cancel.is_cancelled() {
      return Err(Interrupt::Cancelled { operation });
    }
    if let Some(deadline) = self.deadline
      && Instant::now() >= deadline
    {
      return Err(Interrupt::Timeout { operation });
    }
    Ok(())
  }

  /// Run `fut` bounded by the deadline and raced against cancellation.
  ///
  /// The future is dropped as soon as either fires.
  pub async fn guard<F, T>(&self, operation: &'static str, fut: F) -> Result<T, Interrupt>
  where
    F: Future<Output = T>,
  {
    self.check(operation)?;

    let bounded = async {
      match self.deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
          .await
          .map_err(|_| Interrupt::Timeout { operation }),
        None => Ok(fut.await),
      }
    };

    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(Interrupt::Cancelled { operation }),
      result = bounded => result,
    }
  }
}

impl Default for PublishContext {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for PublishContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PublishContext")
      .field("deadline", &self.deadline)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish_non_exhaustive()
  }
}
