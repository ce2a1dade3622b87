use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::event::PublicationEvent;

/// Trait for receiving publication events.
///
/// Publishers call `notify` inline while they stream build logs and upload
/// progress, so implementations must return promptly.
pub trait PublicationObserver: Send + Sync {
  fn notify(&self, event: PublicationEvent);
}

/// An observer that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl PublicationObserver for NoopObserver {
  fn notify(&self, _event: PublicationEvent) {}
}

/// An observer that writes events to the `tracing` log.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl PublicationObserver for TracingObserver {
  fn notify(&self, event: PublicationEvent) {
    match event {
      PublicationEvent::StateChanged { workload, from, to } => {
        info!(workload = %workload, from = %from, to = %to, "publication state changed");
      }
      PublicationEvent::BuildLog { line } => debug!(line = %line, "build"),
      PublicationEvent::PushProgress { status, progress } => {
        debug!(status = %status, progress = progress.as_deref().unwrap_or(""), "push");
      }
      PublicationEvent::BucketReady { bucket, created } => {
        info!(bucket = %bucket, created, "bucket ready");
      }
      PublicationEvent::Uploaded { bucket, key, size } => {
        info!(bucket = %bucket, key = %key, size, "object uploaded");
      }
      PublicationEvent::CredentialsSaved { name } => {
        info!(name = %name, "credential set saved");
      }
    }
  }
}

/// An observer that forwards events to a bounded broadcast channel.
///
/// Sending never waits. A receiver that falls more than `capacity` events
/// behind loses the oldest ones and sees `RecvError::Lagged` on its next
/// receive.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
  sender: broadcast::Sender<PublicationEvent>,
}

impl ChannelObserver {
  /// Create an observer with room for `capacity` undelivered events, along
  /// with a first receiver.
  pub fn new(capacity: usize) -> (Self, broadcast::Receiver<PublicationEvent>) {
    let (sender, receiver) = broadcast::channel(capacity.max(1));
    (Self { sender }, receiver)
  }

  /// Attach another receiver; it sees events sent from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<PublicationEvent> {
    self.sender.subscribe()
  }
}

impl PublicationObserver for ChannelObserver {
  fn notify(&self, event: PublicationEvent) {
    // No receivers is fine
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::sync::broadcast::error::RecvError;

  fn log(line: &str) -> PublicationEvent {
    PublicationEvent::BuildLog {
      line: line.to_string(),
    }
  }

  #[tokio::test]
  async fn test_channel_delivers_in_order() {
    let (observer, mut rx) = ChannelObserver::new(8);
    observer.notify(log("Step 1/3 : FROM base"));
    observer.notify(log("Step 2/3 : RUN mkdir -p /usr/app"));

    assert_eq!(rx.recv().await.unwrap(), log("Step 1/3 : FROM base"));
    assert_eq!(rx.recv().await.unwrap(), log("Step 2/3 : RUN mkdir -p /usr/app"));
  }

  #[tokio::test]
  async fn test_slow_receiver_drops_oldest() {
    let (observer, mut rx) = ChannelObserver::new(2);
    for i in 0..5 {
      observer.notify(log(&format!("line {}", i)));
    }

    assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
    assert_eq!(rx.recv().await.unwrap(), log("line 3"));
    assert_eq!(rx.recv().await.unwrap(), log("line 4"));
  }

  #[test]
  fn test_notify_without_receivers_does_not_fail() {
    let (observer, rx) = ChannelObserver::new(1);
    drop(rx);
    observer.notify(log("nobody listening"));
    NoopObserver.notify(log("ignored"));
    TracingObserver.notify(log("logged"));
  }
}
