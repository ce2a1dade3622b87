use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of a single publication.
///
/// ```text
/// Configuring -> Packaging -> Publishing -> Registered
///       \            \             \
///        +------------+-------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
  Configuring,
  Packaging,
  Publishing,
  Registered,
  Failed,
}

impl PublicationState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Registered | Self::Failed)
  }

  /// Whether moving from `self` to `next` is a legal transition.
  pub fn can_transition_to(&self, next: PublicationState) -> bool {
    use PublicationState::*;
    match (self, next) {
      (Configuring, Packaging) | (Packaging, Publishing) | (Publishing, Registered) => true,
      (from, Failed) => !from.is_terminal(),
      _ => false,
    }
  }
}

impl fmt::Display for PublicationState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Configuring => "configuring",
      Self::Packaging => "packaging",
      Self::Publishing => "publishing",
      Self::Registered => "registered",
      Self::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Events emitted during a publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicationEvent {
  /// The publication moved to a new state.
  StateChanged {
    workload: String,
    from: PublicationState,
    to: PublicationState,
  },

  /// A line of output from the image build.
  BuildLog { line: String },

  /// A status update from an image push or pull.
  PushProgress {
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<String>,
  },

  /// The target bucket exists (freshly created or already owned).
  BucketReady { bucket: String, created: bool },

  /// A blob was written to object storage.
  Uploaded {
    bucket: String,
    key: String,
    size: usize,
  },

  /// Backend settings were saved under a named credential set.
  CredentialsSaved { name: String },
}

#[cfg(test)]
mod tests {
  use super::*;
  use PublicationState::*;

  #[test]
  fn test_forward_transitions() {
    assert!(Configuring.can_transition_to(Packaging));
    assert!(Packaging.can_transition_to(Publishing));
    assert!(Publishing.can_transition_to(Registered));
    assert!(!Configuring.can_transition_to(Registered));
    assert!(!Publishing.can_transition_to(Packaging));
  }

  #[test]
  fn test_terminal_states_are_final() {
    assert!(Configuring.can_transition_to(Failed));
    assert!(Publishing.can_transition_to(Failed));
    assert!(!Registered.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Failed));
  }

  #[test]
  fn test_event_serialization_is_tagged() {
    let event = PublicationEvent::StateChanged {
      workload: "paris-weather".to_string(),
      from: Packaging,
      to: Publishing,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "state_changed");
    assert_eq!(json["to"], "publishing");

    let progress = PublicationEvent::PushProgress {
      status: "Pushed".to_string(),
      progress: None,
    };
    let json = serde_json::to_value(&progress).unwrap();
    assert!(json.get("progress").is_none());
  }
}
