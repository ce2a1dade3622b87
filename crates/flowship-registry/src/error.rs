use flowship_credentials::CredentialError;
use flowship_events::Interrupt;
use thiserror::Error;

/// Errors talking to the container engine.
#[derive(Debug, Error)]
pub enum TransportError {
  /// The engine socket could not be reached.
  #[error("failed to reach container engine at {socket}: {message}")]
  Connect { socket: String, message: String },

  /// The engine answered with a non-success status.
  #[error("container engine returned {status}: {message}")]
  Status { status: u16, message: String },

  /// The response stream broke off.
  #[error("failed to read engine response: {0}")]
  Body(String),

  /// A line of the response stream was not valid JSON.
  #[error("malformed engine message '{line}': {source}")]
  Decode {
    line: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to build engine request: {0}")]
  Request(String),
}

/// Errors that can occur while publishing or pulling an image.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// The image build failed; nothing was pushed.
  #[error("build of {image} failed: {message}")]
  Build {
    image: String,
    message: String,
    log_tail: Vec<String>,
  },

  /// The push failed; the built image is still present locally.
  #[error("push of {image} failed: {message}")]
  Push {
    image: String,
    message: String,
    log_tail: Vec<String>,
  },

  #[error("pull of {image} failed: {message}")]
  Pull { image: String, message: String },

  #[error("invalid image reference: '{reference}'")]
  InvalidReference { reference: String },

  #[error(transparent)]
  Interrupted(#[from] Interrupt),

  #[error("failed to save registry credentials: {0}")]
  Credentials(#[from] CredentialError),
}

impl RegistryError {
  /// The last lines of engine output before the failure, if any.
  pub fn log_tail(&self) -> &[String] {
    match self {
      Self::Build { log_tail, .. } | Self::Push { log_tail, .. } => log_tail,
      _ => &[],
    }
  }
}
