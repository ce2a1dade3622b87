use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyperlocal::{UnixClientExt, UnixConnector, Uri};
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::image::{ImageReference, RegistryAuth};
use crate::transport::{ContainerTransport, MessageStream, TransportMessage};

/// Where the Docker daemon listens by default.
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Docker Engine API client over the daemon's Unix socket.
#[derive(Clone)]
pub struct DockerTransport {
  socket: PathBuf,
  client: Client<UnixConnector, Full<Bytes>>,
}

impl DockerTransport {
  pub fn new(socket: impl Into<PathBuf>) -> Self {
    Self {
      socket: socket.into(),
      client: Client::unix(),
    }
  }

  pub fn socket(&self) -> &Path {
    &self.socket
  }

  async fn post(
    &self,
    path: &str,
    query: String,
    content_type: Option<&'static str>,
    auth: Option<&RegistryAuth>,
    body: Bytes,
  ) -> Result<Incoming, TransportError> {
    let path_and_query = format!("{}?{}", path, query);
    let uri: hyper::Uri = Uri::new(&self.socket, &path_and_query).into();

    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
      builder = builder.header(CONTENT_TYPE, content_type);
    }
    if let Some(auth) = auth {
      let value = auth
        .header_value()
        .map_err(|e| TransportError::Request(e.to_string()))?;
      builder = builder.header("X-Registry-Auth", value);
    }
    let request = builder
      .body(Full::new(body))
      .map_err(|e| TransportError::Request(e.to_string()))?;

    debug!(socket = %self.socket.display(), path = %path, "engine request");

    let response = self
      .client
      .request(request)
      .await
      .map_err(|e| TransportError::Connect {
        socket: self.socket.display().to_string(),
        message: e.to_string(),
      })?;

    let status = response.status();
    if !status.is_success() {
      let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| TransportError::Body(e.to_string()))?
        .to_bytes();
      return Err(TransportError::Status {
        status: status.as_u16(),
        message: error_message(&body),
      });
    }

    Ok(response.into_body())
  }
}

impl Default for DockerTransport {
  fn default() -> Self {
    Self::new(DEFAULT_DOCKER_SOCKET)
  }
}

impl fmt::Debug for DockerTransport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DockerTransport")
      .field("socket", &self.socket)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl ContainerTransport for DockerTransport {
  async fn build(
    &self,
    context: Bytes,
    image: &ImageReference,
  ) -> Result<MessageStream, TransportError> {
    let query = url::form_urlencoded::Serializer::new(String::new())
      .append_pair("t", &image.to_string())
      .append_pair("rm", "1")
      .finish();
    let body = self
      .post("/build", query, Some("application/x-tar"), None, context)
      .await?;
    Ok(message_stream(body))
  }

  async fn push(
    &self,
    image: &ImageReference,
    auth: &RegistryAuth,
  ) -> Result<MessageStream, TransportError> {
    let path = format!("/images/{}/push", image.name());
    let query = url::form_urlencoded::Serializer::new(String::new())
      .append_pair("tag", image.tag())
      .finish();
    let body = self
      .post(&path, query, None, Some(auth), Bytes::new())
      .await?;
    Ok(message_stream(body))
  }

  async fn pull(
    &self,
    image: &ImageReference,
    auth: &RegistryAuth,
  ) -> Result<MessageStream, TransportError> {
    let query = url::form_urlencoded::Serializer::new(String::new())
      .append_pair("fromImage", &image.name())
      .append_pair("tag", image.tag())
      .finish();
    let body = self
      .post("/images/create", query, None, Some(auth), Bytes::new())
      .await?;
    Ok(message_stream(body))
  }
}

/// One JSON object of the engine's progress stream.
#[derive(Debug, Default, Deserialize)]
struct EngineMessage {
  stream: Option<String>,
  status: Option<String>,
  progress: Option<String>,
  id: Option<String>,
  error: Option<String>,
  #[serde(rename = "errorDetail")]
  error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
  message: Option<String>,
}

impl EngineMessage {
  /// `None` for messages with nothing to report (blank lines, aux ids).
  fn into_transport(self) -> Option<TransportMessage> {
    if let Some(error) = self
      .error
      .or_else(|| self.error_detail.and_then(|detail| detail.message))
    {
      return Some(TransportMessage::Failed(error));
    }

    if let Some(stream) = self.stream {
      let line = stream.trim_end();
      if line.is_empty() {
        return None;
      }
      return Some(TransportMessage::Log(line.to_string()));
    }

    self.status.map(|status| TransportMessage::Progress {
      id: self.id,
      status,
      progress: self.progress,
    })
  }
}

fn error_message(body: &[u8]) -> String {
  #[derive(Deserialize)]
  struct ApiError {
    message: String,
  }

  serde_json::from_slice::<ApiError>(body)
    .map(|e| e.message)
    .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}

/// Splits a chunked byte stream into non-empty lines.
#[derive(Debug, Default)]
struct LineDecoder {
  buffer: Vec<u8>,
}

impl LineDecoder {
  fn push(&mut self, chunk: &[u8]) -> Vec<String> {
    self.buffer.extend_from_slice(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
      let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
      let line = String::from_utf8_lossy(&raw).trim().to_string();
      if !line.is_empty() {
        lines.push(line);
      }
    }
    lines
  }

  fn finish(&mut self) -> Option<String> {
    let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
    self.buffer.clear();
    (!line.is_empty()).then_some(line)
  }
}

struct StreamState {
  body: Incoming,
  decoder: LineDecoder,
  pending: VecDeque<String>,
  done: bool,
}

fn decode_line(line: String) -> Result<Option<TransportMessage>, TransportError> {
  let message: EngineMessage = serde_json::from_str(&line)
    .map_err(|source| TransportError::Decode {
      line: line.clone(),
      source,
    })?;
  Ok(message.into_transport())
}

/// Turn a streaming engine response into transport messages as the chunks
/// arrive.
fn message_stream(body: Incoming) -> MessageStream {
  let state = StreamState {
    body,
    decoder: LineDecoder::default(),
    pending: VecDeque::new(),
    done: false,
  };

  stream::try_unfold(state, |mut state| async move {
    loop {
      if let Some(line) = state.pending.pop_front() {
        match decode_line(line)? {
          Some(message) => return Ok(Some((message, state))),
          None => continue,
        }
      }

      if state.done {
        return Ok(None);
      }

      match state.body.frame().await {
        Some(Ok(frame)) => {
          if let Ok(data) = frame.into_data() {
            let lines = state.decoder.push(&data);
            state.pending.extend(lines);
          }
        }
        Some(Err(e)) => return Err(TransportError::Body(e.to_string())),
        None => {
          state.done = true;
          let rest = state.decoder.finish();
          state.pending.extend(rest);
        }
      }
    }
  })
  .boxed()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decoder_handles_split_chunks() {
    let mut decoder = LineDecoder::default();
    assert!(decoder.push(b"{\"stream\":\"Step 1/3").is_empty());
    assert_eq!(
      decoder.push(b" : FROM base\\n\"}\r\n{\"stream\":\"\\n\"}\n{\"aux\""),
      vec![
        r#"{"stream":"Step 1/3 : FROM base\n"}"#.to_string(),
        r#"{"stream":"\n"}"#.to_string(),
      ]
    );
    assert_eq!(decoder.finish(), Some(r#"{"aux""#.to_string()));
    assert_eq!(decoder.finish(), None);
  }

  #[test]
  fn test_build_log_lines() {
    let message = decode_line(r#"{"stream":"Step 1/3 : FROM base\n"}"#.to_string()).unwrap();
    assert_eq!(
      message,
      Some(TransportMessage::Log("Step 1/3 : FROM base".to_string()))
    );
    assert_eq!(decode_line(r#"{"stream":"\n"}"#.to_string()).unwrap(), None);
    assert_eq!(
      decode_line(r#"{"aux":{"ID":"sha256:abc"}}"#.to_string()).unwrap(),
      None
    );
  }

  #[test]
  fn test_push_progress() {
    let message = decode_line(
      r#"{"status":"Pushing","progressDetail":{"current":512,"total":1024},"progress":"[=====>     ]","id":"a1b2"}"#
        .to_string(),
    )
    .unwrap();
    assert_eq!(
      message,
      Some(TransportMessage::Progress {
        id: Some("a1b2".to_string()),
        status: "Pushing".to_string(),
        progress: Some("[=====>     ]".to_string()),
      })
    );
  }

  #[test]
  fn test_errors_win_over_other_fields() {
    let message = decode_line(
      r#"{"errorDetail":{"message":"unauthorized: authentication required"},"status":"Pushing"}"#
        .to_string(),
    )
    .unwrap();
    assert_eq!(
      message,
      Some(TransportMessage::Failed(
        "unauthorized: authentication required".to_string()
      ))
    );
  }

  #[test]
  fn test_malformed_line() {
    assert!(matches!(
      decode_line("not json".to_string()),
      Err(TransportError::Decode { .. })
    ));
  }

  #[test]
  fn test_error_message_prefers_json() {
    assert_eq!(error_message(br#"{"message":"no such image"}"#), "no such image");
    assert_eq!(error_message(b"page not found\n"), "page not found");
  }
}
