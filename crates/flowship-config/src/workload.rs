use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A parameter supplied to the workload at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
  Bool(bool),
  Integer(i64),
  Float(f64),
  String(String),
}

impl fmt::Display for ParameterValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Bool(v) => write!(f, "{}", v),
      Self::Integer(v) => write!(f, "{}", v),
      Self::Float(v) => write!(f, "{}", v),
      Self::String(v) => f.write_str(v),
    }
  }
}

impl From<&str> for ParameterValue {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<String> for ParameterValue {
  fn from(value: String) -> Self {
    Self::String(value)
  }
}

impl From<bool> for ParameterValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<i64> for ParameterValue {
  fn from(value: i64) -> Self {
    Self::Integer(value)
  }
}

impl From<f64> for ParameterValue {
  fn from(value: f64) -> Self {
    Self::Float(value)
  }
}

/// The opaque unit of work to publish: a named directory bundle.
///
/// What the bundle does is irrelevant to publication; only its files and the
/// parameters handed to it at execution time are carried along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
  pub name: String,
  pub path: PathBuf,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub parameters: BTreeMap<String, ParameterValue>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub labels: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub work_queue: Option<String>,
}

impl Workload {
  pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      parameters: BTreeMap::new(),
      labels: Vec::new(),
      work_queue: None,
    }
  }

  pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
    self.parameters.insert(key.into(), value.into());
    self
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.labels.push(label.into());
    self
  }

  pub fn with_work_queue(mut self, queue: impl Into<String>) -> Self {
    self.work_queue = Some(queue.into());
    self
  }

  /// The name ends up in directory names, object keys and image metadata,
  /// so it is restricted to `[A-Za-z0-9._-]`.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.is_empty() {
      return Err(ConfigError::InvalidWorkload {
        message: "name must not be empty".to_string(),
      });
    }
    if let Some(c) = self
      .name
      .chars()
      .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
      return Err(ConfigError::InvalidWorkload {
        message: format!("name '{}' contains unsupported character '{}'", self.name, c),
      });
    }
    if self.name.starts_with('.') {
      return Err(ConfigError::InvalidWorkload {
        message: format!("name '{}' must not start with '.'", self.name),
      });
    }
    if self.path.as_os_str().is_empty() {
      return Err(ConfigError::InvalidWorkload {
        message: "path must not be empty".to_string(),
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parameter_values_deserialize_untagged() {
    let params: BTreeMap<String, ParameterValue> =
      serde_json::from_str(r#"{"city": "Paris", "days": 3, "ratio": 0.5, "metric": true}"#)
        .unwrap();
    assert_eq!(params["city"], ParameterValue::String("Paris".to_string()));
    assert_eq!(params["days"], ParameterValue::Integer(3));
    assert_eq!(params["ratio"], ParameterValue::Float(0.5));
    assert_eq!(params["metric"], ParameterValue::Bool(true));
  }

  #[test]
  fn test_builder() {
    let workload = Workload::new("paris-weather", "./bundle")
      .with_parameter("city", "Paris")
      .with_parameter("use_ssl", false)
      .with_label("development");
    assert_eq!(workload.parameters.len(), 2);
    assert_eq!(workload.labels, vec!["development".to_string()]);
    assert!(workload.validate().is_ok());
  }

  #[test]
  fn test_validate_rejects_path_separators_in_name() {
    let workload = Workload::new("../escape", "./bundle");
    assert!(matches!(
      workload.validate(),
      Err(ConfigError::InvalidWorkload { .. })
    ));
  }

  #[test]
  fn test_validate_rejects_empty_name() {
    assert!(Workload::new("", "./bundle").validate().is_err());
  }
}
