use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading a [`DispatcherConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid dispatcher config: {0}")]
  Toml(#[from] toml::de::Error),
}

/// Settings for a [`Dispatcher`](crate::Dispatcher) instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DispatcherConfig {
  /// Label attached to every log record the dispatcher emits.
  pub name:              String,
  /// Emit a trace record for every callback invocation and `wait_for`
  /// resolution.
  pub trace_invocations: bool,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      name:              "dispatcher".to_string(),
      trace_invocations: false,
    }
  }
}

impl DispatcherConfig {
  pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(source)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let config = DispatcherConfig::from_toml_str("").unwrap();
    assert_eq!(config, DispatcherConfig::default());
    assert_eq!(config.name, "dispatcher");
    assert!(!config.trace_invocations);
  }

  #[test]
  fn parses_kebab_case_keys() {
    let config = DispatcherConfig::from_toml_str(
      r#"
        name = "app"
        trace-invocations = true
      "#,
    )
    .unwrap();
    assert_eq!(config.name, "app");
    assert!(config.trace_invocations);
  }

  #[test]
  fn rejects_unknown_keys() {
    let err = DispatcherConfig::from_toml_str("priority = 3").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
  }
}
