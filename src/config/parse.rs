use super::types::Config;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML{}: {}", yaml_origin(.path), .source)]
    YamlParse {
        path: Option<String>,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

fn yaml_origin(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" in '{}'", p),
        None => String::new(),
    }
}

/// Load, expand, and validate a config file. Validation is fail-fast: a bad
/// batch size or empty sink settings never make it past startup.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string, Some(path))
}

/// Parse and validate config from a YAML string. Split out from `load_config`
/// so tests can exercise validation without touching the filesystem.
pub fn load_config_from_str(yaml: &str) -> Result<Config, ConfigError> {
    parse_config(yaml, None)
}

fn parse_config(yaml: &str, origin: Option<&Path>) -> Result<Config, ConfigError> {
    // Expand environment variables before parsing
    let yaml_string = expand_env_vars(yaml);

    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config =
        serde_yaml::from_str(&yaml_string).map_err(|e| ConfigError::YamlParse {
            path: origin.map(|p| p.display().to_string()),
            source: e,
        })?;

    config.spool.path = expand_tilde(&config.spool.path);

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         \n\
         Either export them before starting (e.g. export EVENTHUB_SAS_TOKEN=...)\n\
         or replace the $env{{...}} references in the config file with literal values",
        unexpanded_vars.join(", ")
    )))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.batch.max_events == 0 {
        errors.push("batch.max_events must be a positive integer".to_string());
    }

    if config.sink.namespace.is_empty() {
        errors.push("sink.namespace cannot be empty".to_string());
    }
    if config.sink.hub.is_empty() {
        errors.push("sink.hub cannot be empty".to_string());
    }
    if config.sink.sas_token.is_empty() {
        errors.push("sink.sas_token cannot be empty".to_string());
    }

    if config.spool.path.as_os_str().is_empty() {
        errors.push("spool.path cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn minimal_yaml() -> &'static str {
        r#"
spool:
  path: /var/spool/flowlogs
sink:
  namespace: mynamespace.servicebus.windows.net
  hub: nw-flowlogs
  sas_token: "SharedAccessSignature sr=..."
"#
    }

    #[test]
    fn test_minimal_config_with_defaults() {
        let config = load_config_from_str(minimal_yaml()).unwrap();
        assert_eq!(config.batch.max_events, 500);
        assert_eq!(config.spool.poll_interval, Duration::from_secs(1));
        assert_eq!(config.spool.document_timeout, None);
        assert_eq!(config.sink.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_explicit_batch_size() {
        let yaml = format!("{}batch:\n  max_events: 100\n", minimal_yaml());
        let config = load_config_from_str(&yaml).unwrap();
        assert_eq!(config.batch.max_events, 100);
    }

    #[test]
    fn test_zero_batch_size_fails_fast() {
        let yaml = format!("{}batch:\n  max_events: 0\n", minimal_yaml());
        let result = load_config_from_str(&yaml);
        assert!(matches!(result, Err(ConfigError::ValidationList(_))));
    }

    #[test]
    fn test_negative_batch_size_fails_fast() {
        let yaml = format!("{}batch:\n  max_events: -5\n", minimal_yaml());
        assert!(load_config_from_str(&yaml).is_err());
    }

    #[test]
    fn test_empty_sink_settings_fail() {
        let yaml = r#"
spool:
  path: /var/spool/flowlogs
sink:
  namespace: ""
  hub: ""
  sas_token: ""
"#;
        let result = load_config_from_str(yaml);
        match result {
            Err(ConfigError::ValidationList(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("FLOWRELAY_TEST_TOKEN", "secret-token");
        let yaml = r#"
spool:
  path: /var/spool/flowlogs
sink:
  namespace: ns.servicebus.windows.net
  hub: hub
  sas_token: $env{FLOWRELAY_TEST_TOKEN}
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.sink.sas_token, "secret-token");
        std::env::remove_var("FLOWRELAY_TEST_TOKEN");
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let yaml = r#"
spool:
  path: /var/spool/flowlogs
sink:
  namespace: ns.servicebus.windows.net
  hub: hub
  sas_token: $env{FLOWRELAY_DEFINITELY_UNSET}
"#;
        let result = load_config_from_str(yaml);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_timeout_parsing() {
        let yaml = r#"
spool:
  path: /var/spool/flowlogs
  poll_interval: 5s
  document_timeout: 2m
sink:
  namespace: ns.servicebus.windows.net
  hub: hub
  sas_token: token
  request_timeout: 10s
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.spool.poll_interval, Duration::from_secs(5));
        assert_eq!(config.spool.document_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.sink.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_bad_yaml_is_a_parse_error() {
        let result = load_config_from_str("spool: [unclosed");
        match result {
            Err(ConfigError::YamlParse { path, .. }) => assert!(path.is_none()),
            other => panic!("expected a YAML parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bad_yaml_file_names_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "spool: [unclosed").unwrap();

        let error = load_config(&path).unwrap_err();
        match &error {
            ConfigError::YamlParse { path: origin, .. } => {
                assert_eq!(origin.as_deref(), Some(path.display().to_string().as_str()));
            }
            other => panic!("expected a YAML parse error, got {:?}", other),
        }
        assert!(error.to_string().contains("config.yml"));
    }

    #[test]
    fn test_infinite_document_timeout() {
        let yaml = r#"
spool:
  path: /var/spool/flowlogs
  document_timeout: infinite
sink:
  namespace: ns.servicebus.windows.net
  hub: hub
  sas_token: token
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.spool.document_timeout, None);
    }
}
