//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("hosts = 3"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_error() {
        let err = parse_config(
            r#"
            [[hosts]]
            name = "a"
            [[hosts.contexts]]
            path = "app"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().starts_with("Validation failed: "));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/valve.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
