use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::query_builder::DEFAULT_MAX_JOINS;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Query compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// YAML schema declaration; the built-in analytics schema when unset
    pub schema_file: Option<String>,

    /// Table queried when none is named
    #[validate(length(min = 1, message = "Default table cannot be empty"))]
    pub default_table: String,

    /// Run the schema validator before compiling anything
    pub validate_schema: bool,

    /// Lazy joins a single query may register
    #[validate(range(min = 1, max = 64, message = "Max joins must be between 1 and 64"))]
    pub max_joins: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            schema_file: None,
            default_table: "events".to_string(),
            validate_schema: true,
            max_joins: DEFAULT_MAX_JOINS,
        }
    }
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            schema_file: match env::var("EVENTQL_SCHEMA_FILE") {
                Ok(path) if !path.is_empty() => Some(path),
                Ok(_) | Err(env::VarError::NotPresent) => None,
                Err(e) => return Err(ConfigError::EnvVar(e)),
            },
            default_table: env::var("EVENTQL_DEFAULT_TABLE")
                .unwrap_or_else(|_| "events".to_string()),
            validate_schema: parse_env_var("EVENTQL_VALIDATE_SCHEMA", "true")?,
            max_joins: parse_env_var("EVENTQL_MAX_JOINS", &DEFAULT_MAX_JOINS.to_string())?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides on top of this configuration
    pub fn merge(&mut self, cli: CliConfig) -> Result<(), ConfigError> {
        if let Some(schema_file) = cli.schema_file {
            self.schema_file = Some(schema_file);
        }
        if let Some(default_table) = cli.default_table {
            self.default_table = default_table;
        }
        if let Some(validate_schema) = cli.validate_schema {
            self.validate_schema = validate_schema;
        }
        if let Some(max_joins) = cli.max_joins {
            self.max_joins = max_joins;
        }
        self.validate()?;
        Ok(())
    }
}

/// CLI configuration (parsed from command line arguments); unset values keep
/// whatever the environment or config file provided
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub schema_file: Option<String>,
    pub default_table: Option<String>,
    pub validate_schema: Option<bool>,
    pub max_joins: Option<u32>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
