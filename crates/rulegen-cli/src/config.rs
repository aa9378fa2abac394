use serde::Deserialize;
use std::path::Path;

use rulegen_core::CompilerOptions;
use rulegen_core::schema::SchemaLimits;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub output: OutputConfig,
    pub compiler: CompilerConfig,
    pub schema_limits: SchemaLimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// How `compile` prints the rule base on stdout.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Sql,
    /// One Datalog-style clause per line, each also logged.
    Log,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub allow_recursive_permissions: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaLimitsConfig {
    pub max_types: usize,
    pub max_relations_per_type: usize,
    pub max_permissions_per_type: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl Default for SchemaLimitsConfig {
    fn default() -> Self {
        let limits = SchemaLimits::default();
        Self {
            max_types: limits.max_types,
            max_relations_per_type: limits.max_relations_per_type,
            max_permissions_per_type: limits.max_permissions_per_type,
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RULEGEN_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("RULEGEN_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("RULEGEN_OUTPUT_FORMAT") {
            match v.as_str() {
                "sql" => self.output.format = OutputFormat::Sql,
                "log" => self.output.format = OutputFormat::Log,
                "json" => self.output.format = OutputFormat::Json,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("RULEGEN_ALLOW_RECURSIVE_PERMISSIONS")
            && let Ok(allow) = v.parse()
        {
            self.compiler.allow_recursive_permissions = allow;
        }
        if let Ok(v) = std::env::var("RULEGEN_MAX_TYPES")
            && let Ok(n) = v.parse()
        {
            self.schema_limits.max_types = n;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_limits.max_types == 0 {
            return Err(ConfigError::Validation(
                "schema_limits.max_types must be non-zero".to_string(),
            ));
        }
        if self.schema_limits.max_relations_per_type == 0 {
            return Err(ConfigError::Validation(
                "schema_limits.max_relations_per_type must be non-zero".to_string(),
            ));
        }
        if self.schema_limits.max_permissions_per_type == 0 {
            return Err(ConfigError::Validation(
                "schema_limits.max_permissions_per_type must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            allow_recursive_permissions: self.compiler.allow_recursive_permissions,
        }
    }

    pub fn to_schema_limits(&self) -> SchemaLimits {
        SchemaLimits {
            max_types: self.schema_limits.max_types,
            max_relations_per_type: self.schema_limits.max_relations_per_type,
            max_permissions_per_type: self.schema_limits.max_permissions_per_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
