use std::path::PathBuf;

use rulegen_core::CompileError;
use rulegen_core::schema::{ParseError, ValidationError, WireError};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read schema '{}': {source}", path.display())]
    ReadSchema {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("decode error: {0}")]
    Decode(#[from] WireError),

    #[error("schema validation errors: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
