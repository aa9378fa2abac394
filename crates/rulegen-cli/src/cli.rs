use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::OutputFormat;

const LONG_ABOUT: &str = "\
Compile ReBAC schemas into query rules.

Schemas are validated before compilation. By default a schema may declare at
most 50 types, 30 relations per type and 30 permissions per type; raise these
in the [schema_limits] section of the config file or with RULEGEN_MAX_TYPES.";

#[derive(Debug, Parser)]
#[command(
    name = "rulegen",
    version,
    about = "Compile ReBAC schemas into query rules",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a schema and print the rules.
    Compile {
        #[arg(long)]
        schema_path: PathBuf,

        #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
        input_format: InputFormat,

        /// Overrides `output.format` from the config file.
        #[arg(long, value_enum)]
        output_format: Option<OutputFormat>,
    },
    /// Validate and compile a schema without printing the rules.
    Check {
        #[arg(long)]
        schema_path: PathBuf,

        #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
        input_format: InputFormat,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    #[default]
    Auto,
    Dsl,
    Json,
}

impl InputFormat {
    /// Settles `Auto` by file extension: `.json` is the wire form, anything
    /// else is DSL.
    pub fn resolve(self, path: &Path) -> InputFormat {
        match self {
            InputFormat::Auto => {
                let is_json = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if is_json {
                    InputFormat::Json
                } else {
                    InputFormat::Dsl
                }
            }
            other => other,
        }
    }
}
