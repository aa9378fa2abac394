//! The work behind each subcommand, kept apart from process setup so it can be
//! driven directly from tests.

use std::path::Path;

use rulegen_core::schema::types::Schema;
use rulegen_core::schema::{decode_schema, parse_schema, validate_schema};
use rulegen_core::{SchemaQueryRules, compile_with};

use crate::cli::{Command, InputFormat};
use crate::config::{AppConfig, OutputFormat};
use crate::error::CliError;

/// Runs `command` and returns what it prints on stdout.
pub fn execute(command: &Command, config: &AppConfig) -> Result<String, CliError> {
    match command {
        Command::Compile {
            schema_path,
            input_format,
            output_format,
        } => {
            let rules = compile_file(schema_path, *input_format, config)?;
            let format = output_format.unwrap_or(config.output.format);
            render(&rules, format)
        }
        Command::Check {
            schema_path,
            input_format,
        } => {
            let rules = compile_file(schema_path, *input_format, config)?;
            Ok(summary(&rules))
        }
    }
}

pub fn load_schema(path: &Path, input_format: InputFormat) -> Result<Schema, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::ReadSchema {
        path: path.to_path_buf(),
        source,
    })?;

    let schema = match input_format.resolve(path) {
        InputFormat::Json => decode_schema(&source)?,
        _ => parse_schema(&source)?,
    };

    tracing::info!(
        path = %path.display(),
        types = schema.types.len(),
        "loaded schema"
    );
    Ok(schema)
}

pub fn compile_file(
    path: &Path,
    input_format: InputFormat,
    config: &AppConfig,
) -> Result<SchemaQueryRules, CliError> {
    let schema = load_schema(path, input_format)?;
    validate_schema(&schema, &config.to_schema_limits()).map_err(CliError::Validation)?;

    let rules = compile_with(&schema, &config.to_compiler_options())?;
    tracing::info!(
        type_restrictions = rules.relation_type_restrictions.len(),
        unary_rules = rules.unary_rules.len(),
        binary_rules = rules.binary_rules.len(),
        "compiled schema"
    );
    Ok(rules)
}

pub fn render(rules: &SchemaQueryRules, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Sql => Ok(rules.to_sql()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rules)?),
        OutputFormat::Log => Ok(log_rules(rules)),
    }
}

fn log_rules(rules: &SchemaQueryRules) -> String {
    let mut lines = Vec::with_capacity(rules.len());
    for restriction in &rules.relation_type_restrictions {
        tracing::info!(rule = %restriction, "type restriction");
        lines.push(restriction.to_string());
    }
    for rule in &rules.unary_rules {
        tracing::info!(rule = %rule, "unary rule");
        lines.push(rule.to_string());
    }
    for rule in &rules.binary_rules {
        tracing::info!(rule = %rule, "binary rule");
        lines.push(rule.to_string());
    }
    lines.join("\n")
}

fn summary(rules: &SchemaQueryRules) -> String {
    format!(
        "schema ok: {} type restrictions, {} unary rules, {} binary rules",
        rules.relation_type_restrictions.len(),
        rules.unary_rules.len(),
        rules.binary_rules.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulegen_core::{BinaryRule, RelationTypeRestriction, UnaryRule};

    fn sample_rules() -> SchemaQueryRules {
        SchemaQueryRules {
            relation_type_restrictions: vec![RelationTypeRestriction {
                resource_type: "folder".to_string(),
                relation: "viewer".to_string(),
                subject_type: "user".to_string(),
                subject_relation: None,
            }],
            unary_rules: vec![UnaryRule::new("folder", "viewer", "can_view")],
            binary_rules: vec![BinaryRule::new(
                "folder", "can_view", "document", "parent", "can_view",
            )],
        }
    }

    #[test]
    fn log_format_prints_one_clause_per_line() {
        let output = render(&sample_rules(), OutputFormat::Log).unwrap();

        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec![
                "viewer(user, folder)",
                "folder#can_view(subject, folder) :- folder#viewer(subject, folder)",
                "document#can_view(subject, document) :- folder#can_view(subject, folder), document#parent(folder, document)",
            ]
        );
    }

    #[test]
    fn json_format_uses_snake_case_fields() {
        let output = render(&sample_rules(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(
            value["relation_type_restrictions"][0]["subject_relation"],
            serde_json::Value::Null
        );
        assert_eq!(value["unary_rules"][0]["derived_relation"], "can_view");
        assert_eq!(value["binary_rules"][0]["second_relation"], "parent");
    }

    #[test]
    fn sql_format_matches_core_renderer() {
        let rules = sample_rules();

        assert_eq!(render(&rules, OutputFormat::Sql).unwrap(), rules.to_sql());
    }

    #[test]
    fn summary_counts_each_sequence() {
        assert_eq!(
            summary(&sample_rules()),
            "schema ok: 1 type restrictions, 1 unary rules, 1 binary rules"
        );
    }

    #[test]
    fn missing_schema_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.zed");

        let err = load_schema(&path, InputFormat::Auto).unwrap_err();

        assert!(matches!(
            err,
            CliError::ReadSchema { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound
        ));
    }

    #[test]
    fn validation_failures_stop_compilation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.zed");
        std::fs::write(
            &path,
            "definition doc { relation viewer: user relation owner: team }",
        )
        .unwrap();

        let err = compile_file(&path, InputFormat::Dsl, &AppConfig::default()).unwrap_err();

        assert!(matches!(err, CliError::Validation(ref errors) if errors.len() == 2));
    }

    #[test]
    fn recursion_follows_compiler_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.zed");
        std::fs::write(
            &path,
            r#"
            definition user {}
            definition folder {
                relation parent: folder
                relation viewer: user
                permission can_view = viewer + parent->can_view
            }
            "#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        assert!(matches!(
            compile_file(&path, InputFormat::Auto, &config),
            Err(CliError::Compile(_))
        ));

        config.compiler.allow_recursive_permissions = true;
        let rules = compile_file(&path, InputFormat::Auto, &config).unwrap();
        assert_eq!(rules.binary_rules.len(), 1);
    }
}
