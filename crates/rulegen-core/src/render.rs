//! SQL rendering of a compiled rule base.
//!
//! Each non-empty rule sequence becomes one multi-row `INSERT` against its
//! table; statements are separated by a blank line.

use crate::rules::SchemaQueryRules;

pub const TYPE_RESTRICTIONS_TABLE: &str = "type_restrictions";
pub const UNARY_RULES_TABLE: &str = "unary_rules";
pub const BINARY_RULES_TABLE: &str = "binary_rules";

pub fn to_sql(rules: &SchemaQueryRules) -> String {
    let statements = [
        insert_statement(
            TYPE_RESTRICTIONS_TABLE,
            rules.relation_type_restrictions.iter().map(|r| {
                [
                    r.resource_type.as_str(),
                    r.relation.as_str(),
                    r.subject_type.as_str(),
                    r.subject_relation.as_deref().unwrap_or(""),
                ]
            }),
        ),
        insert_statement(
            UNARY_RULES_TABLE,
            rules.unary_rules.iter().map(|r| {
                [
                    r.resource_type.as_str(),
                    r.source_relation.as_str(),
                    r.derived_relation.as_str(),
                ]
            }),
        ),
        insert_statement(
            BINARY_RULES_TABLE,
            rules.binary_rules.iter().map(|r| {
                [
                    r.first_resource_type.as_str(),
                    r.first_relation.as_str(),
                    r.second_resource_type.as_str(),
                    r.second_relation.as_str(),
                    r.derived_relation.as_str(),
                ]
            }),
        ),
    ];

    statements.into_iter().flatten().collect::<Vec<_>>().join("\n\n")
}

impl SchemaQueryRules {
    pub fn to_sql(&self) -> String {
        to_sql(self)
    }
}

fn insert_statement<'a, I, R>(table: &str, rows: I) -> Option<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = &'a str>,
{
    let rows: Vec<String> = rows
        .into_iter()
        .map(|row| {
            let values: Vec<String> = row.into_iter().map(quote).collect();
            format!("({})", values.join(", "))
        })
        .collect();

    if rows.is_empty() {
        return None;
    }
    Some(format!("INSERT INTO {table} VALUES\n{};", rows.join(",\n")))
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
