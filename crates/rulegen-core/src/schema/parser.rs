use std::collections::HashSet;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::types::{
    PermissionDef, PermissionExpression, RelationDef, Schema, TypeDefinition, TypeRestriction,
};

#[derive(Parser)]
#[grammar = "schema/grammar.pest"]
struct SchemaParser;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error(
        "mixed operators in permission expression: use parentheses to combine +, & and -"
    )]
    MixedOperators,
    #[error("exclusion (-) supports exactly two operands: base - excluded")]
    MultipleExclusions,
    #[error("duplicate type: {0}")]
    DuplicateType(String),
    #[error("duplicate relation '{relation}' in type '{type_name}'")]
    DuplicateRelation { type_name: String, relation: String },
    #[error("duplicate permission '{permission}' in type '{type_name}'")]
    DuplicatePermission {
        type_name: String,
        permission: String,
    },
}

pub fn parse_schema(input: &str) -> Result<Schema, ParseError> {
    let pairs =
        SchemaParser::parse(Rule::schema, input).map_err(|e| ParseError::Syntax(e.to_string()))?;

    let mut types = Vec::new();
    let mut seen_types = HashSet::new();

    for pair in pairs {
        if pair.as_rule() != Rule::schema {
            continue;
        }
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::definition {
                let type_def = parse_definition(inner)?;
                if !seen_types.insert(type_def.name.clone()) {
                    return Err(ParseError::DuplicateType(type_def.name));
                }
                types.push(type_def);
            }
        }
    }

    tracing::debug!(types = types.len(), "parsed schema source");
    Ok(Schema { types })
}

fn unexpected_rule(rule: Rule) -> ParseError {
    ParseError::Syntax(format!("unexpected rule: {rule:?}"))
}

fn missing_token(context: &str) -> ParseError {
    ParseError::Syntax(format!("missing token: {context}"))
}

fn next_identifier(
    inner: &mut pest::iterators::Pairs<'_, Rule>,
    context: &str,
) -> Result<String, ParseError> {
    inner
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| missing_token(context))
}

fn parse_definition(pair: Pair<'_, Rule>) -> Result<TypeDefinition, ParseError> {
    let mut inner = pair.into_inner();
    let name = next_identifier(&mut inner, "definition name")?;
    let body = inner
        .next()
        .ok_or_else(|| missing_token("definition body"))?;

    let mut relations = Vec::new();
    let mut permissions = Vec::new();
    let mut seen_relations = HashSet::new();
    let mut seen_permissions = HashSet::new();

    for item in body.into_inner() {
        match item.as_rule() {
            Rule::relation_def => {
                let rel = parse_relation_def(item)?;
                if !seen_relations.insert(rel.name.clone()) {
                    return Err(ParseError::DuplicateRelation {
                        type_name: name,
                        relation: rel.name,
                    });
                }
                relations.push(rel);
            }
            Rule::permission_def => {
                let perm = parse_permission_def(item)?;
                if !seen_permissions.insert(perm.name.clone()) {
                    return Err(ParseError::DuplicatePermission {
                        type_name: name,
                        permission: perm.name,
                    });
                }
                permissions.push(perm);
            }
            _ => {}
        }
    }

    Ok(TypeDefinition {
        name,
        relations,
        permissions,
    })
}

fn parse_relation_def(pair: Pair<'_, Rule>) -> Result<RelationDef, ParseError> {
    let mut inner = pair.into_inner();
    let name = next_identifier(&mut inner, "relation name")?;
    let subject_type_list = inner
        .next()
        .ok_or_else(|| missing_token("subject type list"))?;

    let type_restrictions = subject_type_list
        .into_inner()
        .map(parse_type_restriction)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RelationDef {
        name,
        type_restrictions,
    })
}

fn parse_type_restriction(pair: Pair<'_, Rule>) -> Result<TypeRestriction, ParseError> {
    let mut inner = pair.into_inner();
    let subject_type = next_identifier(&mut inner, "subject type name")?;
    let subject_relation = inner.next().map(|p| p.as_str().to_string());

    Ok(TypeRestriction {
        subject_type,
        subject_relation,
    })
}

fn parse_permission_def(pair: Pair<'_, Rule>) -> Result<PermissionDef, ParseError> {
    let mut inner = pair.into_inner();
    let name = next_identifier(&mut inner, "permission name")?;
    let expr = inner
        .next()
        .ok_or_else(|| missing_token("permission expression"))?;
    let expression = parse_permission_expr(expr)?;

    Ok(PermissionDef { name, expression })
}

fn parse_permission_expr(pair: Pair<'_, Rule>) -> Result<PermissionExpression, ParseError> {
    let mut inner = pair.into_inner();
    let first = parse_permission_term(
        inner
            .next()
            .ok_or_else(|| missing_token("permission term"))?,
    )?;

    let mut ops_and_terms: Vec<(Rule, PermissionExpression)> = Vec::new();

    while let Some(op) = inner.next() {
        let term = parse_permission_term(
            inner
                .next()
                .ok_or_else(|| missing_token("permission term after operator"))?,
        )?;
        ops_and_terms.push((op.as_rule(), term));
    }

    let Some(&(first_op, _)) = ops_and_terms.first() else {
        return Ok(first);
    };

    if ops_and_terms.iter().any(|(op, _)| *op != first_op) {
        return Err(ParseError::MixedOperators);
    }

    match first_op {
        Rule::union_op | Rule::intersection_op => {
            let mut children = vec![first];
            children.extend(ops_and_terms.into_iter().map(|(_, t)| t));
            if first_op == Rule::union_op {
                Ok(PermissionExpression::Union(children))
            } else {
                Ok(PermissionExpression::Intersection(children))
            }
        }
        Rule::exclusion_op => {
            if ops_and_terms.len() != 1 {
                return Err(ParseError::MultipleExclusions);
            }
            let (_, subtract) = ops_and_terms
                .into_iter()
                .next()
                .ok_or_else(|| missing_token("exclusion operand"))?;
            Ok(PermissionExpression::Exclusion(
                Box::new(first),
                Box::new(subtract),
            ))
        }
        other => Err(unexpected_rule(other)),
    }
}

fn parse_permission_term(pair: Pair<'_, Rule>) -> Result<PermissionExpression, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing_token("permission term content"))?;
    match inner.as_rule() {
        Rule::arrow_expr => {
            let mut parts = inner.into_inner();
            let base = next_identifier(&mut parts, "arrow base relation")?;
            let target = next_identifier(&mut parts, "arrow target")?;
            Ok(PermissionExpression::Hierarchical { base, target })
        }
        Rule::permission_expr => parse_permission_expr(inner),
        Rule::identifier => Ok(PermissionExpression::Unary(inner.as_str().to_string())),
        other => Err(unexpected_rule(other)),
    }
}
