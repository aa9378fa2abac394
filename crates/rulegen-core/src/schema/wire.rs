//! Decoding of the JSON wire representation of a schema.
//!
//! The wire form keys types, relations and permissions by name. Those maps are
//! decoded into `BTreeMap`s so the resulting [`Schema`] has the same shape no
//! matter how the producer ordered its keys.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::types::{
    PermissionDef, PermissionExpression, RelationDef, Schema, TypeDefinition, TypeRestriction,
};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("type definition keyed '{key}' is named '{name}'")]
    NameMismatch { key: String, name: String },
    #[error("relation '{relation}' on type '{type_name}' has a type restriction without a resource type")]
    EmptySubjectType { type_name: String, relation: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSchema {
    #[serde(default)]
    type_definitions: BTreeMap<String, WireTypeDefinition>,
}

#[derive(Debug, Deserialize)]
struct WireTypeDefinition {
    #[serde(default)]
    name: String,
    #[serde(default)]
    relations: BTreeMap<String, WireRelation>,
    #[serde(default)]
    permissions: BTreeMap<String, WirePermission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelation {
    #[serde(default)]
    type_restrictions: Vec<WireTypeRestriction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTypeRestriction {
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    relation: String,
}

#[derive(Debug, Deserialize)]
struct WirePermission {
    expression: WireExpression,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WireExpression {
    #[serde(rename_all = "camelCase")]
    UnaryExpression { source_relation: String },
    HierarchicalExpression { base: String, target: String },
    SetExpression(WireSetExpression),
    ExclusionExpression {
        base: Box<WireExpression>,
        subtract: Box<WireExpression>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WireSetExpression {
    Union(WireOperands),
    Intersection(WireOperands),
}

#[derive(Debug, Deserialize)]
struct WireOperands {
    #[serde(default)]
    operands: Vec<WireExpression>,
}

impl From<WireExpression> for PermissionExpression {
    fn from(expr: WireExpression) -> Self {
        let convert = |operands: Vec<WireExpression>| -> Vec<PermissionExpression> {
            operands.into_iter().map(Self::from).collect()
        };
        match expr {
            WireExpression::UnaryExpression { source_relation } => Self::Unary(source_relation),
            WireExpression::HierarchicalExpression { base, target } => {
                Self::Hierarchical { base, target }
            }
            WireExpression::SetExpression(WireSetExpression::Union(set)) => {
                Self::Union(convert(set.operands))
            }
            WireExpression::SetExpression(WireSetExpression::Intersection(set)) => {
                Self::Intersection(convert(set.operands))
            }
            WireExpression::ExclusionExpression { base, subtract } => Self::Exclusion(
                Box::new(Self::from(*base)),
                Box::new(Self::from(*subtract)),
            ),
        }
    }
}

pub fn decode_schema(input: &str) -> Result<Schema, WireError> {
    let wire: WireSchema = serde_json::from_str(input)?;

    let mut types = Vec::with_capacity(wire.type_definitions.len());
    for (key, def) in wire.type_definitions {
        if !def.name.is_empty() && def.name != key {
            return Err(WireError::NameMismatch {
                key,
                name: def.name,
            });
        }

        let mut relations = Vec::with_capacity(def.relations.len());
        for (relation, wire_relation) in def.relations {
            let mut type_restrictions = Vec::with_capacity(wire_relation.type_restrictions.len());
            for restriction in wire_relation.type_restrictions {
                if restriction.resource_type.is_empty() {
                    return Err(WireError::EmptySubjectType {
                        type_name: key,
                        relation,
                    });
                }
                type_restrictions.push(TypeRestriction {
                    subject_type: restriction.resource_type,
                    subject_relation: Some(restriction.relation).filter(|r| !r.is_empty()),
                });
            }
            relations.push(RelationDef {
                name: relation,
                type_restrictions,
            });
        }

        let permissions = def
            .permissions
            .into_iter()
            .map(|(name, permission)| PermissionDef {
                name,
                expression: permission.expression.into(),
            })
            .collect();

        types.push(TypeDefinition {
            name: key,
            relations,
            permissions,
        });
    }

    tracing::debug!(types = types.len(), "decoded wire schema");
    Ok(Schema { types })
}
