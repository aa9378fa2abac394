mod resolve;
mod restrictions;

pub use resolve::{Resolution, Resolver};
pub use restrictions::extract_type_restrictions;

use std::collections::HashSet;

use crate::rules::SchemaQueryRules;
use crate::schema::types::Schema;

/// Joins a permission name with the position of an anonymous sub-expression,
/// e.g. `can_edit$0`. Never valid inside a declared name.
pub const SYNTHETIC_SEPARATOR: char = '$';

#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Accept permissions that reach themselves again, e.g.
    /// `folder.can_view = viewer + parent->can_view`, and leave the recursion to
    /// the evaluation engine. When false such schemas fail with a cycle error.
    pub allow_recursive_permissions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Reference,
    UnsupportedOperation,
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("undefined type '{type_name}' referenced from '{referenced_from}'")]
    UndefinedType {
        type_name: String,
        referenced_from: String,
    },

    #[error(
        "undefined relation '{relation}' on type '{type_name}' used as the base of hierarchical permission '{permission}'"
    )]
    UndefinedRelation {
        type_name: String,
        permission: String,
        relation: String,
    },

    #[error(
        "'{name}' is neither a relation nor a permission on type '{type_name}' (referenced from '{referenced_from}')"
    )]
    UndefinedReference {
        type_name: String,
        name: String,
        referenced_from: String,
    },

    #[error("unsupported {expression} expression in permission '{permission}' on type '{type_name}': {reason}")]
    UnsupportedOperation {
        type_name: String,
        permission: String,
        expression: &'static str,
        reason: String,
    },

    #[error("name '{name}' on type '{type_name}' contains the reserved character '$'")]
    ReservedName { type_name: String, name: String },

    #[error("cyclic permission reference: {}", path.join(" -> "))]
    Cycle {
        type_name: String,
        permission: String,
        path: Vec<String>,
    },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UndefinedType { .. }
            | Self::UndefinedRelation { .. }
            | Self::UndefinedReference { .. }
            | Self::ReservedName { .. } => ErrorKind::Reference,
            Self::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::Cycle { .. } => ErrorKind::Cycle,
        }
    }
}

pub fn compile(schema: &Schema) -> Result<SchemaQueryRules, CompileError> {
    compile_with(schema, &CompilerOptions::default())
}

/// Compiles every permission of every type, in name order, into one rule base.
///
/// A permission reached through another one is emitted where it is first
/// needed, ahead of the rules that use it, and never again.
pub fn compile_with(
    schema: &Schema,
    options: &CompilerOptions,
) -> Result<SchemaQueryRules, CompileError> {
    check_reserved_names(schema)?;

    let mut rules = SchemaQueryRules {
        relation_type_restrictions: extract_type_restrictions(schema),
        ..Default::default()
    };

    let mut resolver = Resolver::new(schema, options);
    let mut emitted = HashSet::new();
    for type_def in schema.sorted_types() {
        for permission in type_def.sorted_permissions() {
            let (_, order) = resolver.realization_order(&type_def.name, &permission.name)?;
            for key in order {
                if let Some(expansion) = resolver.expansion(&key)
                    && emitted.insert(key)
                {
                    rules.extend_rules(
                        expansion.unary.iter().cloned(),
                        expansion.binary.iter().cloned(),
                    );
                }
            }
        }
    }

    tracing::debug!(
        type_restrictions = rules.relation_type_restrictions.len(),
        unary_rules = rules.unary_rules.len(),
        binary_rules = rules.binary_rules.len(),
        "compiled schema"
    );
    Ok(rules)
}

/// Synthesized operand names use `$`, so declared names must not.
fn check_reserved_names(schema: &Schema) -> Result<(), CompileError> {
    for type_def in schema.sorted_types() {
        let declared = std::iter::once(&type_def.name)
            .chain(type_def.relations.iter().map(|r| &r.name))
            .chain(type_def.permissions.iter().map(|p| &p.name));
        for name in declared {
            if name.contains(SYNTHETIC_SEPARATOR) {
                return Err(CompileError::ReservedName {
                    type_name: type_def.name.clone(),
                    name: name.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{BinaryRule, RelationTypeRestriction, UnaryRule};
    use crate::schema::parse_schema;
    use crate::schema::types::{PermissionExpression, RelationDef, TypeDefinition, TypeRestriction};

    fn compile_source(source: &str) -> Result<SchemaQueryRules, CompileError> {
        compile(&parse_schema(source).unwrap())
    }

    #[test]
    fn union_of_relations_yields_unary_rules() {
        let rules = compile_source(
            r#"
            definition account {}
            definition subreddit {
                relation moderator: account
                relation community_appearance_editor: account
                permission can_edit_community_appearance = moderator + community_appearance_editor
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            rules.unary_rules,
            vec![
                UnaryRule::new("subreddit", "moderator", "can_edit_community_appearance"),
                UnaryRule::new(
                    "subreddit",
                    "community_appearance_editor",
                    "can_edit_community_appearance"
                ),
            ]
        );
        assert!(rules.binary_rules.is_empty());
        assert_eq!(rules.relation_type_restrictions.len(), 2);
        assert!(
            rules
                .relation_type_restrictions
                .iter()
                .all(|r| r.subject_type == "account" && r.subject_relation.is_none())
        );
    }

    #[test]
    fn hierarchical_permission_joins_across_types() {
        let rules = compile_source(
            r#"
            definition user {}
            definition folder {
                relation viewer: user
                permission can_view = viewer
            }
            definition document {
                relation parent: folder
                permission can_view = parent->can_view
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            rules.unary_rules,
            vec![UnaryRule::new("folder", "viewer", "can_view")]
        );
        assert_eq!(
            rules.binary_rules,
            vec![BinaryRule::new(
                "folder", "can_view", "document", "parent", "can_view"
            )]
        );
    }

    #[test]
    fn intersection_of_relations_yields_binary_rule() {
        let rules = compile_source(
            r#"
            definition user {}
            definition t {
                relation viewer: user
                relation allowed: user
                permission can_edit = viewer & allowed
            }
            "#,
        )
        .unwrap();

        assert!(rules.unary_rules.is_empty());
        assert_eq!(
            rules.binary_rules,
            vec![BinaryRule::new("t", "viewer", "t", "allowed", "can_edit")]
        );
    }

    #[test]
    fn type_restrictions_are_projected_in_name_order() {
        let rules = compile_source(
            r#"
            definition user {}
            definition group {
                relation member: user | group#member
            }
            definition document {
                relation viewer: user
                relation editor: group#member
            }
            "#,
        )
        .unwrap();

        let rows: Vec<_> = rules
            .relation_type_restrictions
            .iter()
            .map(RelationTypeRestriction::to_string)
            .collect();
        assert_eq!(
            rows,
            vec![
                "editor(group#member, document)",
                "viewer(user, document)",
                "member(user, group)",
                "member(group#member, group)",
            ]
        );
    }

    #[test]
    fn compiling_twice_is_identical() {
        let schema = parse_schema(
            r#"
            definition user {}
            definition org {
                relation admin: user
                permission manage = admin
                permission can_view = admin
            }
            definition folder {
                relation org: org
                relation viewer: user
                permission can_view = viewer + org->manage
            }
            definition document {
                relation parent: folder | org
                relation viewer: user
                permission can_view = viewer + parent->can_view
            }
            "#,
        )
        .unwrap();

        let mut shuffled = schema.clone();
        shuffled.types.reverse();
        for type_def in &mut shuffled.types {
            type_def.relations.reverse();
            type_def.permissions.reverse();
        }

        assert_eq!(compile(&schema).unwrap(), compile(&schema).unwrap());
        assert_eq!(compile(&schema).unwrap(), compile(&shuffled).unwrap());
    }

    #[test]
    fn exclusion_is_unsupported() {
        let err = compile_source(
            "definition user {} definition doc { relation viewer: user relation banned: user permission can_view = viewer - banned }",
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert!(matches!(
            err,
            CompileError::UnsupportedOperation { expression: "exclusion", ref permission, .. }
                if permission == "can_view"
        ));
    }

    #[test]
    fn intersection_with_three_operands_is_unsupported() {
        let err = compile_source(
            "definition user {} definition doc { relation a: user relation b: user relation c: user permission p = a & b & c }",
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert!(err.to_string().contains("exactly 2 operands"));
    }

    #[test]
    fn empty_union_is_unsupported() {
        let schema = Schema {
            types: vec![TypeDefinition::new("doc").with_permission("p", PermissionExpression::Union(vec![]))],
        };

        let err = compile(&schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn undefined_base_relation_is_a_reference_error() {
        let err = compile_source(
            "definition doc { relation viewer: doc permission can_view = parent->can_view }",
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(
            err,
            CompileError::UndefinedRelation {
                type_name: "doc".to_string(),
                permission: "can_view".to_string(),
                relation: "parent".to_string(),
            }
        );
    }

    #[test]
    fn missing_target_on_restricted_type_is_a_reference_error() {
        let err = compile_source(
            "definition folder {} definition doc { relation parent: folder permission can_view = parent->can_view }",
        )
        .unwrap_err();

        assert_eq!(
            err,
            CompileError::UndefinedReference {
                type_name: "folder".to_string(),
                name: "can_view".to_string(),
                referenced_from: "doc#can_view".to_string(),
            }
        );
    }

    #[test]
    fn undefined_restricted_type_is_a_reference_error() {
        let schema = Schema {
            types: vec![
                TypeDefinition::new("doc")
                    .with_relation(RelationDef::new("parent", vec![TypeRestriction::direct("folder")]))
                    .with_permission("view", PermissionExpression::hierarchical("parent", "view")),
            ],
        };

        let err = compile(&schema).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UndefinedType { ref type_name, .. } if type_name == "folder"
        ));
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn recursive_permission_is_a_cycle_by_default() {
        let source = r#"
            definition user {}
            definition folder {
                relation parent: folder
                relation viewer: user
                permission can_view = viewer + parent->can_view
            }
        "#;

        let err = compile_source(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
        assert!(matches!(
            err,
            CompileError::Cycle { ref path, .. }
                if path == &vec!["folder#can_view".to_string(), "folder#can_view".to_string()]
        ));
    }

    #[test]
    fn recursive_permission_compiles_when_allowed() {
        let schema = parse_schema(
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
        let options = CompilerOptions {
            allow_recursive_permissions: true,
        };

        let rules = compile_with(&schema, &options).unwrap();

        assert_eq!(
            rules.unary_rules,
            vec![UnaryRule::new("folder", "viewer", "can_view")]
        );
        assert_eq!(
            rules.binary_rules,
            vec![BinaryRule::new(
                "folder", "can_view", "folder", "parent", "can_view"
            )]
        );
    }

    #[test]
    fn shared_dependency_is_emitted_once() {
        let rules = compile_source(
            r#"
            definition user {}
            definition folder {
                relation viewer: user
                permission can_view = viewer
            }
            definition document {
                relation parent: folder
                relation owner: folder
                permission can_view = parent->can_view
                permission can_own = owner->can_view
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            rules.unary_rules,
            vec![UnaryRule::new("folder", "viewer", "can_view")]
        );
        assert_eq!(
            rules.binary_rules,
            vec![
                BinaryRule::new("folder", "can_view", "document", "owner", "can_own"),
                BinaryRule::new("folder", "can_view", "document", "parent", "can_view"),
            ]
        );
    }

    #[test]
    fn declared_name_with_separator_is_rejected() {
        let schema = Schema {
            types: vec![
                TypeDefinition::new("doc")
                    .with_relation(RelationDef::new("a", vec![TypeRestriction::direct("doc")]))
                    .with_relation(RelationDef::new("b", vec![TypeRestriction::direct("doc")]))
                    .with_permission(
                        "p$0",
                        PermissionExpression::Union(vec![PermissionExpression::unary("a")]),
                    )
                    .with_permission(
                        "p",
                        PermissionExpression::Intersection(vec![
                            PermissionExpression::Union(vec![PermissionExpression::unary("b")]),
                            PermissionExpression::unary("a"),
                        ]),
                    ),
            ],
        };

        let err = compile(&schema).unwrap_err();

        assert_eq!(
            err,
            CompileError::ReservedName {
                type_name: "doc".to_string(),
                name: "p$0".to_string(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn compile_error_message_names_the_construct() {
        let err = compile_source(
            "definition user {} definition doc { relation viewer: user relation banned: user permission can_view = viewer - banned }",
        )
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("exclusion"), "missing expression kind: {msg}");
        assert!(msg.contains("can_view"), "missing permission: {msg}");
        assert!(msg.contains("doc"), "missing type: {msg}");
    }
}
