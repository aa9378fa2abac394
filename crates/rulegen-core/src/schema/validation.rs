use super::types::Schema;
use crate::compiler::SYNTHETIC_SEPARATOR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLimits {
    pub max_types: usize,
    pub max_relations_per_type: usize,
    pub max_permissions_per_type: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_types: 50,
            max_relations_per_type: 30,
            max_permissions_per_type: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("too many types: {count} exceeds limit of {limit}")]
    TooManyTypes { count: usize, limit: usize },
    #[error("too many relations in type '{type_name}': {count} exceeds limit of {limit}")]
    TooManyRelations {
        type_name: String,
        count: usize,
        limit: usize,
    },
    #[error("too many permissions in type '{type_name}': {count} exceeds limit of {limit}")]
    TooManyPermissions {
        type_name: String,
        count: usize,
        limit: usize,
    },
    #[error("name '{name}' contains the reserved character '$'")]
    ReservedCharacter { name: String },
    #[error("'{name}' is declared as both a relation and a permission on type '{type_name}'")]
    NameConflict { type_name: String, name: String },
    #[error("relation '{relation}' on type '{type_name}' references undefined type '{subject_type}'")]
    UndefinedSubjectType {
        type_name: String,
        relation: String,
        subject_type: String,
    },
}

/// Checks a schema before compilation, reporting every problem found.
pub fn validate_schema(schema: &Schema, limits: &SchemaLimits) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if schema.types.len() > limits.max_types {
        errors.push(ValidationError::TooManyTypes {
            count: schema.types.len(),
            limit: limits.max_types,
        });
    }

    for type_def in &schema.types {
        if type_def.relations.len() > limits.max_relations_per_type {
            errors.push(ValidationError::TooManyRelations {
                type_name: type_def.name.clone(),
                count: type_def.relations.len(),
                limit: limits.max_relations_per_type,
            });
        }
        if type_def.permissions.len() > limits.max_permissions_per_type {
            errors.push(ValidationError::TooManyPermissions {
                type_name: type_def.name.clone(),
                count: type_def.permissions.len(),
                limit: limits.max_permissions_per_type,
            });
        }

        let declared = std::iter::once(&type_def.name)
            .chain(type_def.relations.iter().map(|r| &r.name))
            .chain(type_def.permissions.iter().map(|p| &p.name));
        for name in declared {
            if name.contains(SYNTHETIC_SEPARATOR) {
                errors.push(ValidationError::ReservedCharacter { name: name.clone() });
            }
        }

        for relation in &type_def.relations {
            if type_def.get_permission(&relation.name).is_some() {
                errors.push(ValidationError::NameConflict {
                    type_name: type_def.name.clone(),
                    name: relation.name.clone(),
                });
            }
            for restriction in &relation.type_restrictions {
                if schema.get_type(&restriction.subject_type).is_none() {
                    errors.push(ValidationError::UndefinedSubjectType {
                        type_name: type_def.name.clone(),
                        relation: relation.name.clone(),
                        subject_type: restriction.subject_type.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
