use crate::rules::RelationTypeRestriction;
use crate::schema::types::Schema;

/// One row per declared restriction, ordered by type name, then relation name,
/// then declaration order within the relation.
pub fn extract_type_restrictions(schema: &Schema) -> Vec<RelationTypeRestriction> {
    schema
        .sorted_types()
        .into_iter()
        .flat_map(|type_def| {
            type_def.sorted_relations().into_iter().flat_map(move |relation| {
                relation
                    .type_restrictions
                    .iter()
                    .map(move |restriction| RelationTypeRestriction {
                        resource_type: type_def.name.clone(),
                        relation: relation.name.clone(),
                        subject_type: restriction.subject_type.clone(),
                        subject_relation: restriction.subject_relation.clone(),
                    })
            })
        })
        .collect()
}
