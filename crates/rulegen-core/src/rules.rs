use std::fmt;

use serde::Serialize;

/// One row per declared subject restriction of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelationTypeRestriction {
    pub resource_type: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_relation: Option<String>,
}

impl fmt::Display for RelationTypeRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject_relation {
            Some(rel) => write!(
                f,
                "{}({}#{}, {})",
                self.relation, self.subject_type, rel, self.resource_type
            ),
            None => write!(
                f,
                "{}({}, {})",
                self.relation, self.subject_type, self.resource_type
            ),
        }
    }
}

/// `derived_relation` holds wherever `source_relation` holds on the same object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnaryRule {
    pub resource_type: String,
    pub source_relation: String,
    pub derived_relation: String,
}

impl UnaryRule {
    pub fn new(
        resource_type: impl Into<String>,
        source_relation: impl Into<String>,
        derived_relation: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            source_relation: source_relation.into(),
            derived_relation: derived_relation.into(),
        }
    }
}

impl fmt::Display for UnaryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{t}#{derived}(subject, {t}) :- {t}#{source}(subject, {t})",
            t = self.resource_type,
            derived = self.derived_relation,
            source = self.source_relation,
        )
    }
}

/// One-hop join: `derived_relation` holds for a subject on an object of
/// `second_resource_type` when `second_relation` links that object to an object
/// of `first_resource_type` on which the subject holds `first_relation`.
///
/// Intersections reuse this shape with both resource types equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BinaryRule {
    pub first_resource_type: String,
    pub first_relation: String,
    pub second_resource_type: String,
    pub second_relation: String,
    pub derived_relation: String,
}

impl BinaryRule {
    pub fn new(
        first_resource_type: impl Into<String>,
        first_relation: impl Into<String>,
        second_resource_type: impl Into<String>,
        second_relation: impl Into<String>,
        derived_relation: impl Into<String>,
    ) -> Self {
        Self {
            first_resource_type: first_resource_type.into(),
            first_relation: first_relation.into(),
            second_resource_type: second_resource_type.into(),
            second_relation: second_relation.into(),
            derived_relation: derived_relation.into(),
        }
    }
}

impl fmt::Display for BinaryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{second}#{derived}(subject, {second}) :- {first}#{first_rel}(subject, {first}), {second}#{second_rel}({first}, {second})",
            first = self.first_resource_type,
            first_rel = self.first_relation,
            second = self.second_resource_type,
            second_rel = self.second_relation,
            derived = self.derived_relation,
        )
    }
}

/// The compiled rule base for one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaQueryRules {
    pub relation_type_restrictions: Vec<RelationTypeRestriction>,
    pub unary_rules: Vec<UnaryRule>,
    pub binary_rules: Vec<BinaryRule>,
}

impl SchemaQueryRules {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.relation_type_restrictions.len() + self.unary_rules.len() + self.binary_rules.len()
    }

    pub(crate) fn extend_rules(
        &mut self,
        unary_rules: impl IntoIterator<Item = UnaryRule>,
        binary_rules: impl IntoIterator<Item = BinaryRule>,
    ) {
        self.unary_rules.extend(unary_rules);
        self.binary_rules.extend(binary_rules);
    }
}
