use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub types: Vec<TypeDefinition>,
}

impl Schema {
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Type definitions ordered by name, independent of declaration order.
    pub fn sorted_types(&self) -> Vec<&TypeDefinition> {
        let mut types: Vec<_> = self.types.iter().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub relations: Vec<RelationDef>,
    pub permissions: Vec<PermissionDef>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relations: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_permission(
        mut self,
        name: impl Into<String>,
        expression: PermissionExpression,
    ) -> Self {
        self.permissions.push(PermissionDef {
            name: name.into(),
            expression,
        });
        self
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn get_permission(&self, name: &str) -> Option<&PermissionDef> {
        self.permissions.iter().find(|p| p.name == name)
    }

    pub fn sorted_relations(&self) -> Vec<&RelationDef> {
        let mut relations: Vec<_> = self.relations.iter().collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        relations
    }

    pub fn sorted_permissions(&self) -> Vec<&PermissionDef> {
        let mut permissions: Vec<_> = self.permissions.iter().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        permissions
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub type_restrictions: Vec<TypeRestriction>,
}

impl RelationDef {
    pub fn new(name: impl Into<String>, type_restrictions: Vec<TypeRestriction>) -> Self {
        Self {
            name: name.into(),
            type_restrictions,
        }
    }
}

/// A subject shape accepted by a relation: `user` or the userset `group#member`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRestriction {
    pub subject_type: String,
    pub subject_relation: Option<String>,
}

impl TypeRestriction {
    pub fn direct(subject_type: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_relation: None,
        }
    }

    pub fn userset(subject_type: impl Into<String>, subject_relation: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_relation: Some(subject_relation.into()),
        }
    }
}

impl fmt::Display for TypeRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject_relation {
            Some(rel) => write!(f, "{}#{}", self.subject_type, rel),
            None => write!(f, "{}", self.subject_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDef {
    pub name: String,
    pub expression: PermissionExpression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionExpression {
    /// A relation or permission on the same type.
    Unary(String),
    /// `base->target`: follow `base` to the related object and evaluate `target` there.
    Hierarchical { base: String, target: String },
    Union(Vec<PermissionExpression>),
    Intersection(Vec<PermissionExpression>),
    Exclusion(Box<PermissionExpression>, Box<PermissionExpression>),
}

impl PermissionExpression {
    pub fn unary(relation: impl Into<String>) -> Self {
        Self::Unary(relation.into())
    }

    pub fn hierarchical(base: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Hierarchical {
            base: base.into(),
            target: target.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unary(_) => "unary",
            Self::Hierarchical { .. } => "hierarchical",
            Self::Union(_) => "union",
            Self::Intersection(_) => "intersection",
            Self::Exclusion(..) => "exclusion",
        }
    }
}
