use std::collections::{HashMap, HashSet};

use crate::rules::{BinaryRule, UnaryRule};
use crate::schema::types::{PermissionExpression, Schema, TypeDefinition};

use super::{CompileError, CompilerOptions, SYNTHETIC_SEPARATOR};

/// `(type, permission)`.
pub(crate) type PermissionKey = (String, String);

/// Rules produced by a single [`Resolver::resolve`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Name under which other rules can reference the resolved node.
    pub identity: String,
    pub unary_rules: Vec<UnaryRule>,
    pub binary_rules: Vec<BinaryRule>,
}

/// The rules one permission derives itself, plus the permissions they rely on.
#[derive(Debug, Default)]
pub(crate) struct Expansion {
    pub(crate) unary: Vec<UnaryRule>,
    pub(crate) binary: Vec<BinaryRule>,
    dependencies: Vec<PermissionKey>,
}

/// Resolves permissions into rules.
///
/// Each finished permission is cached with its own rules and the permissions
/// those rules reference, so repeated calls are cheap and return the same
/// [`Resolution`].
pub struct Resolver<'s> {
    schema: &'s Schema,
    allow_recursive: bool,
    expanded: HashMap<PermissionKey, Expansion>,
    in_progress: Vec<PermissionKey>,
}

impl<'s> Resolver<'s> {
    pub fn new(schema: &'s Schema, options: &CompilerOptions) -> Self {
        Self {
            schema,
            allow_recursive: options.allow_recursive_permissions,
            expanded: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Resolves `name` on `type_name` into every rule needed to realize it,
    /// including those of permissions reached through it. A relation resolves
    /// to itself with no rules.
    pub fn resolve(&mut self, type_name: &str, name: &str) -> Result<Resolution, CompileError> {
        let (identity, order) = self.realization_order(type_name, name)?;

        let mut resolution = Resolution {
            identity,
            ..Default::default()
        };
        for key in &order {
            if let Some(expansion) = self.expansion(key) {
                resolution.unary_rules.extend(expansion.unary.iter().cloned());
                resolution.binary_rules.extend(expansion.binary.iter().cloned());
            }
        }
        Ok(resolution)
    }

    /// Identity of `name` plus every permission it relies on, dependencies
    /// before dependents, each listed once.
    pub(crate) fn realization_order(
        &mut self,
        type_name: &str,
        name: &str,
    ) -> Result<(String, Vec<PermissionKey>), CompileError> {
        let referenced_from = format!("{type_name}#{name}");
        let mut roots = Vec::new();
        let identity = match self.resolve_name(type_name, name, &referenced_from, &mut roots) {
            Ok(identity) => identity,
            Err(e) => {
                // Under recursion a finished permission may rely on the one
                // that just failed.
                self.expanded.clear();
                return Err(e);
            }
        };

        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for key in &roots {
            self.collect(key, &mut visited, &mut order);
        }
        Ok((identity, order))
    }

    pub(crate) fn expansion(&self, key: &PermissionKey) -> Option<&Expansion> {
        self.expanded.get(key)
    }

    fn collect(
        &self,
        key: &PermissionKey,
        visited: &mut HashSet<PermissionKey>,
        order: &mut Vec<PermissionKey>,
    ) {
        if !visited.insert(key.clone()) {
            return;
        }
        if let Some(expansion) = self.expanded.get(key) {
            for dependency in &expansion.dependencies {
                self.collect(dependency, visited, order);
            }
        }
        order.push(key.clone());
    }

    fn resolve_name(
        &mut self,
        type_name: &str,
        name: &str,
        referenced_from: &str,
        dependencies: &mut Vec<PermissionKey>,
    ) -> Result<String, CompileError> {
        let schema = self.schema;
        let type_def = schema
            .get_type(type_name)
            .ok_or_else(|| CompileError::UndefinedType {
                type_name: type_name.to_string(),
                referenced_from: referenced_from.to_string(),
            })?;

        if type_def.get_relation(name).is_some() {
            return Ok(name.to_string());
        }

        let permission =
            type_def
                .get_permission(name)
                .ok_or_else(|| CompileError::UndefinedReference {
                    type_name: type_name.to_string(),
                    name: name.to_string(),
                    referenced_from: referenced_from.to_string(),
                })?;

        let key = (type_name.to_string(), name.to_string());
        if self.expanded.contains_key(&key) {
            dependencies.push(key);
            return Ok(name.to_string());
        }

        if self.in_progress.contains(&key) {
            if self.allow_recursive {
                dependencies.push(key);
                return Ok(name.to_string());
            }
            let mut path: Vec<String> = self
                .in_progress
                .iter()
                .skip_while(|entry| **entry != key)
                .map(|(t, p)| format!("{t}#{p}"))
                .collect();
            path.push(format!("{type_name}#{name}"));
            return Err(CompileError::Cycle {
                type_name: type_name.to_string(),
                permission: name.to_string(),
                path,
            });
        }

        self.in_progress.push(key.clone());
        let mut expansion = Expansion::default();
        let result = self.expand(type_def, name, &permission.expression, &mut expansion);
        self.in_progress.pop();
        result?;

        tracing::debug!(type_name, permission = name, "resolved permission");
        self.expanded.insert(key.clone(), expansion);
        dependencies.push(key);
        Ok(name.to_string())
    }

    /// Emits the rules realizing `expr` with `derived` as their derived relation.
    fn expand(
        &mut self,
        type_def: &'s TypeDefinition,
        derived: &str,
        expr: &'s PermissionExpression,
        out: &mut Expansion,
    ) -> Result<(), CompileError> {
        match expr {
            PermissionExpression::Unary(source) => {
                self.check_reference(type_def, derived, source, out)?;
                out.unary
                    .push(UnaryRule::new(&type_def.name, source, derived));
            }
            PermissionExpression::Hierarchical { base, target } => {
                let base_relation =
                    type_def
                        .get_relation(base)
                        .ok_or_else(|| CompileError::UndefinedRelation {
                            type_name: type_def.name.clone(),
                            permission: derived.to_string(),
                            relation: base.clone(),
                        })?;

                let referenced_from = format!("{}#{}", type_def.name, derived);
                for restriction in &base_relation.type_restrictions {
                    let target_identity = self.resolve_name(
                        &restriction.subject_type,
                        target,
                        &referenced_from,
                        &mut out.dependencies,
                    )?;
                    out.binary.push(BinaryRule::new(
                        &restriction.subject_type,
                        target_identity,
                        &type_def.name,
                        base,
                        derived,
                    ));
                }
            }
            PermissionExpression::Union(operands) => {
                if operands.is_empty() {
                    return Err(unsupported(
                        type_def,
                        derived,
                        expr,
                        "union requires at least one operand".to_string(),
                    ));
                }
                for operand in operands {
                    self.expand(type_def, derived, operand, out)?;
                }
            }
            PermissionExpression::Intersection(operands) => {
                let [first, second] = operands.as_slice() else {
                    return Err(unsupported(
                        type_def,
                        derived,
                        expr,
                        format!(
                            "intersection requires exactly 2 operands, found {}",
                            operands.len()
                        ),
                    ));
                };
                let first = self.operand_identity(type_def, derived, 0, first, out)?;
                let second = self.operand_identity(type_def, derived, 1, second, out)?;
                out.binary.push(BinaryRule::new(
                    &type_def.name,
                    first,
                    &type_def.name,
                    second,
                    derived,
                ));
            }
            PermissionExpression::Exclusion(..) => {
                return Err(unsupported(
                    type_def,
                    derived,
                    expr,
                    "exclusion cannot be expressed as unary or binary rules".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Identity of an intersection operand. Plain references are used as-is;
    /// anything else is expanded under a synthesized name such as `can_edit$1`.
    fn operand_identity(
        &mut self,
        type_def: &'s TypeDefinition,
        derived: &str,
        index: usize,
        operand: &'s PermissionExpression,
        out: &mut Expansion,
    ) -> Result<String, CompileError> {
        if let PermissionExpression::Unary(source) = operand {
            self.check_reference(type_def, derived, source, out)?;
            return Ok(source.clone());
        }

        let synthesized = format!("{derived}{SYNTHETIC_SEPARATOR}{index}");
        self.expand(type_def, &synthesized, operand, out)?;
        Ok(synthesized)
    }

    /// A same-type reference must name a relation or a permission; a
    /// permission becomes a dependency of the one being expanded.
    fn check_reference(
        &mut self,
        type_def: &'s TypeDefinition,
        derived: &str,
        source: &str,
        out: &mut Expansion,
    ) -> Result<(), CompileError> {
        let referenced_from = format!("{}#{}", type_def.name, derived);
        self.resolve_name(&type_def.name, source, &referenced_from, &mut out.dependencies)
            .map(|_| ())
    }
}

fn unsupported(
    type_def: &TypeDefinition,
    permission: &str,
    expr: &PermissionExpression,
    reason: String,
) -> CompileError {
    CompileError::UnsupportedOperation {
        type_name: type_def.name.clone(),
        permission: permission.to_string(),
        expression: expr.kind(),
        reason,
    }
}
