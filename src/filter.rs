//! Class name scoping: prefixes, ignore and include patterns.

use crate::schema::{is_system_class_name, ClassSchema};
use std::collections::HashSet;

/// Stands in for the prefix inside `targetClass` values of pulled schemas.
pub const PREFIX_PLACEHOLDER: &str = "{{PREFIX}}";

/// A class name pattern. `Temp*` matches by prefix, `*Log` by suffix, anything else exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
}

impl Pattern {
    pub fn parse(pattern: &str) -> Self {
        if let Some(prefix) = pattern.strip_suffix('*') {
            Pattern::Prefix(prefix.to_string())
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            Pattern::Suffix(suffix.to_string())
        } else {
            Pattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, class_name: &str) -> bool {
        match self {
            Pattern::Exact(name) => class_name == name,
            Pattern::Prefix(prefix) => class_name.starts_with(prefix.as_str()),
            Pattern::Suffix(suffix) => class_name.ends_with(suffix.as_str()),
        }
    }
}

/// Selects which classes of a schema list an operation works on.
///
/// Applied in a fixed order: prefix scoping, then `include` additions, then `ignore`
/// removals, so `ignore` always has the last word.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    pub prefix: Option<String>,
    pub ignore: Vec<Pattern>,
    pub include: Vec<Pattern>,
}

impl NameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty prefixes are treated as no prefix.
    pub fn prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    pub fn ignore<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.ignore
            .extend(patterns.iter().map(|p| Pattern::parse(p.as_ref())));
        self
    }

    pub fn include<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.include
            .extend(patterns.iter().map(|p| Pattern::parse(p.as_ref())));
        self
    }

    /// A class named exactly like the prefix is out of scope: it has no unprefixed name.
    pub fn in_prefix_scope(&self, class_name: &str) -> bool {
        match &self.prefix {
            Some(prefix) => {
                (class_name.len() > prefix.len() && class_name.starts_with(prefix.as_str()))
                    || is_system_class_name(class_name)
            }
            None => true,
        }
    }

    pub fn is_ignored(&self, class_name: &str) -> bool {
        self.ignore.iter().any(|p| p.matches(class_name))
    }

    pub fn is_included(&self, class_name: &str) -> bool {
        self.include.iter().any(|p| p.matches(class_name))
    }

    /// Whether a single class name survives the filter.
    pub fn accepts(&self, class_name: &str) -> bool {
        (self.in_prefix_scope(class_name) || self.is_included(class_name))
            && !self.is_ignored(class_name)
    }

    /// Filters `schemas`, which is taken as the full candidate list. Order is preserved.
    pub fn apply(&self, schemas: Vec<ClassSchema>) -> Vec<ClassSchema> {
        let scoped: HashSet<String> = schemas
            .iter()
            .filter(|s| self.in_prefix_scope(&s.class_name))
            .map(|s| s.class_name.clone())
            .collect();

        schemas
            .into_iter()
            .filter(|s| scoped.contains(&s.class_name) || self.is_included(&s.class_name))
            .filter(|s| !self.is_ignored(&s.class_name))
            .collect()
    }
}

/// Pull direction: removes `prefix` from class names and turns prefixed relational targets
/// into `{{PREFIX}}Name` so they can be re-prefixed on push.
///
/// A class named exactly `prefix` has no local name and is skipped with a warning.
pub fn strip_prefix(schemas: Vec<ClassSchema>, prefix: &str) -> Vec<ClassSchema> {
    if prefix.is_empty() {
        return schemas;
    }

    schemas
        .into_iter()
        .filter(|schema| {
            if schema.class_name == prefix {
                log::warn!(
                    "Skipping class {}: nothing is left once the prefix is removed",
                    schema.class_name
                );
                return false;
            }
            true
        })
        .map(|mut schema| {
            if let Some(stripped) = schema.class_name.strip_prefix(prefix) {
                schema.class_name = stripped.to_string();
            }
            for spec in schema.fields.values_mut() {
                if !spec.field_type.is_relational() {
                    continue;
                }
                if let Some(target) = spec.target_class.as_mut() {
                    if let Some(rest) = target.strip_prefix(prefix).filter(|r| !r.is_empty()) {
                        *target = format!("{}{}", PREFIX_PLACEHOLDER, rest);
                    }
                }
            }
            schema
        })
        .collect()
}

/// Push direction: prepends `prefix` to every non-system class name and resolves the
/// `{{PREFIX}}` placeholder in relational targets.
pub fn apply_prefix(schemas: Vec<ClassSchema>, prefix: &str) -> Vec<ClassSchema> {
    schemas
        .into_iter()
        .map(|mut schema| {
            if !prefix.is_empty() && !schema.is_system_class() {
                schema.class_name = format!("{}{}", prefix, schema.class_name);
            }
            for spec in schema.fields.values_mut() {
                if let Some(target) = spec.target_class.as_mut() {
                    if let Some(rest) = target.strip_prefix(PREFIX_PLACEHOLDER) {
                        *target = format!("{}{}", prefix, rest);
                    }
                }
            }
            schema
        })
        .collect()
}

/// Relational targets that name another local, non-system class without the placeholder.
///
/// Once the prefix is applied such a field still points at the unprefixed name, which is
/// not the class being pushed. Returns one message per offending field.
pub fn unprefixed_references(schemas: &[ClassSchema]) -> Vec<String> {
    let local_names: HashSet<&str> = schemas
        .iter()
        .filter(|s| !s.is_system_class())
        .map(|s| s.class_name.as_str())
        .collect();

    let mut warnings = Vec::new();
    for schema in schemas {
        for (field, spec) in &schema.fields {
            if let Some(target) = spec.target_class.as_deref() {
                if local_names.contains(target) {
                    warnings.push(format!(
                        "{}.{} targets '{}' without the {} placeholder; it will not be prefixed",
                        schema.class_name, field, target, PREFIX_PLACEHOLDER
                    ));
                }
            }
        }
    }
    warnings
}
