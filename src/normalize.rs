//! Canonical shape for class schemas coming from any source.
//!
//! Schemas read from disk and schemas fetched from the server are both passed through
//! [`normalize`], so every later comparison sees the same shape: reserved fields removed,
//! `fields` and `classLevelPermissions` always present, fields in lexicographic order and
//! lists sorted by class name.

use crate::error::ParseError;
use crate::schema::{ClassLevelPermissions, ClassSchema, FieldSpec, FieldType, RESERVED_FIELDS};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

fn class_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^_?[A-Za-z][A-Za-z0-9_]*$").expect("class name pattern is a valid regex")
    })
}

/// Checks a class name against the naming rules of Parse Server.
pub fn validate_class_name(class_name: &str) -> Result<(), ParseError> {
    if class_name_pattern().is_match(class_name) {
        Ok(())
    } else {
        Err(ParseError::InvalidClassName(format!(
            "'{}' must start with a letter (or '_' for system classes) and contain only letters, digits and '_'",
            class_name
        )))
    }
}

/// Converts a raw class schema into a [`ClassSchema`].
///
/// The input is only borrowed; the result is built from copies of its parts.
pub fn normalize(raw: &Value) -> Result<ClassSchema, ParseError> {
    let object = match raw {
        Value::Object(map) => map,
        Value::Null => return Err(ParseError::Validation("Schema not found.".to_string())),
        other => {
            return Err(ParseError::Validation(format!(
                "Schema must be a JSON object, got: {}",
                other
            )))
        }
    };

    let class_name = match object.get("className") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => {
            return Err(ParseError::Validation(
                "Schema is missing 'className' key.".to_string(),
            ))
        }
    };
    validate_class_name(&class_name)?;

    let mut fields = BTreeMap::new();
    match object.get("fields") {
        None | Some(Value::Null) => {}
        Some(Value::Object(raw_fields)) => {
            for (name, raw_field) in raw_fields {
                if RESERVED_FIELDS.contains(&name.as_str()) {
                    continue;
                }
                fields.insert(name.clone(), normalize_field(&class_name, name, raw_field)?);
            }
        }
        Some(other) => {
            return Err(ParseError::Validation(format!(
                "'fields' of class '{}' must be an object, got: {}",
                class_name, other
            )))
        }
    }

    let class_level_permissions = match object.get("classLevelPermissions") {
        None | Some(Value::Null) => ClassLevelPermissions::default(),
        Some(raw_clp) => serde_json::from_value(raw_clp.clone()).map_err(|e| {
            ParseError::Validation(format!(
                "Invalid classLevelPermissions for class '{}': {}",
                class_name, e
            ))
        })?,
    };

    Ok(ClassSchema {
        class_name,
        fields,
        class_level_permissions,
    })
}

fn normalize_field(class_name: &str, name: &str, raw: &Value) -> Result<FieldSpec, ParseError> {
    let type_name = raw.get("type").and_then(Value::as_str).ok_or_else(|| {
        ParseError::Validation(format!(
            "Field '{}' of class '{}' is missing its 'type'",
            name, class_name
        ))
    })?;

    let field_type: FieldType =
        type_name
            .parse()
            .map_err(|field_type| ParseError::UnsupportedFieldType {
                class_name: class_name.to_string(),
                field: name.to_string(),
                field_type,
            })?;

    let spec: FieldSpec = serde_json::from_value(raw.clone()).map_err(|e| {
        ParseError::Validation(format!(
            "Invalid definition for field '{}' of class '{}': {}",
            name, class_name, e
        ))
    })?;

    if field_type.is_relational()
        && spec.target_class.as_deref().map_or(true, str::is_empty)
    {
        return Err(ParseError::Validation(format!(
            "{} field '{}' of class '{}' has no targetClass",
            field_type, name, class_name
        )));
    }

    Ok(spec)
}

/// Normalizes every entry and returns the list sorted by class name.
///
/// Fails on the first invalid entry and on duplicate class names.
pub fn normalize_list<'a, I>(raws: I) -> Result<Vec<ClassSchema>, ParseError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut schemas = raws
        .into_iter()
        .map(normalize)
        .collect::<Result<Vec<_>, _>>()?;
    sort_and_check(&mut schemas)?;
    Ok(schemas)
}

/// Sorts by class name and rejects duplicates.
fn sort_and_check(schemas: &mut [ClassSchema]) -> Result<(), ParseError> {
    let mut seen = HashSet::new();
    for schema in schemas.iter() {
        if !seen.insert(schema.class_name.as_str()) {
            return Err(ParseError::Validation(format!(
                "Class '{}' is defined more than once",
                schema.class_name
            )));
        }
    }
    schemas.sort_by(|a, b| a.class_name.cmp(&b.class_name));
    Ok(())
}
