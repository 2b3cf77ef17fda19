//! Local schema files.
//!
//! A path ending in `.json` holds all classes as one JSON array. Any other path is a
//! directory with one `<className>.json` per class containing `fields` and
//! `classLevelPermissions`.

use crate::error::ParseError;
use crate::normalize::normalize_list;
use crate::schema::{ClassLevelPermissions, ClassSchema, FieldSpec};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// Default location of the local schema when no path is given.
pub const DEFAULT_SCHEMA_PATH: &str = "schema/classes";

#[derive(Serialize)]
struct ClassFile<'a> {
    fields: &'a BTreeMap<String, FieldSpec>,
    #[serde(rename = "classLevelPermissions")]
    class_level_permissions: &'a ClassLevelPermissions,
}

fn is_single_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Reads and normalizes the local schema at `path`, sorted by class name.
pub async fn read_all(path: &Path) -> Result<Vec<ClassSchema>, ParseError> {
    if fs::metadata(path).await.is_err() {
        return Err(ParseError::NotFound(format!(
            "No local schema at '{}'",
            path.display()
        )));
    }

    let raw: Vec<Value> = if is_single_file(path) {
        let text = fs::read_to_string(path).await?;
        serde_json::from_str(&text)?
    } else {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_path = entry.path();
            if is_single_file(&file_path) {
                entries.push(file_path);
            }
        }
        entries.sort();

        let mut raw = Vec::with_capacity(entries.len());
        for file_path in entries {
            raw.push(read_class_file(&file_path).await?);
        }
        raw
    };

    log::debug!("Read {} local class schemas from '{}'", raw.len(), path.display());
    normalize_list(&raw)
}

/// One class file; the class name is taken from the file name.
async fn read_class_file(file_path: &Path) -> Result<Value, ParseError> {
    let class_name = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            ParseError::Validation(format!(
                "Cannot derive a class name from '{}'",
                file_path.display()
            ))
        })?
        .to_string();

    let text = fs::read_to_string(file_path).await?;
    let mut value: Value = serde_json::from_str(&text).map_err(|e| {
        ParseError::JsonDeserializationFailed(format!("'{}': {}", file_path.display(), e))
    })?;

    match value.as_object_mut() {
        Some(object) => {
            object.insert("className".to_string(), Value::String(class_name));
            Ok(value)
        }
        None => Err(ParseError::Validation(format!(
            "'{}' must contain a JSON object",
            file_path.display()
        ))),
    }
}

/// Writes `schemas` to `path`, creating missing directories.
///
/// Existing class files that are not part of `schemas` are left in place.
pub async fn write_all(path: &Path, schemas: &[ClassSchema]) -> Result<(), ParseError> {
    if is_single_file(path) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, to_pretty_json(&schemas)?).await?;
    } else {
        fs::create_dir_all(path).await?;
        for schema in schemas {
            let file = ClassFile {
                fields: &schema.fields,
                class_level_permissions: &schema.class_level_permissions,
            };
            let file_path = path.join(format!("{}.json", schema.class_name));
            fs::write(&file_path, to_pretty_json(&file)?).await?;
        }
    }

    log::info!("Wrote {} class schemas to '{}'", schemas.len(), path.display());
    Ok(())
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ParseError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}
