//! TypeScript definitions for the classes of a schema.
//!
//! Each class becomes `<Name>.ts` with an `<Name>Attributes` interface and, when the Parse JS
//! SDK is targeted, a `Parse.Object` type (or subclass). `index.ts` re-exports everything.

use crate::error::ParseError;
use crate::filter::NameFilter;
use crate::schema::{ClassSchema, FieldSpec, FieldType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tokio::fs;

/// Fields always emitted first, so they are skipped when walking the schema.
const IMPLICIT_FIELDS: [&str; 4] = ["id", "objectId", "createdAt", "updatedAt"];

/// User supplied TypeScript types for individual fields of a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomClassFieldType {
    pub classname: String,
    #[serde(default)]
    pub fields: Vec<CustomFieldEntry>,
}

/// `{"<field>": "<type>", "importfrom": "<import statement>"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importfrom: Option<String>,
    #[serde(flatten)]
    pub types: BTreeMap<String, String>,
}

/// Reads custom field types from a JSON file. A missing file yields no overrides.
pub async fn load_custom_class_field_types(
    path: &Path,
) -> Result<Vec<CustomClassFieldType>, ParseError> {
    if fs::metadata(path).await.is_err() {
        log::warn!("No custom class field types at '{}'", path.display());
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

#[derive(Debug, Clone)]
pub struct TypescriptOptions {
    /// Only classes with this prefix (plus system classes) are emitted, without the prefix.
    pub prefix: Option<String>,
    pub ignore: Vec<String>,
    pub include: Vec<String>,
    /// Target the Parse JS SDK. Without it only plain JSON shapes are emitted.
    pub sdk: bool,
    /// Assume a global `Parse` instead of importing it.
    pub global_sdk: bool,
    /// Emit `Parse.Object` subclasses with accessors instead of type aliases.
    pub class: bool,
    /// Use `.js` extensions in relative imports.
    pub is_esm: bool,
    pub custom_class_field_types: Vec<CustomClassFieldType>,
}

impl Default for TypescriptOptions {
    fn default() -> Self {
        TypescriptOptions {
            prefix: None,
            ignore: Vec::new(),
            include: Vec::new(),
            sdk: true,
            global_sdk: false,
            class: false,
            is_esm: false,
            custom_class_field_types: Vec::new(),
        }
    }
}

impl TypescriptOptions {
    fn name_filter(&self) -> NameFilter {
        NameFilter::new()
            .prefix(self.prefix.as_deref())
            .ignore(&self.ignore)
            .include(&self.include)
    }

    /// Type name for a remote class name.
    fn type_name<'a>(&self, class_name: &'a str) -> &'a str {
        match self.prefix.as_deref().filter(|p| !p.is_empty()) {
            Some(prefix) => class_name.strip_prefix(prefix).unwrap_or(class_name),
            None => class_name,
        }
    }

    fn module_path(&self, type_name: &str) -> String {
        if self.is_esm {
            format!("./{}.js", type_name)
        } else {
            format!("./{}", type_name)
        }
    }

    fn custom_type(&self, class_name: &str, field: &str) -> Option<TsType> {
        self.custom_class_field_types
            .iter()
            .filter(|entry| entry.classname == class_name)
            .flat_map(|entry| entry.fields.iter())
            .find_map(|entry| {
                entry.types.get(field).map(|ts_type| TsType {
                    ts_type: ts_type.clone(),
                    import_from: entry.importfrom.clone(),
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TsType {
    pub ts_type: String,
    pub import_from: Option<String>,
}

impl TsType {
    fn plain(ts_type: impl Into<String>) -> Self {
        TsType {
            ts_type: ts_type.into(),
            import_from: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub file_name: String,
    pub contents: String,
}

/// A field is non-optional when it is required or the server fills in a default.
pub fn is_non_nullable(spec: &FieldSpec) -> bool {
    spec.is_required() || spec.default_value.is_some()
}

/// Maps a field to its TypeScript type. Custom overrides take precedence.
pub fn field_type(
    class_name: &str,
    field: &str,
    spec: &FieldSpec,
    options: &TypescriptOptions,
) -> Result<TsType, ParseError> {
    if let Some(custom) = options.custom_type(class_name, field) {
        return Ok(custom);
    }

    let target = || {
        spec.target_class
            .as_deref()
            .map(|t| options.type_name(t))
            .ok_or_else(|| {
                ParseError::Validation(format!(
                    "{} field '{}' of class '{}' has no targetClass",
                    spec.field_type, field, class_name
                ))
            })
    };

    let sdk = options.sdk;
    let ts_type = match spec.field_type {
        FieldType::String => "string".to_string(),
        FieldType::Number => "number".to_string(),
        FieldType::Boolean => "boolean".to_string(),
        FieldType::Object => "any".to_string(),
        FieldType::Array => "any[]".to_string(),
        FieldType::Date if sdk => "Date".to_string(),
        FieldType::Date => r#"{ __type: "Date"; iso: string }"#.to_string(),
        FieldType::GeoPoint if sdk => "Parse.GeoPoint".to_string(),
        FieldType::GeoPoint => {
            r#"{ __type: "GeoPoint"; latitude: number; longitude: number }"#.to_string()
        }
        FieldType::Polygon if sdk => "Parse.Polygon".to_string(),
        FieldType::Polygon => r#"{ __type: "Polygon"; coordinates: [number, number][] }"#.to_string(),
        FieldType::File if sdk => "Parse.File".to_string(),
        FieldType::File => r#"{ __type: "File"; name: string; url: string }"#.to_string(),
        FieldType::Pointer if sdk => target()?.to_string(),
        FieldType::Pointer => format!(
            r#"{{ __type: "Pointer"; className: "{}"; objectId: string }}"#,
            target()?
        ),
        FieldType::Relation if sdk => format!(
            "Parse.Relation<{}, {}>",
            options.type_name(class_name),
            target()?
        ),
        FieldType::Relation => format!(r#"{{ __type: "Relation"; className: "{}" }}"#, target()?),
    };

    Ok(TsType::plain(ts_type))
}

/// Renders the TypeScript files for `schemas`. Nothing is written.
pub fn generate(
    schemas: &[ClassSchema],
    options: &TypescriptOptions,
) -> Result<Vec<GeneratedFile>, ParseError> {
    let selected = options.name_filter().apply(schemas.to_vec());
    let generated: HashSet<&str> = selected.iter().map(|s| s.class_name.as_str()).collect();

    let mut files = Vec::with_capacity(selected.len() + 1);
    for schema in &selected {
        files.push(GeneratedFile {
            file_name: format!("{}.ts", options.type_name(&schema.class_name)),
            contents: class_file(schema, &generated, options)?,
        });
    }
    files.push(GeneratedFile {
        file_name: "index.ts".to_string(),
        contents: index_file(&selected, options),
    });
    Ok(files)
}

fn class_file(
    schema: &ClassSchema,
    generated: &HashSet<&str>,
    options: &TypescriptOptions,
) -> Result<String, ParseError> {
    let class_name = schema.class_name.as_str();
    let name = options.type_name(class_name);

    let mut dependencies = BTreeSet::new();
    let mut imports = BTreeSet::new();
    let mut attributes: Vec<String> = if options.sdk {
        vec![
            "id: string;".to_string(),
            "objectId: string;".to_string(),
            "createdAt: Date;".to_string(),
            "updatedAt: Date;".to_string(),
        ]
    } else {
        vec![
            "objectId: string;".to_string(),
            "createdAt: string;".to_string(),
            "updatedAt: string;".to_string(),
        ]
    };
    attributes.push(String::new());
    let mut accessors = Vec::new();

    for (field, spec) in &schema.fields {
        if IMPLICIT_FIELDS.contains(&field.as_str()) {
            continue;
        }
        if let Some(target) = spec.target_class.as_deref() {
            if target != class_name {
                dependencies.insert(target.to_string());
            }
        }

        let ts = field_type(class_name, field, spec, options)?;
        log::debug!("Class {} field {} type {}", class_name, field, ts.ts_type);
        if let Some(import) = ts.import_from {
            imports.insert(import);
        }

        let ts_type = ts.ts_type;
        if spec.field_type == FieldType::Relation {
            attributes.push(format!("{}: {};", field, ts_type));
            accessors.push(format!("get {}(): {} {{", field, ts_type));
            accessors.push(format!("  return super.relation(\"{}\");", field));
            accessors.push("}".to_string());
        } else {
            let (optional, undefined) = if is_non_nullable(spec) {
                ("", "")
            } else {
                ("?", " | undefined")
            };
            attributes.push(format!("{}{}: {};", field, optional, ts_type));
            accessors.push(format!("get {}(): {}{} {{", field, ts_type, undefined));
            accessors.push(format!("  return super.get(\"{}\");", field));
            accessors.push("}".to_string());
            accessors.push(format!("set {}(value: {}{}) {{", field, ts_type, undefined));
            accessors.push(format!("  super.set(\"{}\", value);", field));
            accessors.push("}".to_string());
        }
    }

    let mut file = String::new();

    if options.sdk && !options.global_sdk {
        file.push_str("import Parse from \"parse\";\n\n");
    }

    for import in &imports {
        file.push_str(import);
        file.push('\n');
    }
    if !imports.is_empty() {
        file.push('\n');
    }

    if options.sdk {
        let (internal, external): (Vec<&String>, Vec<&String>) = dependencies
            .iter()
            .partition(|dep| generated.contains(dep.as_str()));

        for dep in &internal {
            let dep_name = options.type_name(dep);
            file.push_str(&format!(
                "import type {{ {} }} from \"{}\";\n",
                dep_name,
                options.module_path(dep_name)
            ));
        }
        if !internal.is_empty() {
            file.push('\n');
        }

        for dep in &external {
            file.push_str(&format!("type {} = Parse.Object;\n", options.type_name(dep)));
        }
        if !external.is_empty() {
            file.push('\n');
        }
    }

    file.push_str(&format!("export interface {}Attributes {{\n", name));
    push_indented(&mut file, &attributes);
    file.push_str("}\n");

    if options.sdk {
        file.push('\n');
        match system_alias(class_name) {
            Some(base) => {
                file.push_str(&format!(
                    "export type {} = {}<{}Attributes>;\n",
                    class_name, base, class_name
                ));
            }
            None if options.class => {
                file.push_str(&format!(
                    "export class {} extends Parse.Object<{}Attributes> {{\n",
                    name, name
                ));
                file.push_str(&format!("  static className: string = \"{}\";\n\n", class_name));
                file.push_str(&format!(
                    "  constructor(data?: Partial<{}Attributes>) {{\n",
                    name
                ));
                file.push_str(&format!(
                    "    super(\"{}\", data as {}Attributes);\n",
                    class_name, name
                ));
                file.push_str("  }\n");
                if !accessors.is_empty() {
                    file.push('\n');
                    push_indented(&mut file, &accessors);
                }
                file.push_str("}\n\n");
                file.push_str(&format!(
                    "Parse.Object.registerSubclass(\"{}\", {});\n",
                    class_name, name
                ));
            }
            None => {
                file.push_str(&format!(
                    "export type {} = Parse.Object<{}Attributes>;\n",
                    name, name
                ));
            }
        }
    }

    Ok(file)
}

fn system_alias(class_name: &str) -> Option<&'static str> {
    match class_name {
        "_User" => Some("Parse.User"),
        "_Role" => Some("Parse.Role"),
        "_Session" => Some("Parse.Session"),
        _ => None,
    }
}

fn push_indented(file: &mut String, lines: &[String]) {
    for line in lines {
        if line.is_empty() {
            file.push('\n');
        } else {
            file.push_str("  ");
            file.push_str(line);
            file.push('\n');
        }
    }
}

fn index_file(schemas: &[ClassSchema], options: &TypescriptOptions) -> String {
    let exports: Vec<String> = schemas
        .iter()
        .map(|schema| {
            let name = options.type_name(&schema.class_name);
            let module = options.module_path(name);
            if !options.sdk {
                return format!("export type {{ {}Attributes }} from \"{}\";", name, module);
            }
            // Type aliases can only be re-exported as types.
            let keyword = if options.class && system_alias(&schema.class_name).is_none() {
                "export"
            } else {
                "export type"
            };
            format!(
                "{} {{ {} }} from \"{}\";\nexport type {{ {}Attributes }} from \"{}\";\n",
                keyword, name, module, name, module
            )
        })
        .collect();

    let mut index = exports.join("\n");
    index.push('\n');
    index
}

/// Writes generated files into `dir`, creating it if needed.
pub async fn write_files(dir: &Path, files: &[GeneratedFile]) -> Result<(), ParseError> {
    fs::create_dir_all(dir).await?;
    for file in files {
        fs::write(dir.join(&file.file_name), &file.contents).await?;
    }
    log::info!("Wrote {} TypeScript files to '{}'", files.len(), dir.display());
    Ok(())
}
