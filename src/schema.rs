use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Fields every Parse class carries implicitly. The server manages them, so they never take
/// part in a schema comparison.
pub const RESERVED_FIELDS: [&str; 4] = ["objectId", "createdAt", "updatedAt", "ACL"];

/// Represents the possible data types for a field in a Parse class schema.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Date,
    GeoPoint,
    Polygon,
    File,
    Array,
    Pointer,
    Relation,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Object => "Object",
            FieldType::Date => "Date",
            FieldType::GeoPoint => "GeoPoint",
            FieldType::Polygon => "Polygon",
            FieldType::File => "File",
            FieldType::Array => "Array",
            FieldType::Pointer => "Pointer",
            FieldType::Relation => "Relation",
        }
    }

    /// `Pointer` and `Relation` reference another class through `targetClass`.
    pub fn is_relational(&self) -> bool {
        matches!(self, FieldType::Pointer | FieldType::Relation)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "String" => FieldType::String,
            "Number" => FieldType::Number,
            "Boolean" => FieldType::Boolean,
            "Object" => FieldType::Object,
            "Date" => FieldType::Date,
            "GeoPoint" => FieldType::GeoPoint,
            "Polygon" => FieldType::Polygon,
            "File" => FieldType::File,
            "Array" => FieldType::Array,
            "Pointer" => FieldType::Pointer,
            "Relation" => FieldType::Relation,
            other => return Err(other.to_string()),
        })
    }
}

/// Represents the schema definition for a single field within a Parse class.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FieldSpec {
    /// The data type of the field.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// For `Pointer` and `Relation` types, this specifies the target class name.
    #[serde(rename = "targetClass", skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,

    /// Indicates if the field is required. Absent means `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// The default value for the field.
    #[serde(rename = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        FieldSpec {
            field_type,
            target_class: None,
            required: None,
            default_value: None,
        }
    }

    pub fn pointer(target_class: impl Into<String>) -> Self {
        FieldSpec {
            target_class: Some(target_class.into()),
            ..FieldSpec::new(FieldType::Pointer)
        }
    }

    pub fn relation(target_class: impl Into<String>) -> Self {
        FieldSpec {
            target_class: Some(target_class.into()),
            ..FieldSpec::new(FieldType::Relation)
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }
}

// `required: false` and a missing `required` describe the same field.
impl PartialEq for FieldSpec {
    fn eq(&self, other: &Self) -> bool {
        self.field_type == other.field_type
            && self.target_class == other.target_class
            && self.is_required() == other.is_required()
            && self.default_value == other.default_value
    }
}

/// One entry of an action map.
///
/// Subjects (`*`, `role:Admin`, a user id, `requiresAuthentication`) map to a flag. The
/// `pointerFields` entry instead lists the pointer fields whose target users get access.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Permission {
    Granted(bool),
    Fields(BTreeSet<String>),
}

pub type PermissionMap = BTreeMap<String, Permission>;

/// Represents the Class Level Permissions (CLP) for a Parse class schema.
///
/// Keys the server may add beyond the well-known actions (`readUserFields`, `writeUserFields`,
/// ...) are kept in `other` so a pull/push round trip does not drop them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassLevelPermissions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub find: Option<PermissionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<PermissionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<PermissionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<PermissionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<PermissionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<PermissionMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_field: Option<PermissionMap>,
    /// Subject identifier to the set of field names hidden from that subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected_fields: Option<BTreeMap<String, BTreeSet<String>>>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl ClassLevelPermissions {
    pub fn is_empty(&self) -> bool {
        *self == ClassLevelPermissions::default()
    }

    /// Grants `subject` access for every action.
    pub fn public(subject: &str) -> Self {
        let open = || {
            Some(PermissionMap::from([(
                subject.to_string(),
                Permission::Granted(true),
            )]))
        };
        ClassLevelPermissions {
            find: open(),
            count: open(),
            get: open(),
            create: open(),
            update: open(),
            delete: open(),
            add_field: open(),
            protected_fields: Some(BTreeMap::from([(subject.to_string(), BTreeSet::new())])),
            other: BTreeMap::new(),
        }
    }
}

/// Normalized schema of a single Parse class.
///
/// Fields are held in a `BTreeMap`, so iteration and serialization always follow the
/// lexicographic field order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSchema {
    pub class_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub class_level_permissions: ClassLevelPermissions,
}

impl ClassSchema {
    pub fn new(class_name: impl Into<String>) -> Self {
        ClassSchema {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
            class_level_permissions: ClassLevelPermissions::default(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn with_permissions(mut self, permissions: ClassLevelPermissions) -> Self {
        self.class_level_permissions = permissions;
        self
    }

    /// Built-in classes such as `_User`, `_Role` and `_Session`.
    pub fn is_system_class(&self) -> bool {
        is_system_class_name(&self.class_name)
    }

    /// Structural equality of everything the server stores for a class, ignoring the name.
    pub fn same_definition(&self, other: &ClassSchema) -> bool {
        self.fields == other.fields && self.class_level_permissions == other.class_level_permissions
    }
}

pub fn is_system_class_name(class_name: &str) -> bool {
    class_name.starts_with('_')
}

/// A single entry of the `fields` map sent with a schema update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// Serialized as the `{"__op": "Delete"}` marker.
    Delete,
    Set(FieldSpec),
}

impl Serialize for FieldChange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldChange::Delete => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("__op", "Delete")?;
                map.end()
            }
            FieldChange::Set(spec) => spec.serialize(serializer),
        }
    }
}

/// Body of a `PUT schemas/{className}` call.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUpdate {
    pub class_name: String,
    pub fields: BTreeMap<String, FieldChange>,
    pub class_level_permissions: ClassLevelPermissions,
}

impl SchemaUpdate {
    pub fn deleted_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, change)| matches!(change, FieldChange::Delete))
            .map(|(name, _)| name.as_str())
    }

    pub fn set_fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().filter_map(|(name, change)| match change {
            FieldChange::Set(spec) => Some((name.as_str(), spec)),
            FieldChange::Delete => None,
        })
    }
}

/// Represents the response structure when fetching all schemas.
///
/// Entries stay as raw JSON; they only become `ClassSchema` values through normalization.
#[derive(Debug, Deserialize, Clone)]
pub struct GetAllSchemasResponse {
    #[serde(default)]
    pub results: Vec<Value>,
}
