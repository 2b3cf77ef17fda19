//! Field and permission level comparison of a local class against its remote counterpart.

use crate::schema::{ClassSchema, FieldChange, SchemaUpdate};
use std::collections::BTreeMap;

/// Changes needed to turn a remote class into its local definition.
///
/// A field whose definition changed appears in both `fields_to_delete` and
/// `fields_to_create`: the schema API cannot alter a field in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassPatch {
    pub class_name: String,
    pub fields_to_create: Vec<String>,
    pub fields_to_delete: Vec<String>,
    pub permissions_changed: bool,
}

/// Where a class stands between the local and the remote schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassState {
    Unchanged,
    NeedsUpdate(ClassPatch),
    NeedsCreate,
    NeedsDelete,
}

/// Compares two normalized schemas of the same class.
///
/// Returns `None` when fields and class level permissions are structurally equal.
pub fn diff_class(local: &ClassSchema, remote: &ClassSchema) -> Option<ClassPatch> {
    if local.same_definition(remote) {
        return None;
    }

    let mut patch = ClassPatch {
        class_name: local.class_name.clone(),
        permissions_changed: local.class_level_permissions != remote.class_level_permissions,
        ..ClassPatch::default()
    };

    for (name, spec) in &local.fields {
        match remote.fields.get(name) {
            None => patch.fields_to_create.push(name.clone()),
            Some(remote_spec) if remote_spec != spec => {
                patch.fields_to_delete.push(name.clone());
                patch.fields_to_create.push(name.clone());
            }
            Some(_) => {}
        }
    }

    for name in remote.fields.keys() {
        if !local.fields.contains_key(name) {
            patch.fields_to_delete.push(name.clone());
        }
    }
    patch.fields_to_delete.sort();

    Some(patch)
}

/// Classifies a class from its presence on either side.
pub fn class_state(local: Option<&ClassSchema>, remote: Option<&ClassSchema>) -> ClassState {
    match (local, remote) {
        (Some(local), Some(remote)) => match diff_class(local, remote) {
            Some(patch) => ClassState::NeedsUpdate(patch),
            None => ClassState::Unchanged,
        },
        (Some(_), None) => ClassState::NeedsCreate,
        (None, Some(_)) => ClassState::NeedsDelete,
        (None, None) => ClassState::Unchanged,
    }
}

impl ClassPatch {
    /// Fields scheduled for delete-then-recreate.
    pub fn replaced_fields(&self) -> impl Iterator<Item = &String> {
        self.fields_to_create
            .iter()
            .filter(move |f| self.fields_to_delete.contains(f))
    }

    /// Drops every field deletion from the patch.
    ///
    /// Fields that needed delete-then-recreate are dropped from the create list as well,
    /// since creating a field that still exists would be rejected. Returns one warning per
    /// skipped deletion and per field that can no longer be updated.
    pub fn suppress_deletions(&mut self) -> Vec<String> {
        if self.fields_to_delete.is_empty() {
            return Vec::new();
        }

        let blocked: Vec<String> = self.replaced_fields().cloned().collect();
        let mut warnings = vec![format!(
            "Skip deleting fields of {}: {}",
            self.class_name,
            self.fields_to_delete.join(", ")
        )];
        for field in &blocked {
            warnings.push(format!("Can't update field: {}.{}", self.class_name, field));
        }

        self.fields_to_create.retain(|f| !blocked.contains(f));
        self.fields_to_delete.clear();
        warnings
    }

    /// First sub-request: the deletions together with the local permissions.
    pub fn deletion_request(&self, local: &ClassSchema) -> Option<SchemaUpdate> {
        if self.fields_to_delete.is_empty() && !self.permissions_changed {
            return None;
        }
        let fields = self
            .fields_to_delete
            .iter()
            .map(|name| (name.clone(), FieldChange::Delete))
            .collect();
        Some(self.update(local, fields))
    }

    /// Second sub-request: the (re)created fields together with the local permissions.
    pub fn creation_request(&self, local: &ClassSchema) -> Option<SchemaUpdate> {
        if self.fields_to_create.is_empty() && !self.permissions_changed {
            return None;
        }
        let fields = self
            .fields_to_create
            .iter()
            .filter_map(|name| {
                local
                    .fields
                    .get(name)
                    .map(|spec| (name.clone(), FieldChange::Set(spec.clone())))
            })
            .collect();
        Some(self.update(local, fields))
    }

    fn update(&self, local: &ClassSchema, fields: BTreeMap<String, FieldChange>) -> SchemaUpdate {
        SchemaUpdate {
            class_name: self.class_name.clone(),
            fields,
            class_level_permissions: local.class_level_permissions.clone(),
        }
    }
}
