//! Turns schema differences into an ordered list of schema API calls and runs them.
//!
//! Planning is pure: [`plan`] compares both sides and produces a [`Plan`]. Execution
//! ([`execute`]) walks the plan strictly in order, one request at a time. Every class
//! update and creation comes before the first class deletion.

use crate::api::SchemaApi;
use crate::diff::diff_class;
use crate::error::ParseError;
use crate::schema::{ClassSchema, SchemaUpdate};
use std::collections::HashMap;
use std::fmt;

/// Page size used when purging the objects of a class before dropping it.
pub const PURGE_PAGE_SIZE: usize = 1000;

/// What to do when a request for one class fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure and return its error.
    #[default]
    Abort,
    /// Record the failure, skip the remaining steps of that class and go on with the next.
    Continue,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Drop remote classes that have no local definition.
    pub delete_classes: bool,
    /// Drop remote fields that have no (or a different) local definition.
    pub delete_fields: bool,
    /// Delete all objects of a class before dropping it.
    pub delete_non_empty_class: bool,
    /// Never drop `_`-prefixed classes. Set when a prefix scopes the run.
    pub retain_system_classes: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            delete_classes: true,
            delete_fields: true,
            delete_non_empty_class: false,
            retain_system_classes: false,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl ReconcileOptions {
    /// Options that never delete anything (`--safe`).
    pub fn safe() -> Self {
        ReconcileOptions {
            delete_classes: false,
            delete_fields: false,
            ..ReconcileOptions::default()
        }
    }
}

/// A single schema API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    CreateClass(ClassSchema),
    UpdateClass(SchemaUpdate),
    DeleteClass {
        class_name: String,
        purge_objects: bool,
    },
}

impl Step {
    pub fn class_name(&self) -> &str {
        match self {
            Step::CreateClass(schema) => &schema.class_name,
            Step::UpdateClass(update) => &update.class_name,
            Step::DeleteClass { class_name, .. } => class_name,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CreateClass(schema) => write!(
                f,
                "create class {} ({} fields)",
                schema.class_name,
                schema.fields.len()
            ),
            Step::UpdateClass(update) => {
                let deleted: Vec<&str> = update.deleted_fields().collect();
                let set: Vec<&str> = update.set_fields().map(|(name, _)| name).collect();
                write!(f, "update class {}", update.class_name)?;
                if !deleted.is_empty() {
                    write!(f, " delete [{}]", deleted.join(", "))?;
                }
                if !set.is_empty() {
                    write!(f, " add [{}]", set.join(", "))?;
                }
                if deleted.is_empty() && set.is_empty() {
                    write!(f, " permissions")?;
                }
                Ok(())
            }
            Step::DeleteClass {
                class_name,
                purge_objects,
            } => {
                if *purge_objects {
                    write!(f, "purge objects of {} and delete class", class_name)
                } else {
                    write!(f, "delete class {}", class_name)
                }
            }
        }
    }
}

/// The steps for one class, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPlan {
    pub class_name: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub classes: Vec<ClassPlan>,
    /// Skipped destructive operations and other notes collected while planning.
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.classes.iter().flat_map(|c| c.steps.iter())
    }

    fn push(&mut self, class_name: &str, steps: Vec<Step>) {
        if !steps.is_empty() {
            self.classes.push(ClassPlan {
                class_name: class_name.to_string(),
                steps,
            });
        }
    }

    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

#[derive(Debug)]
pub struct ClassFailure {
    pub class_name: String,
    pub error: ParseError,
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Executed steps, rendered as text.
    pub applied: Vec<String>,
    pub warnings: Vec<String>,
    /// Only populated under [`FailurePolicy::Continue`].
    pub failures: Vec<ClassFailure>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Computes the steps that converge `remote` to `local`.
///
/// Both lists must already be normalized, filtered and carry the remote class names.
pub fn plan(local: &[ClassSchema], remote: &[ClassSchema], options: &ReconcileOptions) -> Plan {
    let remote_by_name: HashMap<&str, &ClassSchema> =
        remote.iter().map(|s| (s.class_name.as_str(), s)).collect();
    let local_by_name: HashMap<&str, &ClassSchema> =
        local.iter().map(|s| (s.class_name.as_str(), s)).collect();

    let mut plan = Plan::default();

    // update + create
    for local_schema in local {
        let Some(remote_schema) = remote_by_name.get(local_schema.class_name.as_str()) else {
            plan.push(
                &local_schema.class_name,
                vec![Step::CreateClass(local_schema.clone())],
            );
            continue;
        };

        let Some(mut patch) = diff_class(local_schema, remote_schema) else {
            continue;
        };

        if !options.delete_fields {
            for warning in patch.suppress_deletions() {
                plan.warn(warning);
            }
        }

        let steps = [
            patch.deletion_request(local_schema),
            patch.creation_request(local_schema),
        ]
        .into_iter()
        .flatten()
        .map(Step::UpdateClass)
        .collect();
        plan.push(&local_schema.class_name, steps);
    }

    // delete
    for remote_schema in remote {
        if local_by_name.contains_key(remote_schema.class_name.as_str()) {
            continue;
        }
        if options.retain_system_classes && remote_schema.is_system_class() {
            log::debug!("Keeping system class {}", remote_schema.class_name);
            continue;
        }
        if !options.delete_classes {
            plan.warn(format!("Skip deleting class: {}", remote_schema.class_name));
            continue;
        }
        plan.push(
            &remote_schema.class_name,
            vec![Step::DeleteClass {
                class_name: remote_schema.class_name.clone(),
                purge_objects: options.delete_non_empty_class,
            }],
        );
    }

    plan
}

/// Steps that drop every local class that exists remotely.
pub fn plan_removal(local: &[ClassSchema], remote: &[ClassSchema], purge_objects: bool) -> Plan {
    let mut plan = Plan::default();
    for local_schema in local {
        if remote
            .iter()
            .any(|r| r.class_name == local_schema.class_name)
        {
            plan.push(
                &local_schema.class_name,
                vec![Step::DeleteClass {
                    class_name: local_schema.class_name.clone(),
                    purge_objects,
                }],
            );
        } else {
            log::debug!(
                "Class {} does not exist remotely, nothing to delete",
                local_schema.class_name
            );
        }
    }
    plan
}

/// Runs the plan against `api`, one request at a time.
pub async fn execute<A>(api: &A, plan: Plan, policy: FailurePolicy) -> Result<ReconcileReport, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let mut report = ReconcileReport {
        warnings: plan.warnings,
        ..ReconcileReport::default()
    };

    for class_plan in plan.classes {
        for step in &class_plan.steps {
            match run_step(api, step).await {
                Ok(()) => report.applied.push(step.to_string()),
                Err(error) => match policy {
                    FailurePolicy::Abort => return Err(error),
                    FailurePolicy::Continue => {
                        log::error!("Failed to {}: {}", step, error);
                        report.failures.push(ClassFailure {
                            class_name: class_plan.class_name.clone(),
                            error,
                        });
                        break;
                    }
                },
            }
        }
    }

    Ok(report)
}

/// Plans and executes in one go.
pub async fn reconcile<A>(
    api: &A,
    local: &[ClassSchema],
    remote: &[ClassSchema],
    options: &ReconcileOptions,
) -> Result<ReconcileReport, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let plan = plan(local, remote, options);
    execute(api, plan, options.failure_policy).await
}

async fn run_step<A>(api: &A, step: &Step) -> Result<(), ParseError>
where
    A: SchemaApi + ?Sized,
{
    match step {
        Step::CreateClass(schema) => {
            log::info!("Creating schema: {}", schema.class_name);
            api.create_class(schema).await
        }
        Step::UpdateClass(update) => {
            log::info!("Updating schema: {}", step);
            api.update_class(update).await
        }
        Step::DeleteClass {
            class_name,
            purge_objects,
        } => {
            if *purge_objects {
                let purged = purge_objects_of(api, class_name).await?;
                log::info!("Purged {} objects of {}", purged, class_name);
            }
            log::info!("Deleting schema: {}", class_name);
            api.delete_class(class_name).await
        }
    }
}

/// Deletes every object of `class_name`. Ids are collected page by page before the first
/// deletion so paging is not disturbed. Returns the number of deleted objects.
///
/// Paging stops at the first empty page, since the server may cap pages below
/// [`PURGE_PAGE_SIZE`].
pub async fn purge_objects_of<A>(api: &A, class_name: &str) -> Result<usize, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let mut object_ids = Vec::new();
    loop {
        let page = api
            .list_objects(class_name, object_ids.len(), PURGE_PAGE_SIZE)
            .await?;
        if page.is_empty() {
            break;
        }
        for object in page {
            let id = object
                .get("objectId")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ParseError::JsonDeserializationFailed(format!(
                        "Object of class '{}' has no objectId: {}",
                        class_name, object
                    ))
                })?;
            object_ids.push(id.to_string());
        }
    }

    for id in &object_ids {
        api.delete_object(class_name, id).await?;
    }
    Ok(object_ids.len())
}
