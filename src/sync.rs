//! The user facing operations: pull (`down`), push (`up`), drop (`delete`) and `typescript`.
//!
//! Each operation reads both sides fresh, works on that snapshot and discards it.

use crate::api::{fetch_remote_schemas, SchemaApi};
use crate::error::ParseError;
use crate::filter::{apply_prefix, strip_prefix, unprefixed_references, NameFilter};
use crate::reconcile::{self, FailurePolicy, Plan, ReconcileOptions, ReconcileReport};
use crate::schema::ClassSchema;
use crate::store;
use crate::typescript::{self, GeneratedFile, TypescriptOptions};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct DownOptions {
    /// Only classes with this prefix are pulled; the prefix is removed locally.
    pub prefix: Option<String>,
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Local classes are pushed with this prefix; only prefixed remote classes are touched.
    pub prefix: Option<String>,
    pub ignore: Vec<String>,
    pub reconcile: ReconcileOptions,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub prefix: Option<String>,
    pub delete_non_empty_class: bool,
    pub failure_policy: FailurePolicy,
}

fn non_empty(prefix: &Option<String>) -> Option<&str> {
    prefix.as_deref().filter(|p| !p.is_empty())
}

/// Fetches the remote schema and writes it to `schema_path`. Returns what was written.
pub async fn down<A>(
    api: &A,
    schema_path: &Path,
    options: &DownOptions,
) -> Result<Vec<ClassSchema>, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let prefix = non_empty(&options.prefix);
    let remote = fetch_remote_schemas(api).await?;

    let filter = NameFilter::new().prefix(prefix).ignore(&options.ignore);
    let mut schemas = filter.apply(remote);
    if let Some(prefix) = prefix {
        schemas = strip_prefix(schemas, prefix);
    }

    store::write_all(schema_path, &schemas).await?;
    Ok(schemas)
}

/// Computes, without applying it, the plan that pushes the local schema at `schema_path`.
pub async fn plan_up<A>(api: &A, schema_path: &Path, options: &UpOptions) -> Result<Plan, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let prefix = non_empty(&options.prefix);
    let local = store::read_all(schema_path).await?;
    let remote = fetch_remote_schemas(api).await?;

    let filter = NameFilter::new().prefix(prefix).ignore(&options.ignore);
    let (local, mut warnings) = match prefix {
        Some(prefix) => {
            let warnings = unprefixed_references(&local);
            (apply_prefix(local, prefix), warnings)
        }
        None => (local, Vec::new()),
    };
    let local: Vec<ClassSchema> = local
        .into_iter()
        .filter(|s| !filter.is_ignored(&s.class_name))
        .collect();
    let remote = filter.apply(remote);

    let mut reconcile_options = options.reconcile.clone();
    reconcile_options.retain_system_classes |= prefix.is_some();

    for warning in &warnings {
        log::warn!("{}", warning);
    }
    let mut plan = reconcile::plan(&local, &remote, &reconcile_options);
    warnings.append(&mut plan.warnings);
    plan.warnings = warnings;
    Ok(plan)
}

/// Pushes the local schema at `schema_path` to the server.
pub async fn up<A>(
    api: &A,
    schema_path: &Path,
    options: &UpOptions,
) -> Result<ReconcileReport, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let plan = plan_up(api, schema_path, options).await?;
    if plan.is_empty() {
        log::info!("Remote schema is up to date");
    }
    reconcile::execute(api, plan, options.reconcile.failure_policy).await
}

/// Drops every class of the local schema from the server.
///
/// With a prefix, system classes are never dropped since they are shared by all prefixes.
pub async fn delete<A>(
    api: &A,
    schema_path: &Path,
    options: &DeleteOptions,
) -> Result<ReconcileReport, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let prefix = non_empty(&options.prefix);
    let local = store::read_all(schema_path).await?;
    let remote = fetch_remote_schemas(api).await?;

    let local = match prefix {
        Some(prefix) => apply_prefix(
            local.into_iter().filter(|s| !s.is_system_class()).collect(),
            prefix,
        ),
        None => local,
    };
    let remote = NameFilter::new().prefix(prefix).apply(remote);

    let plan = reconcile::plan_removal(&local, &remote, options.delete_non_empty_class);
    reconcile::execute(api, plan, options.failure_policy).await
}

/// Generates TypeScript definitions for the remote schema into `out_dir`.
pub async fn typescript<A>(
    api: &A,
    out_dir: &Path,
    options: &TypescriptOptions,
) -> Result<Vec<GeneratedFile>, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let remote = fetch_remote_schemas(api).await?;
    let files = typescript::generate(&remote, options)?;
    typescript::write_files(out_dir, &files).await?;
    Ok(files)
}
