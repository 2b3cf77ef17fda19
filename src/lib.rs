pub mod api;
pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod reconcile;
mod requests;
pub mod schema;
pub mod store;
pub mod sync;
pub mod typescript;

pub use api::{fetch_remote_schemas, SchemaApi};
pub use client::ParseClient;
pub use config::SyncConfig;
pub use error::ParseError;
pub use filter::NameFilter;
pub use reconcile::{FailurePolicy, Plan, ReconcileOptions, ReconcileReport};
pub use schema::{ClassLevelPermissions, ClassSchema, FieldSpec, FieldType, Permission};
pub use typescript::TypescriptOptions;
