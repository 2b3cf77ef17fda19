use crate::error::ParseError;
use crate::normalize::normalize_list;
use crate::schema::{ClassSchema, SchemaUpdate};
use async_trait::async_trait;
use serde_json::Value;

/// The schema endpoints of a Parse Server, as used by the reconciler.
///
/// [`crate::ParseClient`] implements this over HTTP. Every method performs exactly one
/// request; callers sequence them.
#[async_trait]
pub trait SchemaApi: Send + Sync {
    /// `GET schemas`. Entries are returned as sent by the server, not normalized.
    async fn list_schemas(&self) -> Result<Vec<Value>, ParseError>;

    /// `POST schemas/{className}` with the full class definition.
    async fn create_class(&self, schema: &ClassSchema) -> Result<(), ParseError>;

    /// `PUT schemas/{className}`.
    async fn update_class(&self, update: &SchemaUpdate) -> Result<(), ParseError>;

    /// `DELETE schemas/{className}`. The server refuses to drop a class that still has objects.
    async fn delete_class(&self, class_name: &str) -> Result<(), ParseError>;

    /// One page of the objects of a class, ordered by `objectId`.
    async fn list_objects(
        &self,
        class_name: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Value>, ParseError>;

    /// `DELETE classes/{className}/{objectId}`.
    async fn delete_object(&self, class_name: &str, object_id: &str) -> Result<(), ParseError>;
}

/// Fetches every remote class schema, normalized and sorted by class name.
pub async fn fetch_remote_schemas<A>(api: &A) -> Result<Vec<ClassSchema>, ParseError>
where
    A: SchemaApi + ?Sized,
{
    let raw = api.list_schemas().await?;
    log::debug!("Fetched {} remote class schemas", raw.len());
    normalize_list(&raw)
}
