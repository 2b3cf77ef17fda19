// src/client.rs

use crate::api::SchemaApi;
use crate::config::SyncConfig;
use crate::error::ParseError;
use crate::schema::{ClassSchema, GetAllSchemasResponse, SchemaUpdate};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde_json::Value;

/// HTTP client for the schema endpoints of a Parse Server.
///
/// Every request is authenticated with the Application ID and the Master Key, which are set
/// once as default headers on the underlying `reqwest::Client`.
///
/// ```rust,no_run
/// use parse_schema_sync::{ParseClient, ParseError};
/// use parse_schema_sync::api::fetch_remote_schemas;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ParseError> {
/// let client = ParseClient::new("http://localhost:1337/parse", "myAppId", "myMasterKey")?;
/// let schemas = fetch_remote_schemas(&client).await?;
/// for schema in &schemas {
///     println!("{} ({} fields)", schema.class_name, schema.fields.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ParseClient {
    /// Public server URL including the mount path, always ending with `/`.
    pub server_url: Url,
    pub(crate) app_id: String,
    pub(crate) http_client: Client,
}

impl ParseClient {
    /// Creates a new `ParseClient`.
    ///
    /// # Arguments
    ///
    /// * `server_url`: The public URL of the Parse Server including its mount path
    ///   (e.g., `"http://localhost:1337/parse"`). A missing scheme defaults to `http://`.
    /// * `app_id`: Your Parse Application ID.
    /// * `master_key`: Your Parse Master Key. The schema API is only available with it.
    pub fn new(server_url: &str, app_id: &str, master_key: &str) -> Result<Self, ParseError> {
        let mut temp_url_string = server_url.trim().to_string();

        // Ensure scheme is present
        if !temp_url_string.starts_with("http://") && !temp_url_string.starts_with("https://") {
            temp_url_string = format!("http://{}", temp_url_string);
        }
        // A trailing slash keeps the mount path when endpoints are joined.
        if !temp_url_string.ends_with('/') {
            temp_url_string.push('/');
        }

        let parsed_server_url = Url::parse(&temp_url_string)?;
        if parsed_server_url.cannot_be_a_base() {
            return Err(ParseError::InvalidUrl(format!(
                "The server_url '{}' cannot be used as a base URL. Please provide a full URL (e.g., http://localhost:1337/parse).",
                server_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "X-Parse-Application-Id",
            HeaderValue::from_str(app_id).map_err(ParseError::InvalidHeaderValue)?,
        );
        default_headers.insert(
            "X-Parse-Master-Key",
            HeaderValue::from_str(master_key).map_err(ParseError::InvalidHeaderValue)?,
        );

        let http_client = Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(ParseError::ReqwestError)?;

        log::debug!("ParseClient initialized with server_url: {}", parsed_server_url);

        Ok(Self {
            server_url: parsed_server_url,
            app_id: app_id.to_string(),
            http_client,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, ParseError> {
        Self::new(&config.server_url, &config.app_id, &config.master_key)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Resolves an endpoint such as `schemas/_User` against the server URL.
    pub(crate) fn endpoint_url(&self, endpoint: &str) -> Result<Url, ParseError> {
        self.server_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| {
                ParseError::InvalidUrl(format!(
                    "Failed to join base URL '{}' with endpoint '{}': {}",
                    self.server_url, endpoint, e
                ))
            })
    }
}

#[async_trait]
impl SchemaApi for ParseClient {
    async fn list_schemas(&self) -> Result<Vec<Value>, ParseError> {
        let response: GetAllSchemasResponse = self.get("schemas", &[]).await?;
        Ok(response.results)
    }

    async fn create_class(&self, schema: &ClassSchema) -> Result<(), ParseError> {
        let endpoint = format!("schemas/{}", schema.class_name);
        let _created: Value = self.post(&endpoint, schema).await?;
        Ok(())
    }

    async fn update_class(&self, update: &SchemaUpdate) -> Result<(), ParseError> {
        let endpoint = format!("schemas/{}", update.class_name);
        let _updated: Value = self.put(&endpoint, update).await?;
        Ok(())
    }

    async fn delete_class(&self, class_name: &str) -> Result<(), ParseError> {
        let endpoint = format!("schemas/{}", class_name);
        // The response for a successful DELETE is an empty JSON object.
        let _response: Value = self.delete(&endpoint).await?;
        Ok(())
    }

    async fn list_objects(
        &self,
        class_name: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Value>, ParseError> {
        let endpoint = format!("classes/{}", class_name);
        let params = [
            ("keys".to_string(), "objectId".to_string()),
            ("order".to_string(), "objectId".to_string()),
            ("skip".to_string(), skip.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        let response: QueryResponse<Value> = self.get(&endpoint, &params).await?;
        Ok(response.results)
    }

    async fn delete_object(&self, class_name: &str, object_id: &str) -> Result<(), ParseError> {
        let endpoint = format!("classes/{}/{}", class_name, object_id);
        let _response: Value = self.delete(&endpoint).await?;
        Ok(())
    }
}

// Response for standard queries
#[derive(serde::Deserialize, Debug)]
pub struct QueryResponse<T> {
    pub results: Vec<T>,
}
