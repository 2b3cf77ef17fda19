use async_trait::async_trait;
use dotenvy::dotenv;
use parse_schema_sync::api::SchemaApi;
use parse_schema_sync::error::ParseError;
use parse_schema_sync::schema::{ClassSchema, FieldChange, SchemaUpdate};
use parse_schema_sync::ParseClient;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

fn initialize_logger_once() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub mod shared {
    use super::*;

    /// One call received by the in-memory server.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        ListSchemas,
        CreateClass(String),
        UpdateClass(SchemaUpdate),
        DeleteClass(String),
        ListObjects { class_name: String, skip: usize },
        DeleteObject { class_name: String, object_id: String },
    }

    #[derive(Default)]
    struct State {
        classes: BTreeMap<String, ClassSchema>,
        objects: BTreeMap<String, Vec<String>>,
        calls: Vec<Call>,
        failing_classes: Vec<String>,
        max_limit: Option<usize>,
    }

    /// In-memory Parse schema endpoints.
    ///
    /// Enforces the server rules the reconciler relies on: an existing field cannot be
    /// added again, a missing field cannot be deleted and a class with objects cannot be
    /// dropped. Listed schemas carry the server's default fields and ACL.
    #[derive(Default)]
    pub struct MockParseServer {
        state: Mutex<State>,
    }

    fn api_error(code: i64, message: String) -> ParseError {
        ParseError::from_response(400, json!({ "code": code, "error": message }))
    }

    #[allow(dead_code)]
    impl MockParseServer {
        pub fn new() -> Self {
            initialize_logger_once();
            Self::default()
        }

        pub fn with_classes(classes: Vec<ClassSchema>) -> Self {
            let server = Self::new();
            {
                let mut state = server.state.lock().unwrap();
                for class in classes {
                    state.classes.insert(class.class_name.clone(), class);
                }
            }
            server
        }

        /// Adds `count` objects to `class_name`.
        pub fn add_objects(&self, class_name: &str, count: usize) {
            let mut state = self.state.lock().unwrap();
            let objects = state.objects.entry(class_name.to_string()).or_default();
            let start = objects.len();
            objects.extend((start..start + count).map(|i| format!("obj{:05}", i)));
        }

        pub fn object_count(&self, class_name: &str) -> usize {
            let state = self.state.lock().unwrap();
            state.objects.get(class_name).map_or(0, Vec::len)
        }

        /// Object queries return at most `max_limit` results, like Parse Server's `maxLimit`.
        pub fn set_max_limit(&self, max_limit: usize) {
            self.state.lock().unwrap().max_limit = Some(max_limit);
        }

        /// Every mutating request for `class_name` fails from now on.
        pub fn fail_requests_for(&self, class_name: &str) {
            let mut state = self.state.lock().unwrap();
            state.failing_classes.push(class_name.to_string());
        }

        pub fn class(&self, class_name: &str) -> Option<ClassSchema> {
            self.state.lock().unwrap().classes.get(class_name).cloned()
        }

        pub fn class_names(&self) -> Vec<String> {
            self.state.lock().unwrap().classes.keys().cloned().collect()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        /// Calls that change the schema or data.
        pub fn mutating_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| !matches!(c, Call::ListSchemas | Call::ListObjects { .. }))
                .collect()
        }

        pub fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }

        fn check_failure(state: &State, class_name: &str) -> Result<(), ParseError> {
            if state.failing_classes.iter().any(|c| c == class_name) {
                return Err(ParseError::from_response(
                    500,
                    json!({ "code": 1, "error": format!("Internal server error for {}", class_name) }),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SchemaApi for MockParseServer {
        async fn list_schemas(&self) -> Result<Vec<Value>, ParseError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::ListSchemas);

            let mut results = Vec::new();
            for schema in state.classes.values() {
                let mut value = serde_json::to_value(schema)?;
                let fields = value["fields"].as_object_mut().unwrap();
                fields.insert("objectId".into(), json!({"type": "String"}));
                fields.insert("createdAt".into(), json!({"type": "Date"}));
                fields.insert("updatedAt".into(), json!({"type": "Date"}));
                fields.insert("ACL".into(), json!({"type": "ACL"}));
                results.push(value);
            }
            Ok(results)
        }

        async fn create_class(&self, schema: &ClassSchema) -> Result<(), ParseError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::CreateClass(schema.class_name.clone()));
            Self::check_failure(&state, &schema.class_name)?;

            if state.classes.contains_key(&schema.class_name) {
                return Err(api_error(
                    103,
                    format!("Class {} already exists.", schema.class_name),
                ));
            }
            state
                .classes
                .insert(schema.class_name.clone(), schema.clone());
            Ok(())
        }

        async fn update_class(&self, update: &SchemaUpdate) -> Result<(), ParseError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::UpdateClass(update.clone()));
            Self::check_failure(&state, &update.class_name)?;

            let class = state.classes.get_mut(&update.class_name).ok_or_else(|| {
                api_error(103, format!("Class {} does not exist.", update.class_name))
            })?;

            for (name, change) in &update.fields {
                match change {
                    FieldChange::Delete if !class.fields.contains_key(name) => {
                        return Err(api_error(
                            255,
                            format!("Field {} does not exist, cannot delete.", name),
                        ));
                    }
                    FieldChange::Set(_) if class.fields.contains_key(name) => {
                        return Err(api_error(
                            255,
                            format!("Field {} exists, cannot update.", name),
                        ));
                    }
                    _ => {}
                }
            }

            for (name, change) in &update.fields {
                match change {
                    FieldChange::Delete => {
                        class.fields.remove(name);
                    }
                    FieldChange::Set(spec) => {
                        class.fields.insert(name.clone(), spec.clone());
                    }
                }
            }
            class.class_level_permissions = update.class_level_permissions.clone();
            Ok(())
        }

        async fn delete_class(&self, class_name: &str) -> Result<(), ParseError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::DeleteClass(class_name.to_string()));
            Self::check_failure(&state, class_name)?;

            let count = state.objects.get(class_name).map_or(0, Vec::len);
            if count > 0 {
                return Err(api_error(
                    255,
                    format!(
                        "Class {} is not empty, contains {} objects, cannot drop schema.",
                        class_name, count
                    ),
                ));
            }
            if state.classes.remove(class_name).is_none() {
                return Err(api_error(
                    103,
                    format!("Class {} does not exist.", class_name),
                ));
            }
            Ok(())
        }

        async fn list_objects(
            &self,
            class_name: &str,
            skip: usize,
            limit: usize,
        ) -> Result<Vec<Value>, ParseError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::ListObjects {
                class_name: class_name.to_string(),
                skip,
            });
            let limit = state.max_limit.map_or(limit, |max| limit.min(max));
            let page = state
                .objects
                .get(class_name)
                .map(|ids| {
                    ids.iter()
                        .skip(skip)
                        .take(limit)
                        .map(|id| json!({ "objectId": id }))
                        .collect()
                })
                .unwrap_or_default();
            Ok(page)
        }

        async fn delete_object(&self, class_name: &str, object_id: &str) -> Result<(), ParseError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::DeleteObject {
                class_name: class_name.to_string(),
                object_id: object_id.to_string(),
            });
            let objects = state.objects.entry(class_name.to_string()).or_default();
            let before = objects.len();
            objects.retain(|id| id != object_id);
            if objects.len() == before {
                return Err(api_error(101, "Object not found.".to_string()));
            }
            Ok(())
        }
    }

    // Client for a real Parse Server, configured from `.env`.
    #[allow(dead_code)]
    pub fn setup_client_with_master_key() -> ParseClient {
        initialize_logger_once();
        dotenv().ok();
        let app_id = std::env::var("PARSE_SERVER_APPLICATION_ID")
            .expect("PARSE_SERVER_APPLICATION_ID not set for live server tests");
        let server_url = std::env::var("PARSE_SERVER_URL")
            .expect("PARSE_SERVER_URL not set for live server tests");
        let master_key = std::env::var("PARSE_SERVER_MASTER_KEY")
            .expect("PARSE_SERVER_MASTER_KEY not set for live server tests");
        ParseClient::new(&server_url, &app_id, &master_key)
            .expect("Failed to create Parse client with master key for tests")
    }

    #[allow(dead_code)]
    pub fn generate_unique_prefix(base: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("{}{}", base, &id[..8])
    }
}
