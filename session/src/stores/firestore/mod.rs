//! Cloud Firestore (REST v1) document database.
//!
//! # Architecture
//!
//! - **Reads**: `GET documents/{collection}/{id}`
//! - **Writes**: every write goes through `documents:commit`, so field
//!   transforms (array union/remove, increment, server timestamp) are
//!   applied atomically with the plain fields
//! - **Queries**: `documents:runQuery` with a structured query
//!
//! Requests carry the project's API key and, when a user is signed in, the
//! user's ID token so security rules see the caller.

pub mod codec;

use crate::config::FirebaseConfig;
use crate::error::{Result, SessionError};
use crate::providers::{Direction, DocumentDatabase, DocumentUpdate, FieldTransform, Query};
use crate::state::Document;
use crate::stores::firebase_auth::FirebaseCredentials;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Value>,
}

/// Precondition attached to a commit write.
#[derive(Debug, Clone, Copy)]
enum Precondition {
    None,
    Exists,
    Missing,
}

/// Document database backed by Cloud Firestore.
///
/// # Example
///
/// ```no_run
/// use quill_session::config::FirebaseConfig;
/// use quill_session::stores::{FirebaseAuthProvider, FirestoreDatabase};
///
/// let config = FirebaseConfig::from_env()?;
/// let auth = FirebaseAuthProvider::new(config.clone());
/// let db = FirestoreDatabase::new(config).with_credentials(auth.credentials());
/// # Ok::<(), quill_session::SessionError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FirestoreDatabase {
    config: Arc<FirebaseConfig>,
    http_client: Client,
    credentials: Option<FirebaseCredentials>,
}

impl FirestoreDatabase {
    /// Database for a project, unauthenticated.
    #[must_use]
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config: Arc::new(config),
            http_client: Client::new(),
            credentials: None,
        }
    }

    /// Send the signed-in user's ID token with every request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: FirebaseCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// `projects/{project}/databases/{database}/documents`
    fn root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.config.project_id, self.config.database_id
        )
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.root())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.query(&[("key", self.config.api_key.as_str())]);
        match self.credentials.as_ref().and_then(FirebaseCredentials::id_token) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn error_from(response: reqwest::Response, collection: &str, id: &str) -> SessionError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorEnvelope>(&text).ok().map(|e| e.error);

        match body {
            Some(body) if body.status == "NOT_FOUND" => SessionError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            Some(body) if status == StatusCode::TOO_MANY_REQUESTS => {
                tracing::debug!(message = %body.message, "Firestore throttled request");
                SessionError::TooManyRequests
            },
            Some(body) => SessionError::Backend(format!("{}: {}", body.status, body.message)),
            None => SessionError::Backend(format!("Firestore returned {status}")),
        }
    }

    fn write(
        &self,
        collection: &str,
        id: &str,
        update: &DocumentUpdate,
        merge: bool,
        precondition: Precondition,
    ) -> Value {
        let mut write = json!({
            "update": {
                "name": self.document_name(collection, id),
                "fields": codec::encode_fields(&update.fields),
            }
        });

        if merge {
            let paths: Vec<String> = update.fields.keys().map(|k| codec::field_path(k)).collect();
            write["updateMask"] = json!({ "fieldPaths": paths });
        }

        if !update.transforms.is_empty() {
            let transforms: Vec<Value> = update
                .transforms
                .iter()
                .map(|(field, transform)| encode_transform(field, transform))
                .collect();
            write["updateTransforms"] = Value::Array(transforms);
        }

        match precondition {
            Precondition::None => {},
            Precondition::Exists => write["currentDocument"] = json!({ "exists": true }),
            Precondition::Missing => write["currentDocument"] = json!({ "exists": false }),
        }

        write
    }

    async fn commit(&self, collection: &str, id: &str, write: Value) -> Result<()> {
        let url = format!("{}/{}:commit", self.config.firestore_url, self.root());
        let response = self
            .authorize(self.http_client.post(url))
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, collection, id).await);
        }
        tracing::debug!(collection, id, "Committed Firestore write");
        Ok(())
    }
}

/// Whether a 404 body reports that document `name` does not exist, as
/// opposed to a missing database, project or route.
fn missing_document(body: &str, name: &str) -> bool {
    serde_json::from_str::<ErrorEnvelope>(body)
        .is_ok_and(|envelope| envelope.error.status == "NOT_FOUND" && envelope.error.message.contains(name))
}

fn encode_transform(field: &str, transform: &FieldTransform) -> Value {
    let path = codec::field_path(field);
    let encode_all = |values: &[Value]| values.iter().map(codec::encode_value).collect::<Vec<_>>();

    match transform {
        FieldTransform::ArrayUnion(values) => {
            json!({ "fieldPath": path, "appendMissingElements": { "values": encode_all(values) } })
        },
        FieldTransform::ArrayRemove(values) => {
            json!({ "fieldPath": path, "removeAllFromArray": { "values": encode_all(values) } })
        },
        FieldTransform::Increment(by) => {
            json!({ "fieldPath": path, "increment": codec::encode_value(by) })
        },
        FieldTransform::ServerTimestamp => {
            json!({ "fieldPath": path, "setToServerValue": "REQUEST_TIME" })
        },
    }
}

fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|(field, value)| {
            json!({ "fieldFilter": {
                "field": { "fieldPath": codec::field_path(field) },
                "op": "EQUAL",
                "value": codec::encode_value(value),
            }})
        })
        .collect();

    match filters.len() {
        0 => {},
        1 => structured["where"] = filters[0].clone(),
        _ => structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{ "field": { "fieldPath": codec::field_path(field) }, "direction": direction }]);
    }

    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }

    structured
}

impl DocumentDatabase for FirestoreDatabase {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = format!("{}/{}", self.config.firestore_url, self.document_name(collection, id));
        let response = self.authorize(self.http_client.get(url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            let name = self.document_name(collection, id);
            let text = response.text().await.unwrap_or_default();
            if missing_document(&text, &name) {
                return Ok(None);
            }
            tracing::warn!(collection, id, body = %text, "Firestore 404 for something other than the document");
            return Err(SessionError::Backend(format!("Firestore returned 404 reading {name}")));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response, collection, id).await);
        }

        let document: Value = response.json().await?;
        let (_, fields) = codec::decode_document(&document)?;
        Ok(Some(fields))
    }

    async fn set_document(&self, collection: &str, id: &str, write: DocumentUpdate) -> Result<()> {
        let write = self.write(collection, id, &write, false, Precondition::None);
        self.commit(collection, id, write).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate,
    ) -> Result<()> {
        let write = self.write(collection, id, &update, true, Precondition::Exists);
        self.commit(collection, id, write).await
    }

    async fn add_document(&self, collection: &str, write: DocumentUpdate) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let write = self.write(collection, &id, &write, false, Precondition::Missing);
        self.commit(collection, &id, write).await?;
        Ok(id)
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<(String, Document)>> {
        let url = format!("{}/{}:runQuery", self.config.firestore_url, self.root());
        let response = self
            .authorize(self.http_client.post(url))
            .json(&json!({ "structuredQuery": structured_query(collection, &query) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, collection, "").await);
        }

        let items: Vec<RunQueryItem> = response.json().await?;
        items
            .iter()
            .filter_map(|item| item.document.as_ref())
            .map(codec::decode_document)
            .collect()
    }
}
