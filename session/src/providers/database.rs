//! Document database trait and write/query descriptions.

use crate::error::Result;
use crate::state::Document;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::future::Future;

/// Server-side transformation of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTransform {
    /// Append each element not already present.
    ArrayUnion(Vec<Value>),

    /// Remove every occurrence of each element.
    ArrayRemove(Vec<Value>),

    /// Add a number to the current value (missing counts as zero).
    Increment(Value),

    /// Set the field to the time the server applied the write.
    ServerTimestamp,
}

/// A write against one document: plain field values plus transforms.
///
/// # Examples
///
/// ```
/// # use quill_session::providers::{DocumentUpdate, FieldTransform};
/// # use serde_json::json;
/// let update = DocumentUpdate::new()
///     .set("title", json!("Hello"))
///     .transform("viewCount", FieldTransform::Increment(json!(1)));
/// assert_eq!(update.fields.len(), 1);
/// assert_eq!(update.transforms.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    /// Fields written as-is.
    pub fields: Document,

    /// Fields computed by the database.
    pub transforms: Vec<(String, FieldTransform)>,
}

impl DocumentUpdate {
    /// Empty write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write built from a complete document.
    #[must_use]
    pub fn from_document(fields: Document) -> Self {
        Self {
            fields,
            transforms: Vec::new(),
        }
    }

    /// Set a field value.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Add a field transform.
    #[must_use]
    pub fn transform(mut self, field: impl Into<String>, transform: FieldTransform) -> Self {
        self.transforms.push((field.into(), transform));
        self
    }

    /// Apply this write to an in-memory document, resolving server
    /// timestamps to `now`.
    pub fn apply_to(&self, document: &mut Document, now: DateTime<Utc>) {
        for (field, value) in &self.fields {
            document.insert(field.clone(), value.clone());
        }

        for (field, transform) in &self.transforms {
            let current = document.remove(field);
            let next = match transform {
                FieldTransform::ArrayUnion(values) => {
                    let mut items = into_array(current);
                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                    Value::Array(items)
                },
                FieldTransform::ArrayRemove(values) => {
                    let mut items = into_array(current);
                    items.retain(|item| !values.contains(item));
                    Value::Array(items)
                },
                FieldTransform::Increment(by) => add_numbers(current.as_ref(), by),
                FieldTransform::ServerTimestamp => {
                    Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
                },
            };
            document.insert(field.clone(), next);
        }
    }
}

fn into_array(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn add_numbers(current: Option<&Value>, by: &Value) -> Value {
    let current = current.filter(|value| value.is_number());
    match (current.and_then(Value::as_i64), by.as_i64()) {
        (Some(a), Some(b)) => Value::from(a.saturating_add(b)),
        (None, Some(b)) if current.is_none() => Value::from(b),
        _ => {
            let sum = current.and_then(Value::as_f64).unwrap_or(0.0) + by.as_f64().unwrap_or(0.0);
            Value::from(sum)
        },
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Collection query: equality filters, one ordering, optional limit.
///
/// Documents missing the ordered field are not returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// `(field, value)` pairs that must all match.
    pub filters: Vec<(String, Value)>,

    /// Field and direction to sort by.
    pub order_by: Option<(String, Direction)>,

    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Unfiltered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    /// Sort by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Return at most `limit` documents.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document database.
///
/// This trait abstracts over the hosted document store (Firestore).
///
/// # Implementation Notes
///
/// - Documents are addressed by `(collection, id)`
/// - Field transforms are applied atomically by the backend
pub trait DocumentDatabase: Send + Sync {
    /// Read one document.
    ///
    /// # Returns
    ///
    /// `None` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>>> + Send;

    /// Create or replace a document.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        write: DocumentUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Merge fields into an existing document.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The document does not exist → `SessionError::DocumentNotFound`
    /// - The request fails
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        update: DocumentUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create a document with a generated id.
    ///
    /// # Returns
    ///
    /// The new document's id.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn add_document(
        &self,
        collection: &str,
        write: DocumentUpdate,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Run a query against one collection.
    ///
    /// # Returns
    ///
    /// `(id, document)` pairs in query order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn query(
        &self,
        collection: &str,
        query: Query,
    ) -> impl Future<Output = Result<Vec<(String, Document)>>> + Send;
}
