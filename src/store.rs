use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{Session, SignUp};

pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Profiles,
    Courses,
    Enrollments,
    Assignments,
    Submissions,
    Messages,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Courses => "courses",
            Collection::Enrollments => "enrollments",
            Collection::Assignments => "assignments",
            Collection::Submissions => "submissions",
            Collection::Messages => "messages",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Profiles => &["id", "full_name", "role", "created_at"],
            Collection::Courses => &["id", "teacher_id", "title", "description", "created_at"],
            Collection::Enrollments => &[
                "id",
                "student_id",
                "course_id",
                "progress",
                "enrolled_at",
            ],
            Collection::Assignments => &[
                "id",
                "course_id",
                "title",
                "description",
                "due_date",
                "created_at",
            ],
            Collection::Submissions => &[
                "id",
                "assignment_id",
                "student_id",
                "content",
                "grade",
                "submitted_at",
                "graded_at",
            ],
            Collection::Messages => &[
                "id",
                "sender_id",
                "recipient_id",
                "body",
                "created_at",
                "read_at",
            ],
        }
    }

    /// Column the backend stamps with the insertion time.
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Collection::Enrollments => "enrolled_at",
            Collection::Submissions => "submitted_at",
            _ => "created_at",
        }
    }

    pub fn ensure_column(&self, field: &str) -> Result<(), BackendError> {
        if self.columns().contains(&field) {
            Ok(())
        } else {
            Err(BackendError::new(format!(
                "unknown column '{field}' on {}",
                self.name()
            )))
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The primary row holds the foreign key.
    BelongsTo { foreign_key: &'static str },
    /// The related rows hold a foreign key to the primary row's `id`.
    HasMany { foreign_key: &'static str },
}

pub fn relation(from: Collection, to: Collection) -> Option<Relation> {
    use Collection::*;

    let relation = match (from, to) {
        (Enrollments, Courses) => Relation::BelongsTo { foreign_key: "course_id" },
        (Enrollments, Profiles) => Relation::BelongsTo { foreign_key: "student_id" },
        (Courses, Profiles) => Relation::BelongsTo { foreign_key: "teacher_id" },
        (Courses, Enrollments) => Relation::HasMany { foreign_key: "course_id" },
        (Courses, Assignments) => Relation::HasMany { foreign_key: "course_id" },
        (Assignments, Courses) => Relation::BelongsTo { foreign_key: "course_id" },
        (Assignments, Submissions) => Relation::HasMany { foreign_key: "assignment_id" },
        (Submissions, Assignments) => Relation::BelongsTo { foreign_key: "assignment_id" },
        (Messages, Profiles) => Relation::BelongsTo { foreign_key: "sender_id" },
        _ => return None,
    };
    Some(relation)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(&'static str, String),
    In(&'static str, Vec<String>),
    NotIn(&'static str, Vec<String>),
    IsNull(&'static str),
}

impl Filter {
    pub fn field(&self) -> &'static str {
        match self {
            Filter::Eq(field, _)
            | Filter::In(field, _)
            | Filter::NotIn(field, _)
            | Filter::IsNull(field) => field,
        }
    }

    pub fn eq(field: &'static str, value: impl ToString) -> Self {
        Filter::Eq(field, value.to_string())
    }

    pub fn any_of<I, V>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        Filter::In(field, values.into_iter().map(|v| v.to_string()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub include: Vec<Collection>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            include: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn include(mut self, related: Collection) -> Self {
        self.include.push(related);
        self
    }
}

/// Primary rows of a query plus the rows of every included collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub rows: Vec<Row>,
    pub related: BTreeMap<Collection, Vec<Row>>,
}

impl RecordSet {
    pub fn decode<T: Record>(&self) -> Result<Vec<T>, BackendError> {
        decode(self.rows.clone())
    }

    /// Rows of an included collection; empty when it was not included.
    pub fn related<T: Record>(&self) -> Result<Vec<T>, BackendError> {
        match self.related.get(&T::COLLECTION) {
            Some(rows) => decode(rows.clone()),
            None => Ok(Vec::new()),
        }
    }
}

/// A typed record stored in a known collection.
pub trait Record: DeserializeOwned {
    const COLLECTION: Collection;
}

pub fn decode<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, BackendError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(BackendError::from))
        .collect()
}

/// Filter/comparison text of a scalar cell; `None` for null and nested values.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Fills the generated `id` and creation timestamp when the caller left them out.
pub fn stamp(collection: Collection, row: &mut Row, now: DateTime<Utc>) {
    row.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    row.entry(collection.timestamp_column())
        .or_insert_with(|| Value::String(now.to_rfc3339()));
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Row>, BackendError>;

    /// Persists `record` and returns the stored row, generated fields included.
    async fn insert(&self, collection: Collection, record: Row) -> Result<Row, BackendError>;

    async fn query(&self, query: &Query) -> Result<RecordSet, BackendError> {
        let rows = self.select(query.collection, &query.filters).await?;
        let mut related = BTreeMap::new();

        for &target in &query.include {
            let (key_field, lookup_field) = match relation(query.collection, target) {
                Some(Relation::BelongsTo { foreign_key }) => (foreign_key, "id"),
                Some(Relation::HasMany { foreign_key }) => ("id", foreign_key),
                None => {
                    return Err(BackendError::new(format!(
                        "{} has no relation to {}",
                        query.collection, target
                    )))
                }
            };

            let keys: BTreeSet<String> = rows
                .iter()
                .filter_map(|row| row.get(key_field).and_then(cell_text))
                .collect();
            let fetched = if keys.is_empty() {
                Vec::new()
            } else {
                self.select(target, &[Filter::In(lookup_field, keys.into_iter().collect())])
                    .await?
            };
            related.insert(target, fetched);
        }

        Ok(RecordSet { rows, related })
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;
    async fn sign_up(&self, request: &SignUp) -> Result<Session, BackendError>;
    fn current_session(&self) -> Option<Session>;
    fn sign_out(&self);
}

pub async fn fetch<T, B>(backend: &B, filters: &[Filter]) -> Result<Vec<T>, BackendError>
where
    T: Record,
    B: Backend + ?Sized,
{
    let rows = backend.select(T::COLLECTION, filters).await?;
    decode(rows)
}

pub async fn insert_record<T, P, B>(backend: &B, payload: &P) -> Result<T, BackendError>
where
    T: Record,
    P: Serialize + Sync,
    B: Backend + ?Sized,
{
    let row = match serde_json::to_value(payload)? {
        Value::Object(row) => row,
        other => {
            return Err(BackendError::new(format!(
                "insert payload for {} must be an object, got {other}",
                T::COLLECTION
            )))
        }
    };
    let stored = backend.insert(T::COLLECTION, row).await?;
    Ok(serde_json::from_value(Value::Object(stored))?)
}
