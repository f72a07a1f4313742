use std::fmt::Write;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row as _};
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{Role, Session, SignUp};
use crate::store::{stamp, AuthProvider, Backend, Collection, Filter, Row};

/// Accounts created without a password carry this hash, which no digest can match.
const LOCKED: &str = "!";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Postgres stand-in for the managed backend: generic record access over the `portal`
/// schema plus password accounts.
pub struct PgStore {
    pool: PgPool,
    session: Mutex<Option<Session>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            session: Mutex::new(None),
        }
    }
}

enum Bind {
    One(String),
    Many(Vec<String>),
}

fn select_sql(
    collection: Collection,
    filters: &[Filter],
) -> Result<(String, Vec<Bind>), BackendError> {
    let mut sql = format!(
        "SELECT row_to_json(t)::jsonb AS row FROM portal.{} t",
        collection.name()
    );
    let mut binds = Vec::new();

    for (index, filter) in filters.iter().enumerate() {
        let field = filter.field();
        collection.ensure_column(field)?;
        sql.push_str(if index == 0 { " WHERE " } else { " AND " });

        match filter {
            Filter::Eq(_, value) => {
                binds.push(Bind::One(value.clone()));
                let _ = write!(sql, "t.{field}::text = ${}", binds.len());
            }
            Filter::In(_, values) => {
                binds.push(Bind::Many(values.clone()));
                let _ = write!(sql, "t.{field}::text = ANY(${})", binds.len());
            }
            Filter::NotIn(_, values) => {
                binds.push(Bind::Many(values.clone()));
                let _ = write!(sql, "NOT (t.{field}::text = ANY(${}))", binds.len());
            }
            Filter::IsNull(_) => {
                let _ = write!(sql, "t.{field} IS NULL");
            }
        }
    }

    let _ = write!(sql, " ORDER BY t.{}, t.id", collection.timestamp_column());
    Ok((sql, binds))
}

fn into_row(value: Value) -> Result<Row, BackendError> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(BackendError::new(format!("expected a record, got {other}"))),
    }
}

#[async_trait]
impl Backend for PgStore {
    async fn select(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Row>, BackendError> {
        let (sql, binds) = select_sql(collection, filters)?;
        tracing::debug!(%collection, filters = filters.len(), "select");

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                Bind::One(value) => query.bind(value),
                Bind::Many(values) => query.bind(values),
            };
        }

        let records = query.fetch_all(&self.pool).await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            rows.push(into_row(record.try_get("row")?)?);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, mut record: Row) -> Result<Row, BackendError> {
        for column in record.keys() {
            collection.ensure_column(column)?;
        }
        stamp(collection, &mut record, Utc::now());

        let sql = format!(
            "INSERT INTO portal.{table} AS t \
             SELECT * FROM jsonb_populate_record(NULL::portal.{table}, $1) \
             RETURNING row_to_json(t)::jsonb AS row",
            table = collection.name()
        );
        let stored = sqlx::query(&sql)
            .bind(Value::Object(record))
            .fetch_one(&self.pool)
            .await?;
        into_row(stored.try_get("row")?)
    }
}

#[async_trait]
impl AuthProvider for PgStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let record = sqlx::query(
            r#"
            SELECT a.profile_id, a.salt, a.password_hash, p.full_name, p.role
            FROM portal.accounts a
            JOIN portal.profiles p ON p.id = a.profile_id
            WHERE a.email = $1
            "#,
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        let invalid = || BackendError::new("Invalid login credentials");
        let record = record.ok_or_else(invalid)?;
        let salt: String = record.try_get("salt")?;
        let hash: String = record.try_get("password_hash")?;
        if hash != password_digest(&salt, password) {
            return Err(invalid());
        }

        let role: Option<String> = record.try_get("role")?;
        let session = Session {
            user_id: record.try_get("profile_id")?,
            role: role
                .as_deref()
                .unwrap_or_default()
                .parse()
                .map_err(BackendError::new)?,
            full_name: record.try_get("full_name")?,
        };
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUp) -> Result<Session, BackendError> {
        let profile_id = Uuid::new_v4();
        let salt = Uuid::new_v4().simple().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO portal.profiles (id, full_name, role, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(profile_id)
        .bind(&request.full_name)
        .bind(request.role.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO portal.accounts (profile_id, email, salt, password_hash)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(profile_id)
        .bind(request.email.to_lowercase())
        .bind(&salt)
        .bind(password_digest(&salt, &request.password))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(BackendError::new("User already registered"));
            }
            Err(err) => return Err(err.into()),
        }
        tx.commit().await?;

        let session = Session {
            user_id: profile_id,
            role: request.role,
            full_name: request.full_name.clone(),
        };
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }

    fn current_session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    fn sign_out(&self) {
        *self.session.lock() = None;
    }
}

async fn upsert_person(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    email: &str,
    role: Role,
    password: Option<&str>,
) -> anyhow::Result<Uuid> {
    if let Some(existing) =
        sqlx::query("SELECT profile_id FROM portal.accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?
    {
        return Ok(existing.get("profile_id"));
    }

    let salt = Uuid::new_v4().simple().to_string();
    let hash = password.map_or_else(|| LOCKED.to_string(), |p| password_digest(&salt, p));

    sqlx::query(
        r#"
        INSERT INTO portal.profiles (id, full_name, role, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO portal.accounts (profile_id, email, salt, password_hash)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(salt)
    .bind(hash)
    .execute(pool)
    .await?;

    Ok(id)
}

pub const SEED_PASSWORD: &str = "classroom";

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let teacher = upsert_person(
        pool,
        Uuid::parse_str("6b1f3c1e-2d7a-4a53-9a0e-2f6d1c0b7a11")?,
        "Dr. Smith",
        "smith@school.edu",
        Role::Teacher,
        Some(SEED_PASSWORD),
    )
    .await?;

    let people = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@school.edu",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@school.edu",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@school.edu",
        ),
    ];
    let mut students = Vec::new();
    for (id, name, email) in people {
        let id = upsert_person(pool, id, name, email, Role::Student, Some(SEED_PASSWORD)).await?;
        students.push(id);
    }

    let courses = vec![
        (
            Uuid::parse_str("a1c3e5f7-0b2d-4f6a-8c1e-3a5b7d9f1c20")?,
            "Introduction to React",
            "Learn the fundamentals of React development",
        ),
        (
            Uuid::parse_str("b2d4f6a8-1c3e-4a7b-9d2f-4b6c8e0a2d31")?,
            "Web Design Principles",
            "Layout, typography and colour for the web",
        ),
    ];
    for (id, title, description) in &courses {
        sqlx::query(
            r#"
            INSERT INTO portal.courses (id, teacher_id, title, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(teacher)
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    }

    let enrollments = vec![
        (students[0], courses[0].0, 75),
        (students[0], courses[1].0, 100),
        (students[1], courses[0].0, 45),
    ];
    for (student_id, course_id, progress) in enrollments {
        sqlx::query(
            r#"
            INSERT INTO portal.enrollments (id, student_id, course_id, progress, enrolled_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .bind(progress)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    }

    let assignments = vec![
        (
            Uuid::parse_str("c3e5a7b9-2d4f-4b8c-8e3a-5c7d9f1b3e42")?,
            courses[0].0,
            "React Components Exercise",
            NaiveDate::from_ymd_opt(2026, 2, 25).context("invalid date")?,
        ),
        (
            Uuid::parse_str("d4f6b8c0-3e5a-4c9d-9f4b-6d8e0a2c4f53")?,
            courses[1].0,
            "Design Portfolio",
            NaiveDate::from_ymd_opt(2026, 2, 15).context("invalid date")?,
        ),
    ];
    for (id, course_id, title, due_date) in &assignments {
        sqlx::query(
            r#"
            INSERT INTO portal.assignments (id, course_id, title, description, due_date, created_at)
            VALUES ($1, $2, $3, '', $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(course_id)
        .bind(title)
        .bind(due_date)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO portal.submissions
        (id, assignment_id, student_id, content, grade, submitted_at, graded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::parse_str("e5a7c9d1-4f6b-4d0e-8a5c-7e9f1b3d5a64")?)
    .bind(assignments[1].0)
    .bind(students[0])
    .bind("Portfolio link")
    .bind(92)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Imports a roster CSV (`full_name,email,role,course_title`). Imported accounts are locked
/// until a password is set. Returns the number of new enrollments.
pub async fn import_roster(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        role: String,
        course_title: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let role: Role = row
            .role
            .parse()
            .map_err(|err: String| anyhow::anyhow!("row {}: {err}", line + 1))?;
        let full_name = crate::sanitize::sanitize(&row.full_name);
        let email = row.email.trim().to_lowercase();
        let profile_id =
            upsert_person(pool, Uuid::new_v4(), &full_name, &email, role, None).await?;

        let Some(course_title) = row.course_title.filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        if role != Role::Student {
            tracing::warn!(email = %email, "only students can be enrolled; skipping course");
            continue;
        }

        let course = sqlx::query(
            "SELECT id FROM portal.courses WHERE title = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(course_title.trim())
        .fetch_optional(pool)
        .await?;
        let Some(course) = course else {
            tracing::warn!(course = %course_title, "course not found; skipping enrollment");
            continue;
        };
        let course_id: Uuid = course.get("id");

        let result = sqlx::query(
            r#"
            INSERT INTO portal.enrollments (id, student_id, course_id, progress, enrolled_at)
            VALUES ($1, $2, $3, 0, $4)
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
