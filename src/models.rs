use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Collection, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

// Backend records. Optional columns are `Option` or defaulted so a sparse row still decodes.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    #[serde(default)]
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    #[serde(default)]
    pub content: String,
    pub grade: Option<i32>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Record for Profile {
    const COLLECTION: Collection = Collection::Profiles;
}

impl Record for Course {
    const COLLECTION: Collection = Collection::Courses;
}

impl Record for Enrollment {
    const COLLECTION: Collection = Collection::Enrollments;
}

impl Record for Assignment {
    const COLLECTION: Collection = Collection::Assignments;
}

impl Record for Submission {
    const COLLECTION: Collection = Collection::Submissions;
}

impl Record for Message {
    const COLLECTION: Collection = Collection::Messages;
}

// Insert payloads. The backend fills `id` and the creation timestamp.

#[derive(Debug, Clone, Serialize)]
pub struct NewCourse {
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAssignment {
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEnrollment {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub progress: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSubmission {
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
}

// Derived view state, recomputed on every refresh.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Completed,
    /// Declared for scheduling; no derivation rule produces it yet.
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Submitted,
    Graded,
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CourseStatus::Active => "active",
            CourseStatus::Completed => "completed",
            CourseStatus::Upcoming => "upcoming",
        })
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Submitted => "submitted",
            AssignmentStatus::Graded => "graded",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseView {
    pub id: Uuid,
    pub title: String,
    pub instructor_name: String,
    pub progress: u8,
    pub status: CourseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentView {
    pub id: Uuid,
    pub title: String,
    pub course_title: String,
    pub due_date: NaiveDate,
    pub status: AssignmentStatus,
    pub grade: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentView {
    pub id: Uuid,
    pub full_name: String,
    pub derived_email: String,
    pub enrolled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherCourseView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub student_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub course_count: usize,
    pub assignment_count: usize,
    pub pending_count: usize,
    pub average_progress: f64,
    pub average_grade: Option<f64>,
    pub unread_message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherSummary {
    pub course_count: usize,
    pub total_students: usize,
    pub assignment_count: usize,
    pub unread_message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDashboard {
    pub courses: Vec<CourseView>,
    pub assignments: Vec<AssignmentView>,
    pub summary: DashboardSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherDashboard {
    pub courses: Vec<TeacherCourseView>,
    pub summary: TeacherSummary,
}
