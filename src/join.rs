use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Assignment, AssignmentView, Course, CourseView, Enrollment, Profile, StudentView, Submission,
    TeacherCourseView,
};
use crate::status;

pub const UNKNOWN_NAME: &str = "Unknown";

/// How an assignment's submissions collapse to the one that drives its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPick {
    /// First matching submission in backend order.
    First,
    /// Latest `submitted_at`; ties go to the later row.
    #[default]
    MostRecent,
}

impl SubmissionPick {
    pub fn pick<'a>(&self, matched: &[&'a Submission]) -> Option<&'a Submission> {
        match self {
            SubmissionPick::First => matched.first().copied(),
            SubmissionPick::MostRecent => matched.iter().copied().max_by_key(|s| s.submitted_at),
        }
    }
}

impl FromStr for SubmissionPick {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(SubmissionPick::First),
            "most-recent" | "most_recent" | "latest" => Ok(SubmissionPick::MostRecent),
            other => Err(format!("unknown submission pick '{other}'")),
        }
    }
}

/// Display-only address synthesized from a name, e.g. "Avery Lee" -> "avery.lee@student.com".
pub fn derived_email(full_name: &str) -> String {
    format!("{}@student.com", full_name.trim().to_lowercase().replace(' ', "."))
}

fn by_id<T, F>(records: &[T], id: F) -> HashMap<Uuid, &T>
where
    F: Fn(&T) -> Uuid,
{
    records.iter().map(|record| (id(record), record)).collect()
}

/// One row per enrollment. A missing course keeps the row with an empty title and an
/// unknown instructor.
pub fn course_views(
    enrollments: &[Enrollment],
    courses: &[Course],
    profiles: &[Profile],
) -> Vec<CourseView> {
    let courses = by_id(courses, |c| c.id);
    let profiles = by_id(profiles, |p| p.id);

    enrollments
        .iter()
        .map(|enrollment| {
            let course = courses.get(&enrollment.course_id);
            let instructor_name = course
                .and_then(|c| profiles.get(&c.teacher_id))
                .map(|p| p.full_name.clone())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string());
            let progress = status::clamp_percent(enrollment.progress);

            CourseView {
                id: enrollment.course_id,
                title: course.map(|c| c.title.clone()).unwrap_or_default(),
                instructor_name,
                progress,
                status: status::course_status(progress),
            }
        })
        .collect()
}

/// One row per assignment, its status taken from the submission `pick` selects.
/// `submissions` are expected to belong to a single student.
pub fn assignment_views(
    assignments: &[Assignment],
    courses: &[Course],
    submissions: &[Submission],
    pick: SubmissionPick,
) -> Vec<AssignmentView> {
    let courses = by_id(courses, |c| c.id);
    let mut by_assignment: HashMap<Uuid, Vec<&Submission>> = HashMap::new();
    for submission in submissions {
        by_assignment
            .entry(submission.assignment_id)
            .or_default()
            .push(submission);
    }

    assignments
        .iter()
        .map(|assignment| {
            let chosen = by_assignment
                .get(&assignment.id)
                .and_then(|matched| pick.pick(matched));
            let status = status::assignment_status(chosen);

            AssignmentView {
                id: assignment.id,
                title: assignment.title.clone(),
                course_title: courses
                    .get(&assignment.course_id)
                    .map(|c| c.title.clone())
                    .unwrap_or_default(),
                due_date: assignment.due_date,
                status,
                grade: status::visible_grade(status, chosen),
            }
        })
        .collect()
}

pub fn student_view(profile: &Profile, enrolled_at: Option<DateTime<Utc>>) -> StudentView {
    StudentView {
        id: profile.id,
        full_name: profile.full_name.clone(),
        derived_email: derived_email(&profile.full_name),
        enrolled_at,
    }
}

/// Roster rows, one per enrollment; unknown students are kept under a placeholder name.
pub fn roster_views(enrollments: &[Enrollment], profiles: &[Profile]) -> Vec<StudentView> {
    let profiles = by_id(profiles, |p| p.id);

    enrollments
        .iter()
        .map(|enrollment| match profiles.get(&enrollment.student_id) {
            Some(profile) => student_view(profile, Some(enrollment.enrolled_at)),
            None => StudentView {
                id: enrollment.student_id,
                full_name: UNKNOWN_NAME.to_string(),
                derived_email: derived_email(UNKNOWN_NAME),
                enrolled_at: Some(enrollment.enrolled_at),
            },
        })
        .collect()
}

pub fn teacher_course_views(
    courses: &[Course],
    enrollments: &[Enrollment],
) -> Vec<TeacherCourseView> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for enrollment in enrollments {
        *counts.entry(enrollment.course_id).or_insert(0) += 1;
    }

    courses
        .iter()
        .map(|course| TeacherCourseView {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            student_count: counts.get(&course.id).copied().unwrap_or(0),
            created_at: course.created_at,
        })
        .collect()
}
