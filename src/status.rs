use crate::models::{AssignmentStatus, CourseStatus, Submission};

pub fn clamp_percent(raw: i32) -> u8 {
    raw.clamp(0, 100) as u8
}

pub fn course_status(progress: u8) -> CourseStatus {
    if progress == 100 {
        CourseStatus::Completed
    } else {
        CourseStatus::Active
    }
}

pub fn assignment_status(submission: Option<&Submission>) -> AssignmentStatus {
    match submission {
        Some(s) if s.graded_at.is_some() => AssignmentStatus::Graded,
        Some(_) => AssignmentStatus::Submitted,
        None => AssignmentStatus::Pending,
    }
}

/// A grade is only shown once the submission has been graded, even if the row
/// already carries one.
pub fn visible_grade(status: AssignmentStatus, submission: Option<&Submission>) -> Option<u8> {
    if status != AssignmentStatus::Graded {
        return None;
    }
    submission.and_then(|s| s.grade).map(clamp_percent)
}
