use crate::models::{
    AssignmentStatus, AssignmentView, CourseView, DashboardSummary, TeacherCourseView,
    TeacherSummary,
};

/// Arithmetic mean, 0 for an empty input.
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (count, total) = values
        .into_iter()
        .fold((0usize, 0.0), |(count, total), value| (count + 1, total + value));
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

pub fn average_progress(courses: &[CourseView]) -> f64 {
    mean(courses.iter().map(|c| f64::from(c.progress)))
}

pub fn count_with_status(assignments: &[AssignmentView], status: AssignmentStatus) -> usize {
    assignments.iter().filter(|a| a.status == status).count()
}

/// Mean of the visible grades, `None` until something has been graded.
pub fn average_grade(assignments: &[AssignmentView]) -> Option<f64> {
    let grades: Vec<f64> = assignments
        .iter()
        .filter_map(|a| a.grade.map(f64::from))
        .collect();
    if grades.is_empty() {
        None
    } else {
        Some(mean(grades))
    }
}

pub fn student_summary(
    courses: &[CourseView],
    assignments: &[AssignmentView],
    unread_message_count: usize,
) -> DashboardSummary {
    DashboardSummary {
        course_count: courses.len(),
        assignment_count: assignments.len(),
        pending_count: count_with_status(assignments, AssignmentStatus::Pending),
        average_progress: average_progress(courses),
        average_grade: average_grade(assignments),
        unread_message_count,
    }
}

pub fn teacher_summary(
    courses: &[TeacherCourseView],
    assignment_count: usize,
    unread_message_count: usize,
) -> TeacherSummary {
    TeacherSummary {
        course_count: courses.len(),
        total_students: courses.iter().map(|c| c.student_count).sum(),
        assignment_count,
        unread_message_count,
    }
}
