use std::fmt::Write;

use crate::models::{
    AssignmentStatus, Session, StudentDashboard, StudentView, TeacherDashboard,
};

fn grade_label(status: AssignmentStatus, grade: Option<u8>) -> String {
    match (status, grade) {
        (AssignmentStatus::Graded, Some(grade)) => format!("graded {grade}%"),
        (status, _) => status.to_string(),
    }
}

pub fn render_student_dashboard(session: &Session, dashboard: &StudentDashboard) -> String {
    let summary = &dashboard.summary;
    let mut output = String::new();

    let _ = writeln!(output, "# Student Dashboard");
    let _ = writeln!(output, "Welcome back, {}", session.full_name);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} courses, {} assignments, {:.1}% average progress, {} unread messages",
        summary.course_count,
        summary.assignment_count,
        summary.average_progress,
        summary.unread_message_count
    );
    match summary.average_grade {
        Some(grade) => {
            let _ = writeln!(
                output,
                "{} pending, average grade {:.1}%",
                summary.pending_count, grade
            );
        }
        None => {
            let _ = writeln!(output, "{} pending, nothing graded yet", summary.pending_count);
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## My Courses");

    if dashboard.courses.is_empty() {
        let _ = writeln!(output, "Not enrolled in any courses yet.");
    } else {
        for course in &dashboard.courses {
            let _ = writeln!(
                output,
                "- {} with {}: {}% ({})",
                course.title, course.instructor_name, course.progress, course.status
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Assignments");

    if dashboard.assignments.is_empty() {
        let _ = writeln!(output, "No assignments yet.");
    } else {
        for assignment in &dashboard.assignments {
            let _ = writeln!(
                output,
                "- {} ({}) due {}: {}",
                assignment.title,
                assignment.course_title,
                assignment.due_date,
                grade_label(assignment.status, assignment.grade)
            );
        }
    }

    output
}

pub fn render_teacher_dashboard(session: &Session, dashboard: &TeacherDashboard) -> String {
    let summary = &dashboard.summary;
    let mut output = String::new();

    let _ = writeln!(output, "# Teacher Dashboard");
    let _ = writeln!(output, "Welcome back, {}", session.full_name);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} courses, {} students, {} assignments, {} unread messages",
        summary.course_count,
        summary.total_students,
        summary.assignment_count,
        summary.unread_message_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## My Courses");

    if dashboard.courses.is_empty() {
        let _ = writeln!(output, "No courses created yet.");
    } else {
        for course in &dashboard.courses {
            let _ = writeln!(
                output,
                "- {} [{}]: {} students",
                course.title, course.id, course.student_count
            );
            if !course.description.is_empty() {
                let _ = writeln!(output, "  {}", course.description);
            }
        }
    }

    output
}

pub fn render_students(heading: &str, students: &[StudentView]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {heading}");

    if students.is_empty() {
        let _ = writeln!(output, "No students.");
    }
    for student in students {
        let _ = write!(
            output,
            "- {} <{}> [{}]",
            student.full_name, student.derived_email, student.id
        );
        match student.enrolled_at {
            Some(at) => {
                let _ = writeln!(output, " enrolled {}", at.date_naive());
            }
            None => {
                let _ = writeln!(output);
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::{
        AssignmentView, CourseStatus, CourseView, DashboardSummary, Role, TeacherCourseView,
        TeacherSummary,
    };
    use crate::store::memory::session;

    #[test]
    fn student_dashboard_lists_courses_and_grades() {
        let dashboard = StudentDashboard {
            courses: vec![CourseView {
                id: Uuid::new_v4(),
                title: "Introduction to React".into(),
                instructor_name: "Dr. Smith".into(),
                progress: 100,
                status: CourseStatus::Completed,
            }],
            assignments: vec![
                AssignmentView {
                    id: Uuid::new_v4(),
                    title: "Design Portfolio".into(),
                    course_title: "Web Design".into(),
                    due_date: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
                    status: AssignmentStatus::Graded,
                    grade: Some(92),
                },
                AssignmentView {
                    id: Uuid::new_v4(),
                    title: "Quiz".into(),
                    course_title: "Web Design".into(),
                    due_date: NaiveDate::from_ymd_opt(2026, 2, 22).unwrap(),
                    status: AssignmentStatus::Pending,
                    grade: None,
                },
            ],
            summary: DashboardSummary {
                course_count: 1,
                assignment_count: 2,
                pending_count: 1,
                average_progress: 100.0,
                average_grade: Some(92.0),
                unread_message_count: 0,
            },
        };

        let report = render_student_dashboard(&session(Role::Student, "Avery Lee"), &dashboard);

        assert!(report.starts_with("# Student Dashboard\nWelcome back, Avery Lee\n"));
        assert!(report.contains("1 courses, 2 assignments, 100.0% average progress"));
        assert!(report.contains("- Introduction to React with Dr. Smith: 100% (completed)"));
        assert!(report.contains("- Design Portfolio (Web Design) due 2026-02-15: graded 92%"));
        assert!(report.contains("- Quiz (Web Design) due 2026-02-22: pending"));
        assert!(report.contains("1 pending, average grade 92.0%"));
    }

    #[test]
    fn empty_dashboards_say_so() {
        let student = StudentDashboard {
            courses: Vec::new(),
            assignments: Vec::new(),
            summary: DashboardSummary {
                course_count: 0,
                assignment_count: 0,
                pending_count: 0,
                average_progress: 0.0,
                average_grade: None,
                unread_message_count: 3,
            },
        };
        let report = render_student_dashboard(&session(Role::Student, "Kiara"), &student);
        assert!(report.contains("Not enrolled in any courses yet."));
        assert!(report.contains("No assignments yet."));
        assert!(report.contains("3 unread messages"));
        assert!(report.contains("0 pending, nothing graded yet"));

        let teacher = TeacherDashboard {
            courses: Vec::new(),
            summary: TeacherSummary {
                course_count: 0,
                total_students: 0,
                assignment_count: 0,
                unread_message_count: 0,
            },
        };
        let report = render_teacher_dashboard(&session(Role::Teacher, "Dr. Smith"), &teacher);
        assert!(report.contains("No courses created yet."));
    }

    #[test]
    fn teacher_dashboard_shows_course_ids_for_follow_up_commands() {
        let id = Uuid::new_v4();
        let dashboard = TeacherDashboard {
            courses: vec![TeacherCourseView {
                id,
                title: "Web Design".into(),
                description: "Layout and type".into(),
                student_count: 2,
                created_at: chrono::Utc::now(),
            }],
            summary: TeacherSummary {
                course_count: 1,
                total_students: 2,
                assignment_count: 4,
                unread_message_count: 1,
            },
        };

        let report = render_teacher_dashboard(&session(Role::Teacher, "Dr. Smith"), &dashboard);
        assert!(report.contains(&format!("- Web Design [{id}]: 2 students\n  Layout and type\n")));
        assert!(report.contains("1 courses, 2 students, 4 assignments, 1 unread messages"));
    }

    #[test]
    fn student_list_marks_enrollment_dates() {
        let students = vec![StudentView {
            id: Uuid::nil(),
            full_name: "Jules Moreno".into(),
            derived_email: "jules.moreno@student.com".into(),
            enrolled_at: Some("2026-01-05T10:00:00Z".parse().unwrap()),
        }];
        let report = render_students("Roster", &students);
        assert_eq!(
            report,
            format!(
                "## Roster\n- Jules Moreno <jules.moreno@student.com> [{}] enrolled 2026-01-05\n",
                Uuid::nil()
            )
        );
        assert_eq!(render_students("Available", &[]), "## Available\nNo students.\n");
    }
}
