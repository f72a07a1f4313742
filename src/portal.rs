use std::collections::BTreeSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::availability;
use crate::config::PortalSettings;
use crate::error::PortalError;
use crate::join;
use crate::models::{
    Assignment, Course, Enrollment, Message, NewAssignment, NewCourse, NewEnrollment, NewMessage,
    NewSubmission, Profile, Role, Session, SignUp, StudentDashboard, StudentView, Submission,
    TeacherDashboard,
};
use crate::store::{fetch, insert_record, AuthProvider, Backend, Collection, Filter, Query, Record};
use crate::summary;
use crate::throttle::{Clock, LedgerStore, MemoryLedger, SystemClock, Throttle};
use crate::validation::{
    validate_email, validate_password, validate_text, FieldErrors, DEFAULT_TEXT_MAX,
};

pub const SIGN_IN_KEY: &str = "signin";
pub const SIGN_UP_KEY: &str = "signup";

pub const NAME_MAX: usize = 100;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = DEFAULT_TEXT_MAX;
pub const SUBMISSION_MAX: usize = 5000;
pub const MESSAGE_MAX: usize = 1000;

/// Guarded mutations and dashboard refreshes on top of a backend.
///
/// Every write goes through validation first (and the throttle, for auth actions); only
/// sanitized values reach the backend. Reads join and derive view state from raw records.
pub struct Portal<'a, B, C = SystemClock, S = MemoryLedger> {
    backend: &'a B,
    throttle: &'a Throttle<C, S>,
    settings: &'a PortalSettings,
}

fn reject_invalid(form: &'static str, errors: FieldErrors) -> Result<(), PortalError> {
    errors.into_result().map_err(|errors| {
        for (field, error) in errors.iter() {
            tracing::debug!(form, field, code = error.code(), "{error}");
        }
        tracing::warn!(form, count = errors.len(), "validation failed");
        PortalError::Validation(errors)
    })
}

impl<'a, B, C, S> Portal<'a, B, C, S>
where
    B: Backend + AuthProvider,
    C: Clock,
    S: LedgerStore,
{
    pub fn new(backend: &'a B, throttle: &'a Throttle<C, S>, settings: &'a PortalSettings) -> Self {
        Self {
            backend,
            throttle,
            settings,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, PortalError> {
        if !self
            .throttle
            .check_policy(SIGN_IN_KEY, &self.settings.sign_in)
        {
            tracing::warn!(action = SIGN_IN_KEY, "too many attempts");
            return Err(PortalError::ThrottleExceeded {
                action: "sign-in".to_string(),
            });
        }

        let mut errors = FieldErrors::default();
        let email = errors.check("email", validate_email(email));
        errors.check_password("password", validate_password(password));
        reject_invalid("sign-in", errors)?;

        let session = self.backend.sign_in(&email, password).await?;
        tracing::info!(user_id = %session.user_id, role = %session.role, "signed in");
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Session, PortalError> {
        if !self
            .throttle
            .check_policy(SIGN_UP_KEY, &self.settings.sign_up)
        {
            tracing::warn!(action = SIGN_UP_KEY, "too many attempts");
            return Err(PortalError::ThrottleExceeded {
                action: "sign-up".to_string(),
            });
        }

        let mut errors = FieldErrors::default();
        let email = errors.check("email", validate_email(email));
        errors.check_password("password", validate_password(password));
        let full_name = errors.check("full_name", validate_text(full_name, NAME_MAX));
        reject_invalid("sign-up", errors)?;

        let session = self
            .backend
            .sign_up(&SignUp {
                full_name,
                email,
                password: password.to_string(),
                role,
            })
            .await?;
        tracing::info!(user_id = %session.user_id, role = %session.role, "account created");
        Ok(session)
    }

    pub fn sign_out(&self) {
        self.backend.sign_out();
    }

    fn session(&self) -> Result<Session, PortalError> {
        self.backend
            .current_session()
            .ok_or(PortalError::Unauthenticated)
    }

    fn session_as(&self, required: Role) -> Result<Session, PortalError> {
        let session = self.session()?;
        if session.role != required {
            return Err(PortalError::Forbidden { required });
        }
        Ok(session)
    }

    /// Fetches rows whose `field` is any of `ids`; no request is made for an empty set.
    async fn fetch_any<T, I>(&self, field: &'static str, ids: I) -> Result<Vec<T>, PortalError>
    where
        T: Record,
        I: IntoIterator<Item = Uuid>,
    {
        let ids: BTreeSet<Uuid> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(fetch(self.backend, &[Filter::any_of(field, ids)]).await?)
    }

    async fn owned_course(
        &self,
        teacher: &Session,
        course_id: Uuid,
    ) -> Result<Course, PortalError> {
        let courses: Vec<Course> = fetch(
            self.backend,
            &[
                Filter::eq("id", course_id),
                Filter::eq("teacher_id", teacher.user_id),
            ],
        )
        .await?;
        courses.into_iter().next().ok_or(PortalError::NotFound {
            entity: "course",
            id: course_id,
        })
    }

    async fn unread_count(&self, session: &Session) -> Result<usize, PortalError> {
        let unread: Vec<Message> = fetch(
            self.backend,
            &[
                Filter::eq("recipient_id", session.user_id),
                Filter::IsNull("read_at"),
            ],
        )
        .await?;
        Ok(unread.len())
    }

    pub async fn create_course(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Course, PortalError> {
        let teacher = self.session_as(Role::Teacher)?;

        let mut errors = FieldErrors::default();
        let title = errors.check("title", validate_text(title, TITLE_MAX));
        let description = errors.check("description", validate_text(description, DESCRIPTION_MAX));
        reject_invalid("course", errors)?;

        let course: Course = insert_record(
            self.backend,
            &NewCourse {
                teacher_id: teacher.user_id,
                title,
                description,
            },
        )
        .await?;
        tracing::info!(course_id = %course.id, teacher_id = %teacher.user_id, "course created");
        Ok(course)
    }

    /// `description` may be left blank; when given it is validated like any other text.
    pub async fn create_assignment(
        &self,
        course_id: Uuid,
        title: &str,
        description: &str,
        due_date: NaiveDate,
    ) -> Result<Assignment, PortalError> {
        let teacher = self.session_as(Role::Teacher)?;

        let mut errors = FieldErrors::default();
        let title = errors.check("title", validate_text(title, TITLE_MAX));
        let description = if description.trim().is_empty() {
            String::new()
        } else {
            errors.check("description", validate_text(description, DESCRIPTION_MAX))
        };
        reject_invalid("assignment", errors)?;

        let course = self.owned_course(&teacher, course_id).await?;
        let assignment: Assignment = insert_record(
            self.backend,
            &NewAssignment {
                course_id: course.id,
                title,
                description,
                due_date,
            },
        )
        .await?;
        tracing::info!(
            assignment_id = %assignment.id,
            course_id = %course.id,
            "assignment created"
        );
        Ok(assignment)
    }

    pub async fn enroll_student(
        &self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<Enrollment, PortalError> {
        let teacher = self.session_as(Role::Teacher)?;
        let course = self.owned_course(&teacher, course_id).await?;

        let students: Vec<Profile> = fetch(
            self.backend,
            &[Filter::eq("id", student_id), Filter::eq("role", Role::Student)],
        )
        .await?;
        if students.is_empty() {
            return Err(PortalError::NotFound {
                entity: "student",
                id: student_id,
            });
        }

        let existing: Vec<Enrollment> = fetch(
            self.backend,
            &[
                Filter::eq("course_id", course.id),
                Filter::eq("student_id", student_id),
            ],
        )
        .await?;
        if !existing.is_empty() {
            return Err(PortalError::AlreadyEnrolled {
                student_id,
                course_id,
            });
        }

        let enrollment: Enrollment = insert_record(
            self.backend,
            &NewEnrollment {
                student_id,
                course_id: course.id,
                progress: 0,
            },
        )
        .await?;
        tracing::info!(course_id = %course.id, student_id = %student_id, "student enrolled");
        Ok(enrollment)
    }

    pub async fn submit_assignment(
        &self,
        assignment_id: Uuid,
        content: &str,
    ) -> Result<Submission, PortalError> {
        let student = self.session_as(Role::Student)?;

        let mut errors = FieldErrors::default();
        let content = errors.check("content", validate_text(content, SUBMISSION_MAX));
        reject_invalid("submission", errors)?;

        let not_found = PortalError::NotFound {
            entity: "assignment",
            id: assignment_id,
        };
        let assignments: Vec<Assignment> =
            fetch(self.backend, &[Filter::eq("id", assignment_id)]).await?;
        let Some(assignment) = assignments.into_iter().next() else {
            return Err(not_found);
        };
        let enrollments: Vec<Enrollment> = fetch(
            self.backend,
            &[
                Filter::eq("course_id", assignment.course_id),
                Filter::eq("student_id", student.user_id),
            ],
        )
        .await?;
        if enrollments.is_empty() {
            return Err(not_found);
        }

        let submission: Submission = insert_record(
            self.backend,
            &NewSubmission {
                assignment_id,
                student_id: student.user_id,
                content,
            },
        )
        .await?;
        tracing::info!(
            submission_id = %submission.id,
            assignment_id = %assignment_id,
            "assignment submitted"
        );
        Ok(submission)
    }

    pub async fn send_message(
        &self,
        recipient_id: Uuid,
        body: &str,
    ) -> Result<Message, PortalError> {
        let sender = self.session()?;

        let mut errors = FieldErrors::default();
        let body = errors.check("body", validate_text(body, MESSAGE_MAX));
        reject_invalid("message", errors)?;

        let recipients: Vec<Profile> =
            fetch(self.backend, &[Filter::eq("id", recipient_id)]).await?;
        if recipients.is_empty() {
            return Err(PortalError::NotFound {
                entity: "profile",
                id: recipient_id,
            });
        }

        let message: Message = insert_record(
            self.backend,
            &NewMessage {
                sender_id: sender.user_id,
                recipient_id,
                body,
            },
        )
        .await?;
        tracing::info!(message_id = %message.id, "message sent");
        Ok(message)
    }

    pub async fn student_dashboard(&self) -> Result<StudentDashboard, PortalError> {
        let student = self.session_as(Role::Student)?;

        let enrolled = self
            .backend
            .query(
                &Query::new(Collection::Enrollments)
                    .filter(Filter::eq("student_id", student.user_id))
                    .include(Collection::Courses),
            )
            .await?;
        let enrollments: Vec<Enrollment> = enrolled.decode()?;
        let courses: Vec<Course> = enrolled.related()?;

        let teachers: Vec<Profile> = self
            .fetch_any("id", courses.iter().map(|c| c.teacher_id))
            .await?;
        let assignments: Vec<Assignment> = self
            .fetch_any("course_id", enrollments.iter().map(|e| e.course_id))
            .await?;
        let submissions: Vec<Submission> = if assignments.is_empty() {
            Vec::new()
        } else {
            fetch(
                self.backend,
                &[
                    Filter::eq("student_id", student.user_id),
                    Filter::any_of("assignment_id", assignments.iter().map(|a| a.id)),
                ],
            )
            .await?
        };
        let unread = self.unread_count(&student).await?;

        let course_views = join::course_views(&enrollments, &courses, &teachers);
        let mut assignment_views = join::assignment_views(
            &assignments,
            &courses,
            &submissions,
            self.settings.submission_pick,
        );
        assignment_views.sort_by_key(|a| a.due_date);
        let summary = summary::student_summary(&course_views, &assignment_views, unread);

        tracing::debug!(
            user_id = %student.user_id,
            courses = course_views.len(),
            assignments = assignment_views.len(),
            "student dashboard refreshed"
        );
        Ok(StudentDashboard {
            courses: course_views,
            assignments: assignment_views,
            summary,
        })
    }

    pub async fn teacher_dashboard(&self) -> Result<TeacherDashboard, PortalError> {
        let teacher = self.session_as(Role::Teacher)?;

        let taught = self
            .backend
            .query(
                &Query::new(Collection::Courses)
                    .filter(Filter::eq("teacher_id", teacher.user_id))
                    .include(Collection::Enrollments),
            )
            .await?;
        let courses: Vec<Course> = taught.decode()?;
        let enrollments: Vec<Enrollment> = taught.related()?;
        let assignments: Vec<Assignment> = self
            .fetch_any("course_id", courses.iter().map(|c| c.id))
            .await?;
        let unread = self.unread_count(&teacher).await?;

        let mut rows = join::teacher_course_views(&courses, &enrollments);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let summary = summary::teacher_summary(&rows, assignments.len(), unread);

        tracing::debug!(
            user_id = %teacher.user_id,
            courses = rows.len(),
            "teacher dashboard refreshed"
        );
        Ok(TeacherDashboard {
            courses: rows,
            summary,
        })
    }

    pub async fn course_roster(&self, course_id: Uuid) -> Result<Vec<StudentView>, PortalError> {
        let teacher = self.session_as(Role::Teacher)?;
        let course = self.owned_course(&teacher, course_id).await?;

        let roster = self
            .backend
            .query(
                &Query::new(Collection::Enrollments)
                    .filter(Filter::eq("course_id", course.id))
                    .include(Collection::Profiles),
            )
            .await?;
        let enrollments: Vec<Enrollment> = roster.decode()?;
        let students: Vec<Profile> = roster.related()?;
        Ok(join::roster_views(&enrollments, &students))
    }

    /// Students not yet enrolled in the course, by name.
    pub async fn available_students(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<StudentView>, PortalError> {
        let teacher = self.session_as(Role::Teacher)?;
        let course = self.owned_course(&teacher, course_id).await?;

        let enrollments: Vec<Enrollment> =
            fetch(self.backend, &[Filter::eq("course_id", course.id)]).await?;
        let enrolled = availability::enrolled_ids(&enrollments, course.id);
        let universe: Vec<Profile> = self
            .backend
            .query(&availability::available_students_query(&enrolled))
            .await?
            .decode()?;

        let mut available: Vec<StudentView> = availability::complement(&universe, &enrolled)
            .into_iter()
            .map(|profile| join::student_view(profile, None))
            .collect();
        available.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::logging;
    use crate::models::{AssignmentStatus, CourseStatus};
    use crate::store::memory::{session, MemoryStore};
    use crate::throttle::ManualClock;
    use crate::validation::ValidationError;

    struct Fixture {
        store: MemoryStore,
        throttle: Throttle,
        settings: PortalSettings,
    }

    impl Fixture {
        fn new() -> Self {
            logging::init_test();
            Self {
                store: MemoryStore::new(),
                throttle: Throttle::new(),
                settings: PortalSettings::default(),
            }
        }

        fn portal(&self) -> Portal<'_, MemoryStore> {
            Portal::new(&self.store, &self.throttle, &self.settings)
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap()
    }

    fn profile_of(session: &Session) -> Profile {
        Profile {
            id: session.user_id,
            full_name: session.full_name.clone(),
            role: Some(session.role),
            created_at: at(1),
        }
    }

    /// A teacher with two courses, three students, and one of them enrolled in both.
    struct Classroom {
        teacher: Session,
        students: Vec<Session>,
        react: Course,
        design: Course,
    }

    fn classroom(store: &MemoryStore) -> Classroom {
        let teacher = session(Role::Teacher, "Dr. Smith");
        let students = vec![
            session(Role::Student, "Avery Lee"),
            session(Role::Student, "Jules Moreno"),
            session(Role::Student, "Kiara Patel"),
        ];
        let mut profiles = vec![profile_of(&teacher)];
        profiles.extend(students.iter().map(profile_of));
        store.seed(&profiles);

        let course = |title: &str, day| Course {
            id: Uuid::new_v4(),
            teacher_id: teacher.user_id,
            title: title.to_string(),
            description: format!("About {title}"),
            created_at: at(day),
        };
        let react = course("Introduction to React", 2);
        let design = course("Web Design Principles", 3);
        store.seed(&[react.clone(), design.clone()]);

        store.seed(&[
            Enrollment {
                id: Uuid::new_v4(),
                student_id: students[0].user_id,
                course_id: react.id,
                progress: 75,
                enrolled_at: at(4),
            },
            Enrollment {
                id: Uuid::new_v4(),
                student_id: students[0].user_id,
                course_id: design.id,
                progress: 100,
                enrolled_at: at(4),
            },
        ]);

        Classroom {
            teacher,
            students,
            react,
            design,
        }
    }

    fn assignment(course: &Course, title: &str, due_day: u32) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            course_id: course.id,
            title: title.to_string(),
            description: String::new(),
            due_date: NaiveDate::from_ymd_opt(2026, 1, due_day).unwrap(),
            created_at: at(5),
        }
    }

    #[tokio::test]
    async fn course_title_reaches_backend_sanitized() {
        let fx = Fixture::new();
        fx.store.sign_in_as(session(Role::Teacher, "Dr. Smith"));

        let course = fx
            .portal()
            .create_course("<script>x</script>Intro", "ok")
            .await
            .unwrap();

        assert_eq!(course.title, "Intro");
        assert_eq!(course.description, "ok");
        let inserted = fx.store.inserted(Collection::Courses);
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["title"], "Intro");
        assert!(!serde_json::to_string(&inserted).unwrap().contains("<script"));
    }

    #[tokio::test]
    async fn invalid_course_is_never_written() {
        let fx = Fixture::new();
        fx.store.sign_in_as(session(Role::Teacher, "Dr. Smith"));

        let err = fx.portal().create_course("<b></b>", "").await.unwrap_err();
        let PortalError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.get("title"), Some(&ValidationError::InvalidContent));
        assert_eq!(errors.get("description"), Some(&ValidationError::Required));
        assert!(fx.store.inserted(Collection::Courses).is_empty());
    }

    #[tokio::test]
    async fn mutations_check_the_session_role() {
        let fx = Fixture::new();
        let err = fx.portal().create_course("Intro", "ok").await.unwrap_err();
        assert!(matches!(err, PortalError::Unauthenticated));

        fx.store.sign_in_as(session(Role::Student, "Avery Lee"));
        let err = fx.portal().create_course("Intro", "ok").await.unwrap_err();
        assert!(matches!(
            err,
            PortalError::Forbidden {
                required: Role::Teacher
            }
        ));
        let err = fx.portal().teacher_dashboard().await.unwrap_err();
        assert!(matches!(err, PortalError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn backend_failures_surface_unchanged() {
        let fx = Fixture::new();
        fx.store.sign_in_as(session(Role::Teacher, "Dr. Smith"));
        fx.store.fail_with("connection reset");

        let err = fx.portal().create_course("Intro", "ok").await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[tokio::test]
    async fn sign_in_uses_sanitized_email() {
        let fx = Fixture::new();
        let avery = session(Role::Student, "Avery Lee");
        fx.store.add_account("avery@school.edu", "secret1", avery.clone());

        let signed_in = fx
            .portal()
            .sign_in("  avery@school.edu ", "secret1")
            .await
            .unwrap();
        assert_eq!(signed_in, avery);
        assert_eq!(fx.store.current_session(), Some(avery));

        fx.portal().sign_out();
        assert_eq!(fx.store.current_session(), None);
    }

    #[tokio::test]
    async fn sign_in_reports_every_invalid_field() {
        let fx = Fixture::new();
        let err = fx.portal().sign_in("not-an-email", "123").await.unwrap_err();
        let PortalError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("email"), Some(&ValidationError::InvalidEmail));
        assert_eq!(errors.get("password").map(|e| e.code()), Some("too-short"));

        let err = fx
            .portal()
            .sign_in("avery@school.edu", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn sign_in_is_throttled_per_window() {
        logging::init_test();
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::starting_at(at(10)));
        let throttle = Throttle::with_parts(clock.clone(), MemoryLedger::default());
        let settings = PortalSettings::default();
        let portal = Portal::new(&store, &throttle, &settings);

        for _ in 0..5 {
            let err = portal.sign_in("a@b.com", "wrong-pass").await.unwrap_err();
            assert!(matches!(err, PortalError::Backend(_)));
        }
        let err = portal.sign_in("a@b.com", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, PortalError::ThrottleExceeded { .. }));

        // Sign-up has its own budget.
        let err = portal
            .sign_up("Avery Lee", "a@b.com", "123", Role::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));

        clock.advance(Duration::minutes(5));
        let err = portal.sign_in("a@b.com", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, PortalError::Backend(_)));
    }

    #[tokio::test]
    async fn sign_up_creates_profile_and_session() {
        let fx = Fixture::new();
        let session = fx
            .portal()
            .sign_up("<i>Jules</i> Moreno", "jules@school.edu", "secret1", Role::Student)
            .await
            .unwrap();
        assert_eq!(session.full_name, "Jules Moreno");
        assert_eq!(fx.store.current_session(), Some(session));

        let profiles = fx.store.inserted(Collection::Profiles);
        assert_eq!(profiles[0]["full_name"], "Jules Moreno");

        for _ in 0..2 {
            fx.portal()
                .sign_up("Jules Moreno", "jules@school.edu", "secret1", Role::Student)
                .await
                .unwrap_err();
        }
        let err = fx
            .portal()
            .sign_up("Jules Moreno", "jules@school.edu", "secret1", Role::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::ThrottleExceeded { .. }));
    }

    #[tokio::test]
    async fn student_dashboard_derives_every_view() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        let avery = &room.students[0];

        let components = assignment(&room.react, "React Components Exercise", 25);
        let quiz = assignment(&room.react, "Hooks Quiz", 22);
        let portfolio = assignment(&room.design, "Design Portfolio", 15);
        fx.store
            .seed(&[components.clone(), quiz.clone(), portfolio.clone()]);
        fx.store.seed(&[
            Submission {
                id: Uuid::new_v4(),
                assignment_id: quiz.id,
                student_id: avery.user_id,
                content: "answers".to_string(),
                grade: None,
                submitted_at: at(20),
                graded_at: None,
            },
            Submission {
                id: Uuid::new_v4(),
                assignment_id: portfolio.id,
                student_id: avery.user_id,
                content: "portfolio".to_string(),
                grade: Some(92),
                submitted_at: at(14),
                graded_at: Some(at(16)),
            },
            // Another student's submission must not leak into Avery's view.
            Submission {
                id: Uuid::new_v4(),
                assignment_id: components.id,
                student_id: room.students[1].user_id,
                content: "other".to_string(),
                grade: None,
                submitted_at: at(21),
                graded_at: None,
            },
        ]);
        let message = |read_at| Message {
            id: Uuid::new_v4(),
            sender_id: room.teacher.user_id,
            recipient_id: avery.user_id,
            body: "Welcome".to_string(),
            created_at: at(6),
            read_at,
        };
        fx.store
            .seed(&[message(None), message(None), message(Some(at(7)))]);

        fx.store.sign_in_as(avery.clone());
        let dashboard = fx.portal().student_dashboard().await.unwrap();

        assert_eq!(dashboard.courses.len(), 2);
        let react = dashboard
            .courses
            .iter()
            .find(|c| c.id == room.react.id)
            .unwrap();
        assert_eq!(react.instructor_name, "Dr. Smith");
        assert_eq!(react.status, CourseStatus::Active);
        let design = dashboard
            .courses
            .iter()
            .find(|c| c.id == room.design.id)
            .unwrap();
        assert_eq!(design.status, CourseStatus::Completed);

        let titles: Vec<&str> = dashboard
            .assignments
            .iter()
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec!["Design Portfolio", "Hooks Quiz", "React Components Exercise"]
        );
        let statuses: Vec<AssignmentStatus> =
            dashboard.assignments.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![
                AssignmentStatus::Graded,
                AssignmentStatus::Submitted,
                AssignmentStatus::Pending
            ]
        );
        assert_eq!(dashboard.assignments[0].grade, Some(92));
        assert_eq!(dashboard.assignments[0].course_title, "Web Design Principles");

        assert_eq!(dashboard.summary.course_count, 2);
        assert_eq!(dashboard.summary.assignment_count, 3);
        assert_eq!(dashboard.summary.average_progress, 87.5);
        assert_eq!(dashboard.summary.unread_message_count, 2);
    }

    #[tokio::test]
    async fn empty_student_dashboard_has_zero_average() {
        let fx = Fixture::new();
        fx.store.sign_in_as(session(Role::Student, "New Student"));
        let dashboard = fx.portal().student_dashboard().await.unwrap();
        assert!(dashboard.courses.is_empty());
        assert!(dashboard.assignments.is_empty());
        assert_eq!(dashboard.summary.average_progress, 0.0);
    }

    #[tokio::test]
    async fn submitting_refreshes_assignment_status() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        let quiz = assignment(&room.react, "Hooks Quiz", 22);
        fx.store.seed(&[quiz.clone()]);

        fx.store.sign_in_as(room.students[1].clone());
        let err = fx
            .portal()
            .submit_assignment(quiz.id, "my answers")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PortalError::NotFound {
                entity: "assignment",
                ..
            }
        ));

        fx.store.sign_in_as(room.students[0].clone());
        let submission = fx
            .portal()
            .submit_assignment(quiz.id, "<p>my answers</p>")
            .await
            .unwrap();
        assert_eq!(submission.content, "my answers");
        assert!(submission.graded_at.is_none());

        let dashboard = fx.portal().student_dashboard().await.unwrap();
        assert_eq!(dashboard.assignments[0].status, AssignmentStatus::Submitted);
        assert_eq!(dashboard.assignments[0].grade, None);
    }

    #[tokio::test]
    async fn teacher_dashboard_counts_students_and_assignments() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        fx.store.seed(&[
            assignment(&room.react, "A1", 20),
            assignment(&room.design, "D1", 21),
        ]);

        fx.store.sign_in_as(room.teacher.clone());
        let dashboard = fx.portal().teacher_dashboard().await.unwrap();

        assert_eq!(dashboard.courses.len(), 2);
        // Newest course first.
        assert_eq!(dashboard.courses[0].id, room.design.id);
        assert!(dashboard.courses.iter().all(|c| c.student_count == 1));
        assert_eq!(dashboard.summary.total_students, 2);
        assert_eq!(dashboard.summary.assignment_count, 2);
        assert_eq!(dashboard.summary.unread_message_count, 0);
    }

    #[tokio::test]
    async fn available_students_shrink_as_they_enroll() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        let empty_course = Course {
            id: Uuid::new_v4(),
            teacher_id: room.teacher.user_id,
            title: "Advanced JavaScript".to_string(),
            description: String::new(),
            created_at: at(8),
        };
        fx.store.seed(&[empty_course.clone()]);
        fx.store.sign_in_as(room.teacher.clone());
        let portal = fx.portal();

        let available = portal.available_students(empty_course.id).await.unwrap();
        let names: Vec<&str> = available.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(names, vec!["Avery Lee", "Jules Moreno", "Kiara Patel"]);
        assert!(available.iter().all(|s| s.enrolled_at.is_none()));
        assert!(portal.course_roster(empty_course.id).await.unwrap().is_empty());

        let jules = room.students[1].user_id;
        portal.enroll_student(empty_course.id, jules).await.unwrap();

        let available = portal.available_students(empty_course.id).await.unwrap();
        assert_eq!(available.len(), 2);
        assert!(available.iter().all(|s| s.id != jules));

        let roster = portal.course_roster(empty_course.id).await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].derived_email, "jules.moreno@student.com");
        assert!(roster[0].enrolled_at.is_some());

        let err = portal.enroll_student(empty_course.id, jules).await.unwrap_err();
        assert!(matches!(err, PortalError::AlreadyEnrolled { .. }));
    }

    #[tokio::test]
    async fn enrollment_requires_own_course_and_a_student() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        fx.store.sign_in_as(room.teacher.clone());

        let err = fx
            .portal()
            .enroll_student(room.react.id, room.teacher.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound { entity: "student", .. }));

        fx.store.sign_in_as(session(Role::Teacher, "Prof. Johnson"));
        let err = fx
            .portal()
            .available_students(room.react.id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound { entity: "course", .. }));
    }

    #[tokio::test]
    async fn assignments_can_be_created_for_own_courses() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        fx.store.sign_in_as(room.teacher.clone());
        let due = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

        let created = fx
            .portal()
            .create_assignment(room.react.id, "Final <em>Project</em>", "  ", due)
            .await
            .unwrap();
        assert_eq!(created.title, "Final Project");
        assert_eq!(created.description, "");
        assert_eq!(created.due_date, due);

        let err = fx
            .portal()
            .create_assignment(Uuid::new_v4(), "Orphan", "", due)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound { entity: "course", .. }));
    }

    #[tokio::test]
    async fn messages_count_as_unread_for_the_recipient() {
        let fx = Fixture::new();
        let room = classroom(&fx.store);
        fx.store.sign_in_as(room.teacher.clone());

        let err = fx
            .portal()
            .send_message(Uuid::new_v4(), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound { entity: "profile", .. }));

        let sent = fx
            .portal()
            .send_message(room.students[2].user_id, "Office hours <img src=x onerror=1>moved")
            .await
            .unwrap();
        assert_eq!(sent.body, "Office hours moved");

        fx.store.sign_in_as(room.students[2].clone());
        let dashboard = fx.portal().student_dashboard().await.unwrap();
        assert_eq!(dashboard.summary.unread_message_count, 1);
    }
}
