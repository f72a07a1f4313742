use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod availability;
mod config;
mod db;
mod error;
mod join;
mod logging;
mod models;
mod portal;
mod report;
mod sanitize;
mod status;
mod store;
mod summary;
mod throttle;
mod validation;

use config::AppConfig;
use db::PgStore;
use models::{Role, Session};
use portal::Portal;
use throttle::Throttle;

#[derive(Parser)]
#[command(name = "classroom-portal")]
#[command(about = "Course and messaging portal for teachers and students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    #[arg(long, env = "PORTAL_EMAIL")]
    email: String,
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo accounts, courses and submissions
    Seed,
    /// Import a roster CSV (full_name,email,role,course_title)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Register a new account
    SignUp {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "student")]
        role: Role,
    },
    /// Render the dashboard for the signed-in user
    Dashboard {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Create a course (teachers)
    CreateCourse {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },
    /// Add an assignment to one of your courses (teachers)
    CreateAssignment {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        course: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        due: NaiveDate,
    },
    /// Enroll a student in one of your courses (teachers)
    Enroll {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        course: Uuid,
        #[arg(long)]
        student: Uuid,
    },
    /// List students not yet enrolled in a course (teachers)
    Available {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        course: Uuid,
    },
    /// List the students enrolled in a course (teachers)
    Roster {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        course: Uuid,
    },
    /// Submit work for an assignment (students)
    Submit {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        assignment: Uuid,
        #[arg(long)]
        content: String,
    },
    /// Send a message to another user
    Message {
        #[command(flatten)]
        auth: Credentials,
        #[arg(long)]
        to: Uuid,
        #[arg(long)]
        body: String,
    },
}

async fn signed_in(portal: &Portal<'_, PgStore>, auth: &Credentials) -> anyhow::Result<Session> {
    portal
        .sign_in(&auth.email, &auth.password)
        .await
        .context("sign-in failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = PgStore::new(pool.clone());
    let throttle = Throttle::new();
    let portal = Portal::new(&store, &throttle, &config.portal);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!(
                "Seed data inserted. Sign in as smith@school.edu / {}.",
                db::SEED_PASSWORD
            );
        }
        Commands::Import { csv } => {
            let inserted = db::import_roster(&pool, &csv).await?;
            println!("Enrolled {inserted} students from {}.", csv.display());
        }
        Commands::SignUp {
            full_name,
            email,
            password,
            role,
        } => {
            let session = portal.sign_up(&full_name, &email, &password, role).await?;
            println!(
                "Account created for {} ({}), id {}.",
                session.full_name, session.role, session.user_id
            );
        }
        Commands::Dashboard { auth, out, json } => {
            let session = signed_in(&portal, &auth).await?;
            let rendered = match (session.role, json) {
                (Role::Student, false) => {
                    report::render_student_dashboard(&session, &portal.student_dashboard().await?)
                }
                (Role::Teacher, false) => {
                    report::render_teacher_dashboard(&session, &portal.teacher_dashboard().await?)
                }
                (Role::Student, true) => {
                    serde_json::to_string_pretty(&portal.student_dashboard().await?)?
                }
                (Role::Teacher, true) => {
                    serde_json::to_string_pretty(&portal.teacher_dashboard().await?)?
                }
            };

            match out {
                Some(out) => {
                    std::fs::write(&out, rendered)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Dashboard written to {}.", out.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::CreateCourse {
            auth,
            title,
            description,
        } => {
            signed_in(&portal, &auth).await?;
            let course = portal.create_course(&title, &description).await?;
            println!("Created course {} ({}).", course.title, course.id);
        }
        Commands::CreateAssignment {
            auth,
            course,
            title,
            description,
            due,
        } => {
            signed_in(&portal, &auth).await?;
            let assignment = portal
                .create_assignment(course, &title, &description, due)
                .await?;
            println!(
                "Created assignment {} due {} ({}).",
                assignment.title, assignment.due_date, assignment.id
            );
        }
        Commands::Enroll {
            auth,
            course,
            student,
        } => {
            signed_in(&portal, &auth).await?;
            let enrollment = portal.enroll_student(course, student).await?;
            println!("Enrolled student {} ({}).", student, enrollment.id);
        }
        Commands::Available { auth, course } => {
            signed_in(&portal, &auth).await?;
            let students = portal.available_students(course).await?;
            print!("{}", report::render_students("Available Students", &students));
        }
        Commands::Roster { auth, course } => {
            signed_in(&portal, &auth).await?;
            let students = portal.course_roster(course).await?;
            print!("{}", report::render_students("Enrolled Students", &students));
        }
        Commands::Submit {
            auth,
            assignment,
            content,
        } => {
            signed_in(&portal, &auth).await?;
            let submission = portal.submit_assignment(assignment, &content).await?;
            println!("Submission {} received.", submission.id);
        }
        Commands::Message { auth, to, body } => {
            signed_in(&portal, &auth).await?;
            let message = portal.send_message(to, &body).await?;
            println!("Message {} sent.", message.id);
        }
    }

    portal.sign_out();
    Ok(())
}
